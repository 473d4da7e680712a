pub mod config;
pub mod database;
pub mod decoder;
pub mod errors;
pub mod export;
pub mod models;
pub mod services;
pub mod web;
