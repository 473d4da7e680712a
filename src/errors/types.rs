//! Error type definitions for the VIN cache service
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the
/// application. It uses `thiserror` to provide automatic error trait
/// implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// VIN rejected at the request boundary before any cache or upstream
    /// interaction
    #[error("Invalid VIN: {message}")]
    InvalidVin { message: String },

    /// Transport, timeout, status, or parse failure talking to the decoding
    /// service
    #[error("Upstream decoder error: {message}")]
    Upstream { message: String },

    /// The decoding service answered but produced no usable result for this
    /// VIN
    #[error("VIN {vin} could not be decoded")]
    Undecodable { vin: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Snapshot export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Export layer specific errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// Snapshot file creation or write failures
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Column construction failures
    #[error("Column construction failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet serialization failures
    #[error("Parquet serialization failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a boundary validation error with a custom message
    pub fn invalid_vin<S: Into<String>>(message: S) -> Self {
        Self::InvalidVin {
            message: message.into(),
        }
    }

    /// Create an upstream decoder error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create an undecodable-VIN error
    pub fn undecodable<S: Into<String>>(vin: S) -> Self {
        Self::Undecodable { vin: vin.into() }
    }
}
