//! Web layer
//!
//! HTTP interface for the VIN cache service: thin handlers that validate the
//! VIN at the boundary and delegate to the lookup service, the cache store,
//! and the export adapter.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::{
    config::Config, database::Database, export::ParquetExporter, services::LookupService,
};

pub mod api;
pub mod responses;

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub async fn new(
        config: &Config,
        database: Database,
        lookup: LookupService,
        exporter: ParquetExporter,
    ) -> Result<Self> {
        let app = Self::create_router(AppState {
            database,
            lookup,
            exporter,
        });

        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;

        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware. Public so tests can
    /// drive the full HTTP surface without binding a socket.
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/lookup/", get(api::lookup_vin))
            .route("/remove/", get(api::remove_vin))
            .route("/export/", get(api::export_cache))
            .route("/create_table", get(api::create_table))
            .route("/health", get(api::health_check))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Start the web server; returns once a shutdown signal has been handled
    /// and in-flight requests have drained.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub lookup: LookupService,
    pub exporter: ParquetExporter,
}
