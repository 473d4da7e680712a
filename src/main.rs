use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vin_cache::{
    config::Config,
    database::Database,
    decoder::VpicClient,
    export::ParquetExporter,
    services::LookupService,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "vin-cache")]
#[command(version = "0.1.0")]
#[command(about = "A VIN decoding cache service with vPIC lookup and Parquet export")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = if cli.log_level == "trace" {
        format!("vin_cache={},tower_http=trace", cli.log_level)
    } else {
        format!("vin_cache={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting VIN Cache Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from specified file
    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database).await?;
    info!("Database connection established");

    // Table creation is a one-time setup operation exposed as /create_table,
    // so startup only checks and hints.
    if !database.vin_table_exists().await? {
        warn!("vin_records table not found; call GET /create_table once before looking up VINs");
    }

    let decoder = Arc::new(VpicClient::new(&config.decoder));
    let lookup = LookupService::new(database.clone(), decoder);
    let exporter = ParquetExporter::new(config.export.output_path.clone());
    info!(
        "Decoder client pointed at {} (exports go to {})",
        config.decoder.base_url,
        config.export.output_path.display()
    );

    let web_server = WebServer::new(&config, database.clone(), lookup, exporter).await?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    database.close().await;
    info!("Database pool closed, shutting down");

    Ok(())
}
