use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rum_diary::api;
use rum_diary::config::Config;
use rum_diary::storage::{HitStore, SqliteStorage};

#[derive(Parser)]
#[command(name = "rum-diary")]
#[command(about = "Hit collection and dashboard aggregation server", long_about = None)]
struct Cli {
    /// Address to bind, overrides API_HOST
    #[arg(long)]
    host: Option<String>,
    /// Port to bind, overrides API_PORT
    #[arg(long)]
    port: Option<u16>,
    /// SQLite database URL, overrides DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.api_server.host = host;
    }
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let store: Arc<dyn HitStore> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );
    store.init().await?;
    info!("Database initialized successfully");

    info!(
        "Reporting in UTC{:+} minutes, navigation statistics: {:?} (p{})",
        config.reporting.utc_offset_minutes,
        config.reporting.navigation_calculate,
        config.reporting.navigation_percentile
    );

    let router = api::create_api_router(Arc::clone(&store), config.reporting.clone());

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 API server listening on http://{}", addr);
    info!("   - Beacon endpoint at http://{}/navigation", addr);
    info!("   - Site reports at http://{}/site/{{hostname}}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
