//! naturia-sw server entry point.
//!
//! Boots the offline intermediary and exposes it as an MCP server on stdio
//! transport. Logging goes to stderr to avoid interfering with the JSON-RPC
//! protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use naturia_client::{FetchConfig, HttpFetcher, InstallOutcome, Reactor, WorkerSettings};
use naturia_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let origin = config.origin_url()?;
    let settings = WorkerSettings::from_config(&config)?;

    tracing::info!(
        version = %config.cache_version,
        origin = %origin,
        db = %config.db_path.display(),
        "Starting naturia-sw server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);
    let reactor = Reactor::start(db.clone(), fetcher, settings.clone(), config.skip_waiting).await?;

    // Serve while the boot install runs; failures leave the previous
    // generation in charge.
    let boot = reactor.clone();
    let boot_settings = settings.clone();
    tokio::spawn(async move {
        match boot.install(boot_settings).await {
            Ok(InstallOutcome::AlreadyActive { version }) => tracing::info!(%version, "cache already current"),
            Ok(outcome) => tracing::info!(?outcome, "boot install finished"),
            Err(e) => tracing::warn!(error = %e, "boot install failed"),
        }
    });

    let handler = handler::NaturiaServer::new(db, reactor.clone(), settings, origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    reactor.shutdown().await?;

    Ok(())
}
