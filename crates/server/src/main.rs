//! precache server entry point.
//!
//! Loads configuration, opens the store and serves the precache tools over
//! the MCP stdio transport. Logging goes to stderr to avoid interfering with
//! the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use precache_client::Precacher;
use precache_core::{AppConfig, CacheDb};
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

    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;
    let precacher = Precacher::from_config(&config, &db)?;

    tracing::info!(
        db_path = %config.db_path.display(),
        scope_url = %config.scope_url,
        namespace = precacher.namespace(),
        "Starting precache server on stdio transport"
    );

    let handler = handler::PrecacheServer::new(db, Arc::new(precacher));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
