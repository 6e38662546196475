//! TeleCards Server
//!
//! Binary entrypoint: logging, configuration from the environment, and
//! the accept loop.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use telecards::catalog::CardCatalog;
use telecards::network::{GameServer, ServerConfig};
use telecards::store::{MemoryStore, PlayerStore};
use telecards::VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("TeleCards server v{VERSION}");

    let mut config = ServerConfig::default();
    if let Ok(bind) = std::env::var("TELECARDS_BIND") {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid TELECARDS_BIND address: {bind}"))?;
    }
    if let Ok(seconds) = std::env::var("TELECARDS_TURN_SECONDS") {
        let seconds: u64 = seconds
            .parse()
            .with_context(|| format!("invalid TELECARDS_TURN_SECONDS: {seconds}"))?;
        config.session.turn_duration = std::time::Duration::from_secs(seconds);
    }

    let catalog = Arc::new(CardCatalog::standard());
    info!("card catalog loaded: {} definitions", catalog.len());
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new(Arc::clone(&catalog)));

    let server = GameServer::new(config, catalog, store);
    server.run().await.context("game server terminated")?;
    Ok(())
}
