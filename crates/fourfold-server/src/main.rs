//! Fourfold match server.
//!
//! Configured from the environment: `PORT` or `ADDR`, `BOT_DELAY`,
//! `RECONNECT_WINDOW` and `SWEEP_INTERVAL` (seconds). Log level comes from
//! `RUST_LOG`, default `info`.

use fourfold::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<(), FourfoldError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        addr = %config.bind_addr,
        fallback_delay = ?config.fallback_delay,
        reconnect_window_secs = config.registry.reconnect_window_secs,
        "starting fourfold server"
    );

    let server = FourfoldServerBuilder::new()
        .config(config)
        .build(MemoryStore::new(), TracingPublisher)
        .await?;
    server.run().await
}
