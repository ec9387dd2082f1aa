//! docwire - wire-compatible document-database front door
//!
//! Speaks the MongoDB wire protocol on a TCP socket, decodes Insert and
//! Query frames, logs them as JSON, and answers queries with empty result
//! sets. No requests are executed against a backing store.

use docwire_server::{Config, Server, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if DOCWIRE_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("DOCWIRE_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if std::env::var("DOCWIRE_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    tracing::info!("Starting docwire server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max connections: {}", config.network.max_connections);

    let mut server_config = ServerConfig::new(config.network.bind_addr);
    server_config.max_connections = config.network.max_connections;
    let server = Arc::new(Server::new(server_config));

    // Stop accepting connections on Ctrl-C; in-flight reads finish with
    // process teardown.
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            shutdown_server.shutdown();
        }
    });

    server.run().await?;
    tracing::info!("Server stopped");
    Ok(())
}
