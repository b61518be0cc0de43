//! Ephemeral Chat Server - Entry Point
//!
//! Loads configuration, creates the room registry and accepts connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ephemeral_chat::{handle_connection, RoomRegistry, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=ephemeral_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ephemeral_chat=info")),
        )
        .init();

    // Bind address from command line, env, or default
    let config = ServerConfig::from_env()?;

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Ephemeral Chat Server listening on {}", config.addr);
    info!(
        "Message ttl: {:?}, tick interval: {:?}",
        config.room.default_ttl, config.room.tick_interval
    );

    let registry = Arc::new(RoomRegistry::new(config.room));

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let registry = Arc::clone(&registry);

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, registry).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
