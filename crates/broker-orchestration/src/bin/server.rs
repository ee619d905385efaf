//! # Broker Server
//!
//! Standalone server binary for the dataspace job broker.
//!
//! ## Usage
//!
//! ```bash
//! # Run with built-in defaults
//! cargo run --bin broker-server
//!
//! # Run with a config file and env overrides
//! BROKER_CONFIG=config/broker.toml BROKER__SERVER__BIND_ADDRESS=0.0.0.0:9000 \
//!   cargo run --bin broker-server
//! ```

use std::sync::Arc;
use tokio::signal;
use tracing::info;

use broker_orchestration::web::{router, AppState};
use broker_shared::{logging, BrokerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env before config so BROKER__* overrides land
    dotenvy::dotenv().ok();
    logging::init_tracing();

    info!("Starting Dataspace Job Broker...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(BrokerConfig::load()?);
    let bind_address = config.server.bind_address.clone();
    let state = AppState::from_config(Arc::clone(&config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("   Listening on {}", bind_address);
    info!("   Public base URL: {}", config.server.public_base_url);
    info!("   Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Broker server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
