//! Hiroba chat relay server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000
//! ```

use clap::Parser;
use hiroba_server::{app, config::ServerConfig, ui::shutdown_signal};
use hiroba_shared::logger::setup_logger;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let config = ServerConfig::parse();
    tracing::debug!("Starting with {:?}", config);

    let shutdown = CancellationToken::new();
    let app::App {
        server,
        coordinator,
    } = app::build(&config, shutdown.clone());

    // Ctrl+C / SIGTERM cancels the shared token
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = server.run(&config.host, config.port).await;

    // the coordinator outlives the listener only when the server failed on its own
    shutdown.cancel();
    if let Err(e) = coordinator.await {
        tracing::error!("Broadcast coordinator task failed: {}", e);
    }

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
