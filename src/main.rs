//! Bridge server binary.

use clap::Parser;
use midi_bridge::{router, wire, BridgeState, MidiDriver, MidirDriver, RouteStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// HTTP-fronted MIDI routing bridge.
#[derive(Parser, Debug)]
#[command(name = "midi-bridge")]
#[command(about = "Expose MIDI hardware and virtual ports over HTTP and route between them")]
#[command(version)]
struct Cli {
    /// Listen port; 0 requests an OS-assigned port.
    #[arg(default_value_t = 7777)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let driver: Arc<dyn MidiDriver> = Arc::new(MidirDriver::new());
    let store = RouteStore::at_default_path();
    info!("Routes file: {}", store.path().display());

    let (registry, routes) = wire(driver.clone(), store);
    let state = BridgeState {
        driver,
        registry,
        routes,
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    let port = listener.local_addr()?.port();

    // First stdout line; supervisors parse it to discover an OS-assigned port.
    println!("MIDI_SERVER_PORT={port}");
    info!("Listening on 0.0.0.0:{}", port);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
