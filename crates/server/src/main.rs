//! SpeakSpace Server - API and realtime broker

use anyhow::Context;
use speakspace_server::{api_router, socket_router, AppState, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speakspace_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let state = AppState::new();

    let api_listener = tokio::net::TcpListener::bind(config.api_addr())
        .await
        .with_context(|| format!("failed to bind API on {}", config.api_addr()))?;
    let socket_listener = tokio::net::TcpListener::bind(config.socket_addr())
        .await
        .with_context(|| format!("failed to bind broker on {}", config.socket_addr()))?;

    tracing::info!("API listening on {}", config.api_addr());
    tracing::info!("Realtime broker listening on {}", config.socket_addr());

    let api = api_router(state.clone());
    let socket = socket_router(state);
    tokio::try_join!(
        async { axum::serve(api_listener, api).await },
        async { axum::serve(socket_listener, socket).await },
    )?;

    Ok(())
}
