mod api;
mod app;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod state;

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chatgate_web=debug,chatgate_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let policy = config.rate_limit.policy();

    let state = AppState::from_config(config).await?;

    // Window reset + registry clear task
    let shutdown = CancellationToken::new();
    let maintenance = state.limiter.spawn_maintenance(shutdown.clone());

    tracing::info!(
        "Rate limit: {} requests per {}s, registry cleared every {}m",
        policy.max_requests,
        policy.window.as_secs(),
        policy.registry_ttl.as_secs() / 60
    );

    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("chatgate-web listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    maintenance.await?;
    tracing::info!("chatgate-web stopped");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
