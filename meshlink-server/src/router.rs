use crate::config::RelayConfig;
use crate::room::RoomManager;
use crate::signaling::{SignalingService, ws_handler};
use axum::Router;
use axum::routing::get;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared by every connection handler.
#[derive(Clone)]
pub struct RelayState {
    pub signaling: SignalingService,
    pub rooms: RoomManager,
    pub config: Arc<RelayConfig>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        let signaling = SignalingService::new();
        let rooms = RoomManager::new(Arc::new(signaling.clone()));

        Self {
            signaling,
            rooms,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Runs the relay on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: RelayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Relay listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Relay stopped");
    Ok(())
}
