//! Token-protected observability REST API.

pub mod resources;
pub mod security;

pub use security::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::domain::ports::DroneRegistry;
use crate::services::auth::AuthService;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<dyn DroneRegistry>,
    pub auth: Arc<AuthService>,
}

/// Build the router serving the observability endpoints.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/resources/", get(resources::get_resources))
        .route("/resources/:drone_uuid/state", get(resources::get_resource_state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the observability API.
pub async fn serve(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "observability API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
