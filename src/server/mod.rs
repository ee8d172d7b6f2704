//! HTTP status/control surface consumed by the device UI.

pub mod error;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

use crate::auth::{DeviceFlowService, FlowHandle, FlowView, RevocationResult};
use crate::error::Result;
use error::ApiError;

pub type AppState = Arc<DeviceFlowService>;

#[derive(Debug, Serialize)]
struct StartFlowResponse {
    success: bool,
    data: FlowHandle,
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    success: bool,
    #[serde(flatten)]
    result: RevocationResult,
}

/// Build the router with every control route.
pub fn routes(service: AppState) -> Router {
    Router::new()
        .route("/start-device-flow", post(start_device_flow))
        .route("/status", get(status))
        .route("/logout", post(logout))
        .route("/open-browser", post(open_browser))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve `routes(service)` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, service: AppState) -> Result<()> {
    info!(addr = %listener.local_addr()?, "device app listening");
    axum::serve(listener, routes(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

async fn start_device_flow(
    State(service): State<AppState>,
) -> std::result::Result<Json<StartFlowResponse>, ApiError> {
    let data = service.start_flow().await?;
    Ok(Json(StartFlowResponse {
        success: true,
        data,
    }))
}

async fn status(State(service): State<AppState>) -> Json<FlowView> {
    Json(service.status())
}

async fn logout(State(service): State<AppState>) -> Json<LogoutResponse> {
    let result = service.logout().await;
    Json(LogoutResponse {
        success: true,
        result,
    })
}

async fn open_browser(State(service): State<AppState>) -> std::result::Result<Json<Value>, ApiError> {
    service.open_companion_link()?;
    Ok(Json(json!({ "success": true })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "service": "device-app" }))
}
