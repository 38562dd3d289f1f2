//! WebAPI - Viewer-Facing HTTP Endpoints
//!
//! ## Responsibilities
//!
//! - Live stream delivery (`/stream.mjpg`)
//! - On-demand snapshots (`/snapshot.png`)
//! - Landing page and static assets

mod routes;

pub use routes::create_router;

use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let device_state = state.capture.state().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "device_state": device_state.as_str(),
    }))
}
