//! Control plane - Bidirectional Command Protocol
//!
//! ## Responsibilities
//!
//! - Accept persistent WebSocket connections on the control port
//! - Process each connection's requests strictly sequentially while
//!   separate connections run concurrently
//! - Emit responses in request order, always correlated by id
//! - Serve a fixed liveness acknowledgment outside the request loop
//!
//! A connection failure terminates only that connection; handlers never
//! take the process down.

mod dispatcher;
mod protocol;

pub use dispatcher::{ControlDispatcher, Responder};
pub use protocol::{ControlRequest, ControlResponse, Method, StatusBody, CODE_ERROR, CODE_OK};

use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Build the control-port router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/healthz", get(liveness))
        .with_state(state)
}

/// Fixed liveness acknowledgment; never enters the request loop.
async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// One control connection: a writer task drains the response queue while
/// this loop handles inbound requests one at a time.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let conn_id = Uuid::new_v4();
    tracing::info!(connection_id = %conn_id, "Control client connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let dispatcher = ControlDispatcher::new(state);
    let responder = Responder::new(tx);

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ControlRequest>(&text) {
                Ok(request) => {
                    tracing::info!(connection_id = %conn_id, method = %request.method, "Request received");
                    dispatcher.handle(request, &responder).await;
                }
                Err(e) => {
                    // A malformed message does not kill the connection.
                    tracing::warn!(connection_id = %conn_id, error = %e, "Invalid control message");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %conn_id, "Control client disconnected");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => {}
            Err(e) => {
                tracing::warn!(connection_id = %conn_id, error = %e, "Control connection error");
                break;
            }
        }
    }

    // Dropping the responder ends the writer task once the queue drains.
    drop(responder);
    let _ = send_task.await;
    tracing::info!(connection_id = %conn_id, "Control connection closed");
}
