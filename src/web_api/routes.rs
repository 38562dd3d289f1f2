//! Viewer HTTP routes.
//!
//! The route table is fixed at startup: the live stream, the snapshot,
//! and the static landing pages. Everything else resolves against the
//! asset directory, appending `.html` when the exact file is absent.

use crate::state::AppState;
use crate::stream_session::{StreamSession, BOUNDARY};
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::{Component, Path, PathBuf};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Build the viewer-port router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(super::health_check))
        .route("/stream.mjpg", get(stream_mjpg))
        .route("/snapshot.png", get(snapshot_png))
        .fallback(static_asset)
        .with_state(state)
}

/// Unbounded multipart image sequence; one chunk per frame until the
/// viewer disconnects.
async fn stream_mjpg(State(state): State<AppState>) -> Response {
    let rx = StreamSession::spawn(&state.frames, &state.fallback);
    let body = Body::from_stream(
        ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header("Age", "0")
        .header(header::CACHE_CONTROL, "no-cache, private")
        .header(header::PRAGMA, "no-cache")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
        )
        .body(body)
        .expect("stream response")
}

/// One high-resolution still; the placeholder stands in when capture
/// fails so the viewer always gets an image.
async fn snapshot_png(State(state): State<AppState>) -> Response {
    match state.capture.snapshot().await {
        Ok(data) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png")],
            data,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Snapshot failed, serving placeholder");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "image/jpeg")],
                state.fallback.current(),
            )
                .into_response()
        }
    }
}

/// Resolve a request path inside the asset directory.
///
/// `/` maps to the landing page; a path without a matching file is
/// retried with `.html` appended before giving up.
async fn static_asset(State(state): State<AppState>, uri: Uri) -> Response {
    let request_path = uri.path();
    tracing::info!(path = %request_path, "HTTP request");

    let relative = if request_path == "/" {
        "camera.html"
    } else {
        request_path.trim_start_matches('/')
    };

    let Some(base) = sanitize(&state.config.www_dir, relative) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let mut candidates = vec![base.clone()];
    if base.extension().is_none() {
        candidates.push(base.with_extension("html"));
    }

    for candidate in candidates {
        match tokio::fs::read(&candidate).await {
            Ok(data) => {
                let mime = mime_guess::from_path(&candidate).first_or_octet_stream();
                return (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                    data,
                )
                    .into_response();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(path = %candidate.display(), error = %e, "Asset read failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Asset read failed").into_response();
            }
        }
    }

    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Join a request path onto the asset root, rejecting any traversal
/// outside it.
fn sanitize(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_rejects_traversal() {
        let root = Path::new("/srv/www");
        assert!(sanitize(root, "../etc/passwd").is_none());
        assert!(sanitize(root, "a/../../etc/passwd").is_none());
        assert_eq!(
            sanitize(root, "css/site.css"),
            Some(PathBuf::from("/srv/www/css/site.css"))
        );
    }

    #[test]
    fn test_sanitize_allows_plain_names() {
        let root = Path::new("www");
        assert_eq!(sanitize(root, "camera.html"), Some(PathBuf::from("www/camera.html")));
        assert_eq!(sanitize(root, "admin"), Some(PathBuf::from("www/admin")));
    }
}
