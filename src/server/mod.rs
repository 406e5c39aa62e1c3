//! HTTP surface
//!
//! - `POST /parse`: multipart upload with a `file` field, answered with a
//!   [`ParseResponse`]. Pipeline failures are soft (`200`, `ok: false`); only
//!   an unreadable multipart body or a missing `file` field is rejected.
//! - `GET /health`: liveness check.
//!
//! The pipeline is CPU bound, so each request runs on the blocking pool.

use crate::{
    error::Result,
    processor::WardrobeParser,
    tracing_config::spans,
    types::ParseResponse,
};
use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Multipart field carrying the uploaded image
pub const FILE_FIELD: &str = "file";

/// Build the application router around a shared parser
pub fn router(parser: Arc<WardrobeParser>) -> Router {
    let body_limit = parser.config().max_upload_bytes;

    Router::new()
        .route("/parse", post(parse))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = uuid::Uuid::new_v4().to_string();
                spans::request(&request_id, request.method().as_str(), request.uri().path())
            }),
        )
        .with_state(parser)
}

/// Bind `addr` and serve until Ctrl-C
///
/// # Errors
/// - Address cannot be bound
/// - Server I/O failure
pub async fn serve(parser: Arc<WardrobeParser>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "🌐 Listening");

    axum::serve(listener, router(parser))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn parse(
    State(parser): State<Arc<WardrobeParser>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let upload = match multipart {
        Ok(mut multipart) => read_file_field(&mut multipart).await,
        Err(rejection) => Err((rejection.status(), rejection.body_text())),
    };

    let bytes = match upload {
        Ok(bytes) => bytes,
        Err((status, message)) => {
            warn!(%status, %message, "Rejected upload");
            return (status, Json(ParseResponse::failure(message))).into_response();
        },
    };

    let response = tokio::task::spawn_blocking(move || parser.respond(&bytes))
        .await
        .unwrap_or_else(|e| ParseResponse::failure(format!("Parse task failed: {e}")));

    Json(response).into_response()
}

async fn read_file_field(
    multipart: &mut Multipart,
) -> std::result::Result<Bytes, (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            return field.bytes().await.map_err(|e| (e.status(), e.body_text()));
        }
    }

    Err((
        StatusCode::BAD_REQUEST,
        format!("missing multipart field `{FILE_FIELD}`"),
    ))
}
