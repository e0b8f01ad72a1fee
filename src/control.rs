use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::AppError;
use crate::instance::Instance;

#[derive(Clone)]
struct AppState {
    instance: Arc<Instance>,
    shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    id: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct CreateResponse {
    source: String,
}

/// Builds the control-surface router. `shutdown` is cancelled when a
/// handler panics, so the caller can treat that as a stop request.
pub fn router(instance: Arc<Instance>, shutdown: CancellationToken) -> Router {
    let state = AppState { instance, shutdown };

    Router::new()
        .route("/create", post(create))
        .route("/:id/stop", post(stop))
        .route("/:id/status", get(status))
        .route("/status", get(status_all))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(catch_panic))
        .with_state(state)
}

async fn catch_panic(
    State(state): State<AppState>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            error!("panic in control handler, shutting down control server");
            state.shutdown.cancel();
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "internal error" })),
            )
                .into_response()
        }
    }
}

async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.id.is_empty() || req.source.is_empty() {
        return Err(AppError::Validation(
            "both 'id' and 'source' are required".into(),
        ));
    }
    let local = state.instance.add_unit(&req.id, &req.source, "").await?;
    Ok(Json(CreateResponse { source: local }))
}

async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state.instance.remove_unit(&id).await {
        Ok(axum::http::StatusCode::OK)
    } else {
        Err(AppError::Validation(format!("unit '{id}' not found")))
    }
}

async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match state.instance.unit_status(&id).await {
        Some(status) => Ok(Json(status)),
        None => Err(AppError::NotFound(format!("unit '{id}' not found"))),
    }
}

async fn status_all(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let all = state.instance.all_status().await;
    if all.is_empty() {
        return Err(AppError::NotFound("no units registered".into()));
    }
    Ok(Json(all))
}
