use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    /// Bad id, bad URL, duplicate unit, bad path name.
    Validation(String),
    /// Encoder missing, stderr pipe could not be opened.
    Spawn(String),
    /// Unit/path not found.
    NotFound(String),
    /// Id already registered.
    AlreadyExists(String),
    /// Start/Stop called in the wrong lifecycle state.
    NotRunning(String),
    /// Inbox request lost its actor to cancellation.
    Terminated,
    /// Anything else (I/O, parse errors at the edges).
    Internal(anyhow::Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(m) => write!(f, "{m}"),
            AppError::Spawn(m) => write!(f, "{m}"),
            AppError::NotFound(m) => write!(f, "{m}"),
            AppError::AlreadyExists(m) => write!(f, "{m}"),
            AppError::NotRunning(m) => write!(f, "{m}"),
            AppError::Terminated => write!(f, "terminated"),
            AppError::Internal(e) => write!(f, "{e}"),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Spawn(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::AlreadyExists(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotRunning(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Terminated => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, axum::Json(json!({ "message": message }))).into_response()
    }
}
