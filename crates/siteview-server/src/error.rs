use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use siteview_core::error::CoreError;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        field: Option<&'static str>,
        message: String,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("partial write for session {session_id}")]
    PartialWrite { session_id: String },
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, message } => AppError::BadRequest {
                field: Some(field),
                message,
            },
            CoreError::StoreUnavailable(e) => AppError::StoreUnavailable(e.to_string()),
            CoreError::PartialWrite { session_id, .. } => AppError::PartialWrite { session_id },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = match &self {
            AppError::BadRequest { field, message } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.clone(),
                *field,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Not authenticated".to_string(),
                None,
            ),
            AppError::StoreUnavailable(detail) => {
                tracing::error!(detail = %detail, "Analytics store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "Analytics store is unavailable, retry later".to_string(),
                    None,
                )
            }
            AppError::PartialWrite { session_id } => {
                tracing::error!(session_id = %session_id, "Page view counted without event");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "partial_write",
                    "Session was updated but the event was not recorded".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                    "field": field
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::Value;

    async fn render(err: CoreError) -> (StatusCode, Value) {
        let response = AppError::from(err).into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("parse JSON"))
    }

    #[tokio::test]
    async fn core_errors_map_to_client_or_retryable_statuses() {
        let (status, body) = render(CoreError::validation("limit", "too big")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["field"], "limit");
        assert_eq!(body["error"]["message"], "too big");

        let (status, body) = render(CoreError::StoreUnavailable(anyhow!("locked"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "store_unavailable");
        assert_eq!(body["error"]["field"], Value::Null);

        let (status, body) = render(CoreError::PartialWrite {
            session_id: "s1".to_string(),
            source: anyhow!("disk full"),
        })
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "partial_write");
    }
}
