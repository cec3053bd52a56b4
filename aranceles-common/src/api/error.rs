//! Domain error taxonomy and its HTTP mapping
//!
//! Every handler returns [`ServiceError`]; the response body is always
//! `{"detail": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by entity operations (HTTP path and event replay alike)
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Student aggregate or child entity does not exist (404)
    #[error("{0}")]
    NotFound(String),

    /// Child entity with the same business id already exists (409)
    #[error("{0}")]
    Conflict(String),

    /// Invalid payload, empty patch or bad query parameter (400)
    #[error("{0}")]
    BadRequest(String),

    /// Soft delete of an entity that is already inactive (400)
    #[error("{kind} {id} already deleted")]
    AlreadyDeleted { kind: &'static str, id: String },

    /// Store or broker failure (500)
    #[error("{0}")]
    Upstream(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::BadRequest(_) | ServiceError::AlreadyDeleted { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::Error> for ServiceError {
    fn from(err: crate::Error) -> Self {
        ServiceError::Upstream(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Upstream failure: {}", self);
        }

        let body = Json(json!({
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for entity operations and handlers
pub type ServiceResult<T> = Result<T, ServiceError>;
