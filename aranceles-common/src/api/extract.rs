//! Request extractors whose rejections use the `{"detail"}` error body
//!
//! axum's own `Json` and `Query` reject with a plain-text 400/422. These
//! wrappers route the rejection through [`ServiceError::BadRequest`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use super::ServiceError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct JsonBody<T>(pub T);

/// Query string parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::BadRequest(rejection.body_text())
    }
}
