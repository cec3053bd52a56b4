//! HTTP surface shared by every service

pub mod error;
pub mod extract;
pub mod handlers;
pub mod health;

pub use error::{ServiceError, ServiceResult};
pub use extract::{JsonBody, QueryParams};
pub use health::{health_routes, ConsumerHealth, ConsumerStatus, ServiceInfo};
