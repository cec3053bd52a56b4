//! Common error types for the aranceles services

use thiserror::Error;

/// Common result type for store, broker and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors shared by every service
///
/// Domain outcomes (not found, conflict, bad request) live in
/// [`crate::api::ServiceError`]; this enum only covers the plumbing underneath.
#[derive(Error, Debug)]
pub enum Error {
    /// Document store operation error (wraps mongodb::error::Error)
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// Entity could not be encoded as a BSON document
    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] mongodb::bson::ser::Error),

    /// Stored document could not be decoded into an entity
    #[error("BSON decode error: {0}")]
    BsonDecode(#[from] mongodb::bson::de::Error),

    /// Message broker connection, publish or consume error
    #[error("Broker error: {0}")]
    Broker(String),

    /// JSON (de)serialization error for event payloads
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap any broker client error, keeping only its message
    pub fn broker(err: impl std::fmt::Display) -> Self {
        Self::Broker(err.to_string())
    }
}
