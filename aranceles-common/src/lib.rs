//! # Aranceles Common Library
//!
//! Shared code for the aranceles microservices (benefits, debts, payments):
//! - Entity model traits and list queries
//! - Student document stores (MongoDB and in-memory)
//! - Domain events, the in-process bus and the NATS JetStream broker
//! - Event replay (sync) and the generic entity service
//! - HTTP error mapping, generic handlers and health routes
//! - Configuration loading, tracing setup and server bootstrap

pub mod api;
pub mod broker;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod query;
pub mod server;
pub mod service;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use model::{Entity, EntityPatch, EntityStatus};
pub use service::EntityService;
