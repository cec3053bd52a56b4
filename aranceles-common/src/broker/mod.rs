//! Message broker integration
//!
//! Services publish through the [`EventPublisher`] seam so handlers can run
//! against NATS JetStream in production and the in-process
//! [`crate::events::LocalBus`] in tests.

mod nats;
mod retry;

pub use nats::{spawn_consumer, NatsPublisher};
pub use retry::retry_fixed;

use async_trait::async_trait;

use crate::events::DomainEvent;
use crate::Result;

/// Publishes domain events, resolving once the broker has accepted them
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<()>;
}
