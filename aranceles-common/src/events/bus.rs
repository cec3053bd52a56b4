//! In-process topic bus
//!
//! A tokio broadcast channel standing in for the broker when services run
//! inside one process (tests, local development). Subscribers register a
//! subject pattern with the same wildcards the broker understands:
//! `*` matches one segment, `>` matches one or more trailing segments.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::DomainEvent;
use crate::broker::EventPublisher;

/// Broadcast bus carrying [`DomainEvent`]s
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl LocalBus {
    /// Create a bus buffering up to `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future events whose subject matches `pattern`
    pub fn subscribe_to(&self, pattern: &str) -> LocalSubscription {
        LocalSubscription {
            rx: self.tx.subscribe(),
            pattern: pattern.to_string(),
        }
    }

    /// Emit an event, ignoring the case where nobody listens
    pub fn emit_lossy(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            debug!("No local subscribers for event");
        }
    }
}

#[async_trait]
impl EventPublisher for LocalBus {
    async fn publish(&self, event: &DomainEvent) -> crate::Result<()> {
        self.emit_lossy(event.clone());
        Ok(())
    }
}

/// Filtered receiver returned by [`LocalBus::subscribe_to`]
pub struct LocalSubscription {
    rx: broadcast::Receiver<DomainEvent>,
    pattern: String,
}

impl LocalSubscription {
    /// Wait for the next matching event; `None` once the bus is dropped
    pub async fn next(&mut self) -> Option<DomainEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if subject_matches(&self.pattern, &event.subject()) => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(pattern = %self.pattern, skipped, "Local subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting
    pub fn try_next(&mut self) -> Option<DomainEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if subject_matches(&self.pattern, &event.subject()) => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(pattern = %self.pattern, skipped, "Local subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every matching event already buffered
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

/// Match a dot-separated subject against a wildcard pattern
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_parts = pattern.split('.');
    let mut subject_parts = subject.split('.');

    loop {
        match (pattern_parts.next(), subject_parts.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
