//! Domain events exchanged between services
//!
//! Every successful mutation publishes one event on the subject
//! `<entity>.<id>.<action>` (e.g. `debts.D-01.updated`). The body names the
//! publishing service so consumers can drop their own echoes.

mod bus;

pub use bus::{subject_matches, LocalBus, LocalSubscription};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::api::{ServiceError, ServiceResult};

/// Mutation carried by an event (last routing-key segment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ServiceError;

    fn from_str(s: &str) -> ServiceResult<Self> {
        match s {
            "created" => Ok(Action::Created),
            "updated" => Ok(Action::Updated),
            "deleted" => Ok(Action::Deleted),
            other => Err(ServiceError::BadRequest(format!("unknown action '{}'", other))),
        }
    }
}

/// Parsed `<entity>.<id>.<action>` subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingKey {
    pub entity: String,
    pub id: String,
    pub action: Action,
}

impl RoutingKey {
    pub fn new(entity: impl Into<String>, id: impl Into<String>, action: Action) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
            action,
        }
    }

    /// Parse a subject; exactly three non-empty segments are required
    pub fn parse(subject: &str) -> ServiceResult<Self> {
        let parts: Vec<&str> = subject.split('.').collect();
        let [entity, id, action] = parts.as_slice() else {
            return Err(ServiceError::BadRequest(format!(
                "malformed routing key '{}'",
                subject
            )));
        };
        if entity.is_empty() || id.is_empty() {
            return Err(ServiceError::BadRequest(format!(
                "malformed routing key '{}'",
                subject
            )));
        }
        Ok(Self::new(*entity, *id, action.parse()?))
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.entity, self.id, self.action)
    }
}

/// JSON body of a domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBody {
    /// Correlation id, absent on events from older producers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub origin_service: String,
    pub student_id: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Routing key plus body, ready to publish
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub key: RoutingKey,
    pub body: EventBody,
}

impl DomainEvent {
    /// Build a fresh event stamped with a new id and the current time
    pub fn new(key: RoutingKey, origin: &str, student_id: &str, data: Value) -> Self {
        Self {
            key,
            body: EventBody {
                event_id: Some(Uuid::new_v4()),
                origin_service: origin.to_string(),
                student_id: student_id.to_string(),
                data,
                occurred_at: Some(Utc::now()),
            },
        }
    }

    pub fn subject(&self) -> String {
        self.key.to_string()
    }

    pub fn payload(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.body)?)
    }
}
