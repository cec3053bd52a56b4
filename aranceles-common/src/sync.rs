//! Event replay: turning a received domain event into a local mutation
//!
//! The broker consumer hands every message to [`dispatch`], which parses the
//! subject and body, drops the service's own echoes and calls the service's
//! [`SyncHandler`]. The returned [`Disposition`] decides how the message is
//! acknowledged.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{ServiceError, ServiceResult};
use crate::events::{Action, DomainEvent, EventBody, RoutingKey};
use crate::model::Entity;
use crate::service::EntityService;

/// What happened to one received event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The local mutation was committed
    Applied,
    /// The local state already reflected the event (duplicate delivery)
    AlreadyApplied,
    /// Published by this service; discarded
    SelfOrigin,
    /// Transient failure; ask the broker to redeliver later
    Retry(String),
    /// Never applicable; drop without redelivery
    Reject(String),
}

impl Disposition {
    /// Classify the result of replaying `action`
    pub fn from_outcome(action: Action, outcome: ServiceResult<()>) -> Self {
        match outcome {
            Ok(()) => Disposition::Applied,
            Err(ServiceError::Conflict(_)) if action == Action::Created => {
                Disposition::AlreadyApplied
            }
            Err(ServiceError::AlreadyDeleted { .. }) if action == Action::Deleted => {
                Disposition::AlreadyApplied
            }
            // Update or delete may race ahead of the create
            Err(ServiceError::NotFound(msg)) | Err(ServiceError::Upstream(msg)) => {
                Disposition::Retry(msg)
            }
            Err(err) => Disposition::Reject(err.to_string()),
        }
    }

    /// True when the message should be positively acknowledged
    pub fn is_ack(&self) -> bool {
        matches!(
            self,
            Disposition::Applied | Disposition::AlreadyApplied | Disposition::SelfOrigin
        )
    }
}

/// Service-specific replay of events addressed to its entity type
#[async_trait]
pub trait SyncHandler: Send + Sync {
    /// Name compared against `origin_service`; also the consumer name
    fn service_name(&self) -> &str;

    /// Apply one event from another service
    async fn apply(&self, key: &RoutingKey, body: EventBody) -> ServiceResult<()>;
}

/// Parse and apply one raw broker message
pub async fn dispatch(handler: &dyn SyncHandler, subject: &str, payload: &[u8]) -> Disposition {
    let key = match RoutingKey::parse(subject) {
        Ok(key) => key,
        Err(err) => {
            warn!(subject, error = %err, "Rejecting event with malformed subject");
            return Disposition::Reject(err.to_string());
        }
    };

    let body: EventBody = match serde_json::from_slice(payload) {
        Ok(body) => body,
        Err(err) => {
            warn!(subject, error = %err, "Rejecting undecodable event body");
            return Disposition::Reject(format!("undecodable event body: {}", err));
        }
    };

    if body.origin_service == handler.service_name() {
        debug!(subject, "Ignoring own event");
        return Disposition::SelfOrigin;
    }

    let event_id = body.event_id.map(|id| id.to_string()).unwrap_or_default();
    let student_id = body.student_id.clone();
    let origin = body.origin_service.clone();

    let disposition = Disposition::from_outcome(key.action, handler.apply(&key, body).await);

    match &disposition {
        Disposition::Applied => info!(
            subject,
            event_id = %event_id,
            student_id = %student_id,
            origin = %origin,
            "Applied remote event"
        ),
        Disposition::AlreadyApplied => debug!(
            subject,
            event_id = %event_id,
            student_id = %student_id,
            "Remote event already applied"
        ),
        Disposition::Retry(reason) => warn!(
            subject,
            event_id = %event_id,
            student_id = %student_id,
            reason = %reason,
            "Remote event not applicable yet, will retry"
        ),
        Disposition::Reject(reason) => warn!(
            subject,
            event_id = %event_id,
            student_id = %student_id,
            reason = %reason,
            "Rejecting remote event"
        ),
        Disposition::SelfOrigin => {}
    }

    disposition
}

/// Feed an in-process event through [`dispatch`]
pub async fn deliver(handler: &dyn SyncHandler, event: &DomainEvent) -> Disposition {
    match event.payload() {
        Ok(payload) => dispatch(handler, &event.subject(), &payload).await,
        Err(err) => Disposition::Reject(err.to_string()),
    }
}

/// Read a remote `created` payload as a draft, taking the id from the key when absent
pub fn draft_from_event<E: Entity>(key: &RoutingKey, data: Value) -> ServiceResult<E::Draft> {
    let Value::Object(mut map) = data else {
        return Err(ServiceError::BadRequest(format!(
            "{} event data must be an object",
            E::LABEL
        )));
    };
    map.entry(E::ID_FIELD)
        .or_insert_with(|| Value::String(key.id.clone()));

    serde_json::from_value(Value::Object(map))
        .map_err(|e| ServiceError::BadRequest(format!("invalid {} payload: {}", E::LABEL, e)))
}

/// Read a remote `updated` payload as a sparse patch
pub fn patch_from_event<E: Entity>(data: Value) -> ServiceResult<E::Patch> {
    serde_json::from_value(data)
        .map_err(|e| ServiceError::BadRequest(format!("invalid {} patch: {}", E::LABEL, e)))
}

/// Straight replay of `<kind>.<id>.<action>` onto one entity service
pub struct EntitySync<E: Entity> {
    name: String,
    service: EntityService<E>,
}

impl<E: Entity> EntitySync<E> {
    pub fn new(name: impl Into<String>, service: EntityService<E>) -> Self {
        Self {
            name: name.into(),
            service,
        }
    }
}

#[async_trait]
impl<E: Entity> SyncHandler for EntitySync<E> {
    fn service_name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, key: &RoutingKey, body: EventBody) -> ServiceResult<()> {
        if key.entity != E::KIND {
            return Err(ServiceError::BadRequest(format!(
                "unexpected entity type '{}'",
                key.entity
            )));
        }
        replay(&self.service, key, body).await
    }
}

/// Apply created/updated/deleted to `service` without republishing
pub async fn replay<E: Entity>(
    service: &EntityService<E>,
    key: &RoutingKey,
    body: EventBody,
) -> ServiceResult<()> {
    match key.action {
        Action::Created => {
            let draft = draft_from_event::<E>(key, body.data)?;
            service.insert(&body.student_id, draft).await?;
        }
        Action::Updated => {
            let patch = patch_from_event::<E>(body.data)?;
            service.modify(&body.student_id, &key.id, patch).await?;
        }
        Action::Deleted => {
            service.deactivate(&body.student_id, &key.id).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
        outcome: fn() -> ServiceResult<()>,
    }

    #[async_trait]
    impl SyncHandler for Recorder {
        fn service_name(&self) -> &str {
            "debts"
        }

        async fn apply(&self, key: &RoutingKey, _body: EventBody) -> ServiceResult<()> {
            self.seen.lock().unwrap().push(key.to_string());
            (self.outcome)()
        }
    }

    fn recorder(outcome: fn() -> ServiceResult<()>) -> Recorder {
        Recorder {
            seen: Mutex::new(Vec::new()),
            outcome,
        }
    }

    fn body(origin: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "origin_service": origin,
            "student_id": "s1",
            "data": {"paid": true}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_applies_foreign_event() {
        let handler = recorder(|| Ok(()));
        let disposition = dispatch(&handler, "debts.D1.updated", &body("payments")).await;
        assert_eq!(disposition, Disposition::Applied);
        assert_eq!(*handler.seen.lock().unwrap(), vec!["debts.D1.updated"]);
    }

    #[tokio::test]
    async fn test_dispatch_discards_own_event() {
        let handler = recorder(|| Ok(()));
        let disposition = dispatch(&handler, "debts.D1.updated", &body("debts")).await;
        assert_eq!(disposition, Disposition::SelfOrigin);
        assert!(disposition.is_ack());
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_rejects_garbage() {
        let handler = recorder(|| Ok(()));
        assert!(matches!(
            dispatch(&handler, "debts.D1", &body("payments")).await,
            Disposition::Reject(_)
        ));
        assert!(matches!(
            dispatch(&handler, "debts.D1.updated", b"not json").await,
            Disposition::Reject(_)
        ));
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_retried() {
        let handler = recorder(|| Err(ServiceError::NotFound("Debt D1 not found".into())));
        let disposition = dispatch(&handler, "debts.D1.updated", &body("payments")).await;
        assert!(matches!(disposition, Disposition::Retry(_)));
        assert!(!disposition.is_ack());
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(
            Disposition::from_outcome(Action::Created, Err(ServiceError::Conflict("dup".into()))),
            Disposition::AlreadyApplied
        );
        assert_eq!(
            Disposition::from_outcome(
                Action::Deleted,
                Err(ServiceError::AlreadyDeleted { kind: "Debt", id: "D1".into() })
            ),
            Disposition::AlreadyApplied
        );
        assert!(matches!(
            Disposition::from_outcome(Action::Updated, Err(ServiceError::BadRequest("x".into()))),
            Disposition::Reject(_)
        ));
        assert!(matches!(
            Disposition::from_outcome(Action::Created, Err(ServiceError::Upstream("db".into()))),
            Disposition::Retry(_)
        ));
    }
}
