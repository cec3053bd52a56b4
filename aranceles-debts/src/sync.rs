//! Replay of `debts.*.*` events
//!
//! Besides plain debt replication, the payments service settles charges by
//! publishing `debts.<id>.updated` with `paid: true`. When the payload says
//! `type: matricula` the id names an enrollment, not a debt. Any other type
//! than `arancel` or `matricula` has no charge here to settle.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use aranceles_common::api::{ServiceError, ServiceResult};
use aranceles_common::events::{Action, EventBody, RoutingKey};
use aranceles_common::sync::{patch_from_event, replay, SyncHandler};
use aranceles_common::{Entity, EntityService};

use crate::models::{Debt, Enrollment};
use crate::SERVICE_NAME;

/// Sync handler for the debts consumer
pub struct DebtSync {
    debts: EntityService<Debt>,
    enrollments: EntityService<Enrollment>,
}

impl DebtSync {
    pub fn new(debts: EntityService<Debt>, enrollments: EntityService<Enrollment>) -> Self {
        Self { debts, enrollments }
    }
}

#[derive(Debug, PartialEq)]
enum Target {
    Debt,
    Enrollment,
}

/// Which collection a `debts.*.*` payload refers to
fn target_of(data: &Value) -> ServiceResult<Target> {
    match data.get("type") {
        None | Some(Value::Null) => Ok(Target::Debt),
        Some(Value::String(kind)) if kind == "arancel" => Ok(Target::Debt),
        Some(Value::String(kind)) if kind == "matricula" => Ok(Target::Enrollment),
        Some(other) => Err(ServiceError::BadRequest(format!(
            "unsupported settlement type {}",
            other
        ))),
    }
}

#[async_trait]
impl SyncHandler for DebtSync {
    fn service_name(&self) -> &str {
        SERVICE_NAME
    }

    async fn apply(&self, key: &RoutingKey, body: EventBody) -> ServiceResult<()> {
        if key.entity != Debt::KIND {
            return Err(ServiceError::BadRequest(format!(
                "unexpected entity type '{}'",
                key.entity
            )));
        }

        let target = target_of(&body.data)?;
        if key.action == Action::Updated && target == Target::Enrollment {
            debug!(enrollment_id = %key.id, student_id = %body.student_id, "Settling enrollment");
            let patch = patch_from_event::<Enrollment>(body.data)?;
            self.enrollments
                .modify(&body.student_id, &key.id, patch)
                .await?;
            return Ok(());
        }

        replay(&self.debts, key, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settlement_target() {
        assert_eq!(
            target_of(&json!({"type": "matricula", "paid": true})).unwrap(),
            Target::Enrollment
        );
        assert_eq!(
            target_of(&json!({"type": "arancel", "paid": true})).unwrap(),
            Target::Debt
        );
        assert_eq!(target_of(&json!({"paid": true})).unwrap(), Target::Debt);
        assert_eq!(target_of(&json!({"type": null})).unwrap(), Target::Debt);
    }

    #[test]
    fn test_other_settlement_types_are_refused() {
        for data in [
            json!({"type": "beneficio", "paid": true}),
            json!({"type": "ARANCEL"}),
            json!({"type": 3}),
        ] {
            assert!(matches!(target_of(&data), Err(ServiceError::BadRequest(_))));
        }
    }
}
