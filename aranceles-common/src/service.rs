//! Generic entity service
//!
//! Holds the store and publisher handles for one entity kind and implements
//! the CRUD rules once. The store-only operations (`insert`, `modify`,
//! `deactivate`) are shared by the HTTP path and event replay; the HTTP
//! path (`create`, `update`, `soft_delete`) additionally publishes the
//! matching domain event.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::api::{ServiceError, ServiceResult};
use crate::broker::EventPublisher;
use crate::events::{Action, DomainEvent, RoutingKey};
use crate::model::{Entity, EntityPatch, EntityStatus};
use crate::query::{ListPage, ListParams};
use crate::store::{EntityStore, InsertOutcome};

/// CRUD operations plus event publishing for entities of kind `E`
pub struct EntityService<E: Entity> {
    store: Arc<dyn EntityStore<E>>,
    publisher: Arc<dyn EventPublisher>,
    origin: Arc<str>,
}

impl<E: Entity> Clone for EntityService<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
            origin: Arc::clone(&self.origin),
        }
    }
}

fn student_not_found(student_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Student {} not found", student_id))
}

impl<E: Entity> EntityService<E> {
    /// `origin` is the service name stamped on published events
    pub fn new(
        store: Arc<dyn EntityStore<E>>,
        publisher: Arc<dyn EventPublisher>,
        origin: &str,
    ) -> Self {
        Self {
            store,
            publisher,
            origin: Arc::from(origin),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn not_found(id: &str) -> ServiceError {
        ServiceError::NotFound(format!("{} {} not found", E::LABEL, id))
    }

    async fn load(&self, student_id: &str) -> ServiceResult<Vec<E>> {
        self.store
            .load(student_id)
            .await?
            .ok_or_else(|| student_not_found(student_id))
    }

    /// Validate a draft and append it to the student's array
    pub async fn insert(&self, student_id: &str, draft: E::Draft) -> ServiceResult<E> {
        let entity = E::from_draft(draft, Utc::now())?;

        match self.store.insert(student_id, &entity).await? {
            InsertOutcome::Duplicate => Err(ServiceError::Conflict(format!(
                "{} {} already exists for student {}",
                E::LABEL,
                entity.id(),
                student_id
            ))),
            outcome => {
                debug!(
                    student_id,
                    kind = E::KIND,
                    id = entity.id(),
                    ?outcome,
                    "Stored entity"
                );
                Ok(entity)
            }
        }
    }

    pub async fn get(&self, student_id: &str, id: &str) -> ServiceResult<E> {
        self.load(student_id)
            .await?
            .into_iter()
            .find(|e| e.id() == id)
            .ok_or_else(|| Self::not_found(id))
    }

    pub async fn list(&self, student_id: &str, params: &ListParams) -> ServiceResult<ListPage<E>> {
        self.list_matching(student_id, params, |_| true).await
    }

    /// List with an extra predicate applied before the standard filters
    pub async fn list_matching<F>(
        &self,
        student_id: &str,
        params: &ListParams,
        predicate: F,
    ) -> ServiceResult<ListPage<E>>
    where
        F: Fn(&E) -> bool,
    {
        let items = self
            .load(student_id)
            .await?
            .into_iter()
            .filter(|e| predicate(e))
            .collect();
        params.apply(student_id, items)
    }

    /// Persist an already modified entity (same id)
    pub async fn save(&self, student_id: &str, entity: &E) -> ServiceResult<()> {
        if self.store.replace(student_id, entity).await? {
            Ok(())
        } else {
            Err(Self::not_found(entity.id()))
        }
    }

    /// Merge a sparse patch into an existing entity
    pub async fn modify(&self, student_id: &str, id: &str, patch: E::Patch) -> ServiceResult<E> {
        if patch.is_empty() {
            return Err(ServiceError::BadRequest("No fields to update".to_string()));
        }

        let mut entity = self.get(student_id, id).await?;
        entity.apply_patch(patch)?;
        entity.set_updated_at(Utc::now());
        self.save(student_id, &entity).await?;
        Ok(entity)
    }

    /// Flip the entity to inactive
    pub async fn deactivate(&self, student_id: &str, id: &str) -> ServiceResult<E> {
        let mut entity = self.get(student_id, id).await?;
        if entity.status() == EntityStatus::Inactive {
            return Err(ServiceError::AlreadyDeleted {
                kind: E::LABEL,
                id: id.to_string(),
            });
        }
        entity.set_status(EntityStatus::Inactive);
        entity.set_updated_at(Utc::now());
        self.save(student_id, &entity).await?;
        Ok(entity)
    }

    /// Build an event stamped with this service as origin
    pub fn event(&self, key: RoutingKey, student_id: &str, data: Value) -> DomainEvent {
        DomainEvent::new(key, &self.origin, student_id, data)
    }

    /// Publish an event, surfacing broker failure as Upstream
    pub async fn publish(&self, event: DomainEvent) -> ServiceResult<()> {
        self.publisher.publish(&event).await?;
        info!(
            subject = %event.key,
            student_id = %event.body.student_id,
            event_id = ?event.body.event_id,
            "Published event"
        );
        Ok(())
    }

    /// Publish `<kind>.<id>.<action>` carrying the entity's full field set
    pub async fn publish_entity(
        &self,
        action: Action,
        student_id: &str,
        entity: &E,
    ) -> ServiceResult<()> {
        let data = serde_json::to_value(entity).map_err(crate::Error::from)?;
        let key = RoutingKey::new(E::KIND, entity.id(), action);
        self.publish(self.event(key, student_id, data)).await
    }

    pub async fn create(&self, student_id: &str, draft: E::Draft) -> ServiceResult<E> {
        let entity = self.insert(student_id, draft).await?;
        self.publish_entity(Action::Created, student_id, &entity)
            .await?;
        Ok(entity)
    }

    pub async fn update(&self, student_id: &str, id: &str, patch: E::Patch) -> ServiceResult<E> {
        let entity = self.modify(student_id, id, patch).await?;
        self.publish_entity(Action::Updated, student_id, &entity)
            .await?;
        Ok(entity)
    }

    /// Soft delete; the event carries only `{student_id, <id_field>}`
    pub async fn soft_delete(&self, student_id: &str, id: &str) -> ServiceResult<E> {
        let entity = self.deactivate(student_id, id).await?;

        let mut data = Map::new();
        data.insert("student_id".to_string(), json!(student_id));
        data.insert(E::ID_FIELD.to_string(), json!(id));
        let key = RoutingKey::new(E::KIND, id, Action::Deleted);
        self.publish(self.event(key, student_id, Value::Object(data)))
            .await?;

        Ok(entity)
    }
}
