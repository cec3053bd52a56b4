//! In-memory store used by tests and local runs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ChildStore, EntityStore, InsertOutcome};
use crate::model::{Entity, EntityStatus, Nested};
use crate::Result;

/// Student arrays kept in a map behind a tokio RwLock
pub struct MemoryStore<E> {
    students: RwLock<HashMap<String, Vec<E>>>,
}

impl<E> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            students: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    async fn load(&self, student_id: &str) -> Result<Option<Vec<E>>> {
        Ok(self.students.read().await.get(student_id).cloned())
    }

    async fn insert(&self, student_id: &str, entity: &E) -> Result<InsertOutcome> {
        let mut students = self.students.write().await;
        match students.get_mut(student_id) {
            Some(items) => {
                if items.iter().any(|e| e.id() == entity.id()) {
                    return Ok(InsertOutcome::Duplicate);
                }
                items.push(entity.clone());
                Ok(InsertOutcome::Appended)
            }
            None => {
                students.insert(student_id.to_string(), vec![entity.clone()]);
                Ok(InsertOutcome::CreatedStudent)
            }
        }
    }

    async fn replace(&self, student_id: &str, entity: &E) -> Result<bool> {
        let mut students = self.students.write().await;
        let slot = students
            .get_mut(student_id)
            .and_then(|items| items.iter_mut().find(|e| e.id() == entity.id()));
        match slot {
            Some(existing) => {
                *existing = entity.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<P> MemoryStore<P> {
    /// Run `write` on one parent while holding the write lock
    async fn with_parent<F>(&self, student_id: &str, parent_id: &str, write: F) -> bool
    where
        P: Entity,
        F: FnOnce(&mut P) -> bool,
    {
        let mut students = self.students.write().await;
        students
            .get_mut(student_id)
            .and_then(|items| items.iter_mut().find(|p| p.id() == parent_id))
            .map(write)
            .unwrap_or(false)
    }
}

#[async_trait]
impl<P, C> ChildStore<P, C> for MemoryStore<P>
where
    P: Nested<C>,
    C: Entity,
{
    async fn push_child(
        &self,
        student_id: &str,
        parent_id: &str,
        child: &C,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .with_parent(student_id, parent_id, |parent| {
                if parent.status() == EntityStatus::Inactive
                    || parent.children().iter().any(|c| c.id() == child.id())
                {
                    return false;
                }
                parent.children_mut().push(child.clone());
                parent.set_updated_at(at);
                true
            })
            .await)
    }

    async fn replace_child(
        &self,
        student_id: &str,
        parent_id: &str,
        child: &C,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self
            .with_parent(student_id, parent_id, |parent| {
                let Some(existing) = parent
                    .children_mut()
                    .iter_mut()
                    .find(|c| c.id() == child.id())
                else {
                    return false;
                };
                *existing = child.clone();
                parent.set_updated_at(at);
                true
            })
            .await)
    }
}
