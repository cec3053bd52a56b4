//! Student document stores
//!
//! One document per student holds the embedded array of entities of a
//! single kind. Stores only know how to load that array, push a new element
//! and replace an existing one (plus the same two writes one level down for
//! [`Nested`] children); every business rule lives in the services.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::{connect, MongoStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Entity, Nested};
use crate::Result;

/// Result of pushing a new entity into a student's array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The student document did not exist and was created
    CreatedStudent,
    /// The entity was appended to an existing student document
    Appended,
    /// An entity with the same id is already present; nothing written
    Duplicate,
}

/// Persistence seam for one entity kind
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Load the student's array; `None` when the student is unknown
    async fn load(&self, student_id: &str) -> Result<Option<Vec<E>>>;

    /// Append `entity` unless its id is already present
    async fn insert(&self, student_id: &str, entity: &E) -> Result<InsertOutcome>;

    /// Overwrite the element with the same id; `false` when none matched
    async fn replace(&self, student_id: &str, entity: &E) -> Result<bool>;
}

/// Atomic writes on the children embedded in a parent entity
///
/// Both operations also stamp the parent's `updated_at` with `at`.
#[async_trait]
pub trait ChildStore<P: Nested<C>, C: Entity>: Send + Sync {
    /// Append `child` to parent `parent_id`
    ///
    /// Nothing is written (`false`) when the parent is missing or inactive,
    /// or already holds a child with the same id.
    async fn push_child(
        &self,
        student_id: &str,
        parent_id: &str,
        child: &C,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Overwrite the child with the same id; `false` when none matched
    async fn replace_child(
        &self,
        student_id: &str,
        parent_id: &str,
        child: &C,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}
