//! MongoDB store: one collection per entity kind, one document per student
//!
//! Document shape: `{ student_id, <kind>: [ {...}, ... ] }`. A unique index
//! on `student_id` keeps concurrent first inserts from creating two
//! documents; the losing writer falls back to a conditional `$push`.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, Credential, IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, info};

use super::{ChildStore, EntityStore, InsertOutcome};
use crate::config::MongoSettings;
use crate::model::{Entity, Nested};
use crate::Result;

const DUPLICATE_KEY: i32 = 11000;

/// Connect to MongoDB and verify the server answers a ping
pub async fn connect(settings: &MongoSettings) -> Result<Database> {
    let uri = format!("mongodb://{}", settings.host);
    let mut options = ClientOptions::parse(&uri).await?;
    options.app_name = Some(settings.database.clone());
    if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
        options.credential = Some(
            Credential::builder()
                .username(user.clone())
                .password(password.clone())
                .build(),
        );
    }

    let client = Client::with_options(options)?;
    let db = client.database(&settings.database);
    db.run_command(doc! { "ping": 1 }, None).await?;

    info!(host = %settings.host, database = %settings.database, "Connected to MongoDB");
    Ok(db)
}

/// [`EntityStore`] backed by the `E::KIND` collection
pub struct MongoStore<E> {
    collection: Collection<Document>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> MongoStore<E> {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<Document>(E::KIND),
            _entity: PhantomData,
        }
    }

    /// Create the unique `student_id` index (idempotent)
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "student_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        debug!(collection = E::KIND, "Ensured student_id index");
        Ok(())
    }

    fn element_path() -> String {
        format!("{}.{}", E::KIND, E::ID_FIELD)
    }

    /// `$push` guarded by "no element with this id yet"
    async fn push_if_absent(&self, student_id: &str, entity: &E) -> Result<InsertOutcome> {
        let mut filter = doc! { "student_id": student_id };
        filter.insert(Self::element_path(), doc! { "$ne": entity.id() });

        let mut push = Document::new();
        push.insert(E::KIND, bson::to_bson(entity)?);

        let result = self
            .collection
            .update_one(filter, doc! { "$push": push }, None)
            .await?;

        if result.matched_count == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Appended)
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MongoStore<E> {
    async fn load(&self, student_id: &str) -> Result<Option<Vec<E>>> {
        let Some(document) = self
            .collection
            .find_one(doc! { "student_id": student_id }, None)
            .await?
        else {
            return Ok(None);
        };

        let items = match document.get(E::KIND) {
            Some(Bson::Array(array)) => array
                .iter()
                .map(|item| bson::from_bson::<E>(item.clone()))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        Ok(Some(items))
    }

    async fn insert(&self, student_id: &str, entity: &E) -> Result<InsertOutcome> {
        let exists = self
            .collection
            .find_one(doc! { "student_id": student_id }, None)
            .await?
            .is_some();

        if exists {
            return self.push_if_absent(student_id, entity).await;
        }

        let mut document = doc! { "student_id": student_id };
        document.insert(E::KIND, vec![bson::to_bson(entity)?]);

        match self.collection.insert_one(document, None).await {
            Ok(_) => Ok(InsertOutcome::CreatedStudent),
            // Another writer created the student first
            Err(err) if is_duplicate_key(&err) => self.push_if_absent(student_id, entity).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn replace(&self, student_id: &str, entity: &E) -> Result<bool> {
        let mut filter = doc! { "student_id": student_id };
        filter.insert(Self::element_path(), entity.id());

        let mut set = Document::new();
        set.insert(format!("{}.$", E::KIND), bson::to_bson(entity)?);

        let result = self
            .collection
            .update_one(filter, doc! { "$set": set }, None)
            .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl<P, C> ChildStore<P, C> for MongoStore<P>
where
    P: Nested<C>,
    C: Entity,
{
    /// `$push` into the matched parent, guarded in the same update by
    /// parent status and child id so concurrent writers cannot collide
    async fn push_child(
        &self,
        student_id: &str,
        parent_id: &str,
        child: &C,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut element = doc! { "status": { "$ne": "inactive" } };
        element.insert(P::ID_FIELD, parent_id);
        element.insert(
            format!("{}.{}", P::CHILDREN, C::ID_FIELD),
            doc! { "$ne": child.id() },
        );
        let mut filter = doc! { "student_id": student_id };
        filter.insert(P::KIND, doc! { "$elemMatch": element });

        let mut push = Document::new();
        push.insert(format!("{}.$.{}", P::KIND, P::CHILDREN), bson::to_bson(child)?);
        let mut set = Document::new();
        set.insert(format!("{}.$.updated_at", P::KIND), bson::to_bson(&at)?);

        let result = self
            .collection
            .update_one(filter, doc! { "$push": push, "$set": set }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn replace_child(
        &self,
        student_id: &str,
        parent_id: &str,
        child: &C,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut element = Document::new();
        element.insert(P::ID_FIELD, parent_id);
        element.insert(format!("{}.{}", P::CHILDREN, C::ID_FIELD), child.id());
        let mut filter = doc! { "student_id": student_id };
        filter.insert(P::KIND, doc! { "$elemMatch": element });

        let mut set = Document::new();
        set.insert(
            format!("{}.$[p].{}.$[c]", P::KIND, P::CHILDREN),
            bson::to_bson(child)?,
        );
        set.insert(format!("{}.$[p].updated_at", P::KIND), bson::to_bson(&at)?);

        let mut parent_filter = Document::new();
        parent_filter.insert(format!("p.{}", P::ID_FIELD), parent_id);
        let mut child_filter = Document::new();
        child_filter.insert(format!("c.{}", C::ID_FIELD), child.id());
        let options = UpdateOptions::builder()
            .array_filters(vec![parent_filter, child_filter])
            .build();

        let result = self
            .collection
            .update_one(filter, doc! { "$set": set }, options)
            .await?;
        Ok(result.matched_count > 0)
    }
}
