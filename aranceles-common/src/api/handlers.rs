//! Generic CRUD handlers
//!
//! Each service mounts these for its entity kinds via [`entity_routes`]
//! (or individually when a route needs service-specific behavior).
//! Handlers extract `State<EntityService<E>>`, so the service's
//! `AppState` must implement `FromRef` for every entity service it exposes.

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{JsonBody, QueryParams, ServiceResult};
use crate::model::Entity;
use crate::query::{ListPage, ListParams};
use crate::service::EntityService;

/// POST /api/v1/:student_id/<kind>
pub async fn create_entity<E: Entity>(
    State(service): State<EntityService<E>>,
    Path(student_id): Path<String>,
    JsonBody(draft): JsonBody<E::Draft>,
) -> ServiceResult<(StatusCode, Json<E>)> {
    let entity = service.create(&student_id, draft).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

/// GET /api/v1/:student_id/<kind>
pub async fn list_entities<E: Entity>(
    State(service): State<EntityService<E>>,
    Path(student_id): Path<String>,
    QueryParams(params): QueryParams<ListParams>,
) -> ServiceResult<Json<ListPage<E>>> {
    Ok(Json(service.list(&student_id, &params).await?))
}

/// GET /api/v1/:student_id/<kind>/:id
pub async fn get_entity<E: Entity>(
    State(service): State<EntityService<E>>,
    Path((student_id, id)): Path<(String, String)>,
) -> ServiceResult<Json<E>> {
    Ok(Json(service.get(&student_id, &id).await?))
}

/// PUT /api/v1/:student_id/<kind>/:id
pub async fn update_entity<E: Entity>(
    State(service): State<EntityService<E>>,
    Path((student_id, id)): Path<(String, String)>,
    JsonBody(patch): JsonBody<E::Patch>,
) -> ServiceResult<Json<E>> {
    Ok(Json(service.update(&student_id, &id, patch).await?))
}

/// DELETE /api/v1/:student_id/<kind>/:id (soft delete)
pub async fn delete_entity<E: Entity>(
    State(service): State<EntityService<E>>,
    Path((student_id, id)): Path<(String, String)>,
) -> ServiceResult<Json<E>> {
    Ok(Json(service.soft_delete(&student_id, &id).await?))
}

/// Collection path for `E`, e.g. `/api/v1/:student_id/debts`
pub fn collection_path<E: Entity>() -> String {
    format!("/api/v1/:student_id/{}", E::KIND)
}

/// Item path for `E`, e.g. `/api/v1/:student_id/debts/:debt_id`
pub fn item_path<E: Entity>() -> String {
    format!("{}/:{}", collection_path::<E>(), E::ID_FIELD)
}

/// Standard five CRUD routes for entity kind `E`
pub fn entity_routes<S, E>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    E: Entity,
    EntityService<E>: FromRef<S>,
{
    Router::new()
        .route(
            &collection_path::<E>(),
            post(create_entity::<E>).get(list_entities::<E>),
        )
        .route(
            &item_path::<E>(),
            get(get_entity::<E>)
                .put(update_entity::<E>)
                .delete(delete_entity::<E>),
        )
}
