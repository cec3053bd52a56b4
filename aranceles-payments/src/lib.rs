//! aranceles-payments library - Payments service
//!
//! Payments made by students. Payments referencing a debt settle it in the
//! debts service; payments disbursed through a benefit arrive as
//! `payments.*.created` events from the benefits service.

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};

use aranceles_common::api::handlers::{
    collection_path, delete_entity, get_entity, item_path, list_entities, update_entity,
};
use aranceles_common::api::{health_routes, ConsumerHealth, ServiceInfo};
use aranceles_common::broker::EventPublisher;
use aranceles_common::store::{EntityStore, MemoryStore};
use aranceles_common::sync::{EntitySync, SyncHandler};
use aranceles_common::EntityService;

pub mod models;
pub mod settlement;

use models::Payment;

/// Service name: event origin tag, consumer name and default database
pub const SERVICE_NAME: &str = "payments";

pub const DEFAULT_PORT: u16 = 8002;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub payments: EntityService<Payment>,
    pub info: ServiceInfo,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore<Payment>>,
        publisher: Arc<dyn EventPublisher>,
        consumer: ConsumerHealth,
    ) -> Self {
        Self {
            payments: EntityService::new(store, publisher, SERVICE_NAME),
            info: ServiceInfo {
                module: SERVICE_NAME,
                version: env!("CARGO_PKG_VERSION"),
                consumer,
            },
        }
    }

    /// State backed by an in-memory store (tests, local runs)
    pub fn in_memory(publisher: Arc<dyn EventPublisher>) -> Self {
        Self::new(
            Arc::new(MemoryStore::<Payment>::new()),
            publisher,
            ConsumerHealth::new(),
        )
    }

    /// Replays `payments.*.*` events, e.g. benefit disbursements
    pub fn sync_handler(&self) -> Arc<dyn SyncHandler> {
        Arc::new(EntitySync::new(SERVICE_NAME, self.payments.clone()))
    }
}

impl FromRef<AppState> for EntityService<Payment> {
    fn from_ref(state: &AppState) -> Self {
        state.payments.clone()
    }
}

impl FromRef<AppState> for ServiceInfo {
    fn from_ref(state: &AppState) -> Self {
        state.info.clone()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            &collection_path::<Payment>(),
            get(list_entities::<Payment>).post(settlement::create_payment),
        )
        .route(
            &item_path::<Payment>(),
            get(get_entity::<Payment>)
                .put(update_entity::<Payment>)
                .delete(delete_entity::<Payment>),
        )
        .route(
            "/api/v1/:student_id/debts/:debt_id/payments",
            get(settlement::list_debt_payments),
        )
        .merge(health_routes())
        .with_state(state)
}
