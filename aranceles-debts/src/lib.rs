//! aranceles-debts library - Debts service
//!
//! Tuition (`arancel`) and enrollment (`matricula`) debts per student, plus
//! semester enrollments. Payments settle debts and enrollments through
//! `debts.<id>.updated` events.

use std::sync::Arc;

use axum::{extract::FromRef, Router};

use aranceles_common::api::handlers::entity_routes;
use aranceles_common::api::{health_routes, ConsumerHealth, ServiceInfo};
use aranceles_common::broker::EventPublisher;
use aranceles_common::store::{EntityStore, MemoryStore};
use aranceles_common::sync::SyncHandler;
use aranceles_common::EntityService;

pub mod models;
pub mod sync;

use models::{Debt, Enrollment};

/// Service name: event origin tag, consumer name and default database
pub const SERVICE_NAME: &str = "debts";

pub const DEFAULT_PORT: u16 = 8003;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub debts: EntityService<Debt>,
    pub enrollments: EntityService<Enrollment>,
    pub info: ServiceInfo,
}

impl AppState {
    pub fn new(
        debts: Arc<dyn EntityStore<Debt>>,
        enrollments: Arc<dyn EntityStore<Enrollment>>,
        publisher: Arc<dyn EventPublisher>,
        consumer: ConsumerHealth,
    ) -> Self {
        Self {
            debts: EntityService::new(debts, Arc::clone(&publisher), SERVICE_NAME),
            enrollments: EntityService::new(enrollments, publisher, SERVICE_NAME),
            info: ServiceInfo {
                module: SERVICE_NAME,
                version: env!("CARGO_PKG_VERSION"),
                consumer,
            },
        }
    }

    /// State backed by in-memory stores (tests, local runs)
    pub fn in_memory(publisher: Arc<dyn EventPublisher>) -> Self {
        Self::new(
            Arc::new(MemoryStore::<Debt>::new()),
            Arc::new(MemoryStore::<Enrollment>::new()),
            publisher,
            ConsumerHealth::new(),
        )
    }

    pub fn sync_handler(&self) -> Arc<dyn SyncHandler> {
        Arc::new(sync::DebtSync::new(
            self.debts.clone(),
            self.enrollments.clone(),
        ))
    }
}

impl FromRef<AppState> for EntityService<Debt> {
    fn from_ref(state: &AppState) -> Self {
        state.debts.clone()
    }
}

impl FromRef<AppState> for EntityService<Enrollment> {
    fn from_ref(state: &AppState) -> Self {
        state.enrollments.clone()
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
        .merge(entity_routes::<AppState, Debt>())
        .merge(entity_routes::<AppState, Enrollment>())
        .merge(health_routes())
        .with_state(state)
}
