//! aranceles-benefits library - Benefits service
//!
//! Scholarships and aid benefits per student, plus the payments disbursed
//! through each benefit.

use std::sync::Arc;

use axum::{extract::FromRef, Router};

use aranceles_common::api::handlers::entity_routes;
use aranceles_common::api::{health_routes, ConsumerHealth, ServiceInfo};
use aranceles_common::broker::EventPublisher;
use aranceles_common::store::{ChildStore, EntityStore, MemoryStore};
use aranceles_common::sync::{EntitySync, SyncHandler};
use aranceles_common::EntityService;

pub mod models;
pub mod payments;

use models::{Benefit, BenefitPayment};
use payments::BenefitPayments;

/// Service name: event origin tag, consumer name and default database
pub const SERVICE_NAME: &str = "benefits";

pub const DEFAULT_PORT: u16 = 8001;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub benefits: EntityService<Benefit>,
    pub payments: BenefitPayments,
    pub info: ServiceInfo,
}

impl AppState {
    /// One store serves both whole benefits and their nested payments
    pub fn new<S>(store: S, publisher: Arc<dyn EventPublisher>, consumer: ConsumerHealth) -> Self
    where
        S: EntityStore<Benefit> + ChildStore<Benefit, BenefitPayment> + 'static,
    {
        let store = Arc::new(store);
        let benefits = EntityService::new(store.clone(), publisher, SERVICE_NAME);
        Self {
            payments: BenefitPayments::new(benefits.clone(), store),
            benefits,
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
            MemoryStore::<Benefit>::new(),
            publisher,
            ConsumerHealth::new(),
        )
    }

    /// Replays `benefits.*.*` events from other services
    pub fn sync_handler(&self) -> Arc<dyn SyncHandler> {
        Arc::new(EntitySync::new(SERVICE_NAME, self.benefits.clone()))
    }
}

impl FromRef<AppState> for EntityService<Benefit> {
    fn from_ref(state: &AppState) -> Self {
        state.benefits.clone()
    }
}

impl FromRef<AppState> for BenefitPayments {
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
        .merge(entity_routes::<AppState, Benefit>())
        .merge(payments::payment_routes())
        .merge(health_routes())
        .with_state(state)
}
