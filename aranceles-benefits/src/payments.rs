//! Payments disbursed through a benefit
//!
//! Benefit payments live inside the benefit document. Writes go through
//! [`ChildStore`] so a registration or edit touches only its own payment,
//! then the refreshed benefit is announced as `benefits.<id>.updated`.
//! Registering a payment also announces it to the payments service as
//! `payments.<payment_id>.created` with type `beneficio`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use aranceles_common::api::{JsonBody, QueryParams, ServiceError, ServiceResult};
use aranceles_common::events::{Action, RoutingKey};
use aranceles_common::query::{ListPage, ListParams};
use aranceles_common::store::ChildStore;
use aranceles_common::{Entity, EntityPatch, EntityService, EntityStatus};

use crate::models::{Benefit, BenefitPayment, BenefitPaymentDraft, BenefitPaymentPatch};
use crate::AppState;

fn payment_not_found(payment_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Payment {} not found", payment_id))
}

/// Reasons a benefit cannot take a payment with this id
fn check_accepts(benefit: &Benefit, payment_id: &str) -> ServiceResult<()> {
    if benefit.status == EntityStatus::Inactive {
        return Err(ServiceError::BadRequest(format!(
            "Benefit {} is inactive",
            benefit.benefit_id
        )));
    }
    if benefit.find_payment(payment_id).is_some() {
        return Err(ServiceError::Conflict(format!(
            "Payment {} already exists for benefit {}",
            payment_id, benefit.benefit_id
        )));
    }
    Ok(())
}

/// Benefit payment operations over the parent benefit service
#[derive(Clone)]
pub struct BenefitPayments {
    benefits: EntityService<Benefit>,
    store: Arc<dyn ChildStore<Benefit, BenefitPayment>>,
}

impl BenefitPayments {
    pub fn new(
        benefits: EntityService<Benefit>,
        store: Arc<dyn ChildStore<Benefit, BenefitPayment>>,
    ) -> Self {
        Self { benefits, store }
    }

    /// Register a payment inside an active benefit
    pub async fn register(
        &self,
        student_id: &str,
        benefit_id: &str,
        mut draft: BenefitPaymentDraft,
    ) -> ServiceResult<BenefitPayment> {
        let benefit = self.benefits.get(student_id, benefit_id).await?;
        check_accepts(&benefit, &draft.payment_id)?;

        draft.amount.get_or_insert(benefit.amount);
        let now = Utc::now();
        let payment = BenefitPayment::from_draft(draft, now)?;

        if !self
            .store
            .push_child(student_id, benefit_id, &payment, now)
            .await?
        {
            // Another writer got in between the check and the push
            let benefit = self.benefits.get(student_id, benefit_id).await?;
            check_accepts(&benefit, &payment.payment_id)?;
            debug!(student_id, benefit_id, "Payment push matched no benefit");
            return Err(ServiceError::Conflict(format!(
                "Payment {} could not be registered for benefit {}",
                payment.payment_id, benefit_id
            )));
        }
        info!(student_id, benefit_id, payment_id = %payment.payment_id, "Registered benefit payment");

        let benefit = self.benefits.get(student_id, benefit_id).await?;
        self.benefits
            .publish_entity(Action::Updated, student_id, &benefit)
            .await?;

        let data = json!({
            "payment_id": payment.payment_id,
            "amount": payment.amount,
            "description": payment.description.clone().unwrap_or_default(),
            "type": "beneficio",
            "date": payment.date,
        });
        let key = RoutingKey::new("payments", payment.payment_id.as_str(), Action::Created);
        self.benefits
            .publish(self.benefits.event(key, student_id, data))
            .await?;

        Ok(payment)
    }

    pub async fn get(
        &self,
        student_id: &str,
        benefit_id: &str,
        payment_id: &str,
    ) -> ServiceResult<BenefitPayment> {
        let benefit = self.benefits.get(student_id, benefit_id).await?;
        benefit
            .find_payment(payment_id)
            .cloned()
            .ok_or_else(|| payment_not_found(payment_id))
    }

    pub async fn list(
        &self,
        student_id: &str,
        benefit_id: &str,
        params: &ListParams,
    ) -> ServiceResult<ListPage<BenefitPayment>> {
        let benefit = self.benefits.get(student_id, benefit_id).await?;
        params.apply(student_id, benefit.payments)
    }

    /// Modify one payment and write back only that payment
    async fn mutate<F>(
        &self,
        student_id: &str,
        benefit_id: &str,
        payment_id: &str,
        mutate: F,
    ) -> ServiceResult<BenefitPayment>
    where
        F: FnOnce(&mut BenefitPayment) -> ServiceResult<()>,
    {
        let mut payment = self.get(student_id, benefit_id, payment_id).await?;
        mutate(&mut payment)?;
        let now = Utc::now();
        payment.set_updated_at(now);

        if !self
            .store
            .replace_child(student_id, benefit_id, &payment, now)
            .await?
        {
            return Err(payment_not_found(payment_id));
        }

        let benefit = self.benefits.get(student_id, benefit_id).await?;
        self.benefits
            .publish_entity(Action::Updated, student_id, &benefit)
            .await?;
        Ok(payment)
    }

    pub async fn update(
        &self,
        student_id: &str,
        benefit_id: &str,
        payment_id: &str,
        patch: BenefitPaymentPatch,
    ) -> ServiceResult<BenefitPayment> {
        if patch.is_empty() {
            return Err(ServiceError::BadRequest("No fields to update".to_string()));
        }
        self.mutate(student_id, benefit_id, payment_id, |payment| {
            payment.apply_patch(patch)
        })
        .await
    }

    /// Soft delete: the payment stays in the benefit as inactive
    pub async fn delete(
        &self,
        student_id: &str,
        benefit_id: &str,
        payment_id: &str,
    ) -> ServiceResult<BenefitPayment> {
        self.mutate(student_id, benefit_id, payment_id, |payment| {
            if payment.status == EntityStatus::Inactive {
                return Err(ServiceError::AlreadyDeleted {
                    kind: BenefitPayment::LABEL,
                    id: payment.payment_id.clone(),
                });
            }
            payment.set_status(EntityStatus::Inactive);
            Ok(())
        })
        .await
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/:student_id/benefits/:benefit_id/payments
async fn register_payment_handler(
    State(payments): State<BenefitPayments>,
    Path((student_id, benefit_id)): Path<(String, String)>,
    JsonBody(draft): JsonBody<BenefitPaymentDraft>,
) -> ServiceResult<(StatusCode, Json<BenefitPayment>)> {
    let payment = payments.register(&student_id, &benefit_id, draft).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /api/v1/:student_id/benefits/:benefit_id/payments
async fn list_payments_handler(
    State(payments): State<BenefitPayments>,
    Path((student_id, benefit_id)): Path<(String, String)>,
    QueryParams(params): QueryParams<ListParams>,
) -> ServiceResult<Json<ListPage<BenefitPayment>>> {
    Ok(Json(payments.list(&student_id, &benefit_id, &params).await?))
}

/// GET /api/v1/:student_id/benefits/:benefit_id/payments/:payment_id
async fn get_payment_handler(
    State(payments): State<BenefitPayments>,
    Path((student_id, benefit_id, payment_id)): Path<(String, String, String)>,
) -> ServiceResult<Json<BenefitPayment>> {
    Ok(Json(
        payments.get(&student_id, &benefit_id, &payment_id).await?,
    ))
}

/// PUT /api/v1/:student_id/benefits/:benefit_id/payments/:payment_id
async fn update_payment_handler(
    State(payments): State<BenefitPayments>,
    Path((student_id, benefit_id, payment_id)): Path<(String, String, String)>,
    JsonBody(patch): JsonBody<BenefitPaymentPatch>,
) -> ServiceResult<Json<BenefitPayment>> {
    Ok(Json(
        payments
            .update(&student_id, &benefit_id, &payment_id, patch)
            .await?,
    ))
}

/// DELETE /api/v1/:student_id/benefits/:benefit_id/payments/:payment_id
async fn delete_payment_handler(
    State(payments): State<BenefitPayments>,
    Path((student_id, benefit_id, payment_id)): Path<(String, String, String)>,
) -> ServiceResult<Json<BenefitPayment>> {
    Ok(Json(
        payments
            .delete(&student_id, &benefit_id, &payment_id)
            .await?,
    ))
}

/// Nested benefit payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/:student_id/benefits/:benefit_id/payments",
            get(list_payments_handler).post(register_payment_handler),
        )
        .route(
            "/api/v1/:student_id/benefits/:benefit_id/payments/:payment_id",
            get(get_payment_handler)
                .put(update_payment_handler)
                .delete(delete_payment_handler),
        )
}
