//! Payment registration and debt settlement
//!
//! A payment that references a debt settles it: after the payment is
//! stored the service publishes `debts.<debt_id>.updated` with
//! `paid: true`, which the debts consumer applies to the debt (or to the
//! enrollment, for `matricula` payments).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use tracing::info;

use aranceles_common::api::{JsonBody, QueryParams, ServiceResult};
use aranceles_common::events::{Action, RoutingKey};
use aranceles_common::query::{ListPage, ListParams};
use aranceles_common::EntityService;

use crate::models::{Payment, PaymentDraft};

/// Create a payment and settle the debt it references
pub async fn register_payment(
    service: &EntityService<Payment>,
    student_id: &str,
    draft: PaymentDraft,
) -> ServiceResult<Payment> {
    let payment = service.create(student_id, draft).await?;

    if let Some(debt_id) = &payment.debt_id {
        let data = json!({
            "debt_id": debt_id,
            "payment_id": payment.payment_id,
            "type": payment.payment_type.as_str(),
            "paid": true,
        });
        let key = RoutingKey::new("debts", debt_id.as_str(), Action::Updated);
        service.publish(service.event(key, student_id, data)).await?;
        info!(
            student_id,
            payment_id = %payment.payment_id,
            debt_id = %debt_id,
            "Requested debt settlement"
        );
    }

    Ok(payment)
}

/// POST /api/v1/:student_id/payments
pub async fn create_payment(
    State(service): State<EntityService<Payment>>,
    Path(student_id): Path<String>,
    JsonBody(draft): JsonBody<PaymentDraft>,
) -> ServiceResult<(StatusCode, Json<Payment>)> {
    let payment = register_payment(&service, &student_id, draft).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /api/v1/:student_id/debts/:debt_id/payments
pub async fn list_debt_payments(
    State(service): State<EntityService<Payment>>,
    Path((student_id, debt_id)): Path<(String, String)>,
    QueryParams(params): QueryParams<ListParams>,
) -> ServiceResult<Json<ListPage<Payment>>> {
    let page = service
        .list_matching(&student_id, &params, |p| {
            p.debt_id.as_deref() == Some(debt_id.as_str())
        })
        .await?;
    Ok(Json(page))
}
