//! Integration tests for aranceles-benefits API endpoints
//!
//! Tests cover:
//! - Benefit CRUD (create / get / list / update / soft delete)
//! - List filters, sorting and paging
//! - Nested benefit payments and the events they publish
//! - Replay of remote benefit events
//! - Broker failures after the write
//! - Health and liveness endpoints

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method

use aranceles_benefits::{build_router, AppState};
use aranceles_common::broker::EventPublisher;
use aranceles_common::events::{Action, DomainEvent, LocalBus, RoutingKey};
use aranceles_common::sync::{deliver, Disposition};

/// Test helper: app over an in-memory store, publishing to a local bus
fn setup_app() -> (Router, AppState, LocalBus) {
    let bus = LocalBus::new(64);
    let state = AppState::in_memory(Arc::new(bus.clone()));
    (build_router(state.clone()), state, bus)
}

/// Test helper: Create request with optional JSON body
fn test_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(test_request(method, uri, body))
        .await
        .unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

fn benefit(id: &str, amount: f64, start: &str) -> Value {
    json!({
        "benefit_id": id,
        "name": format!("Scholarship {}", id),
        "description": "Academic excellence scholarship",
        "amount": amount,
        "start_date": start,
        "category": "financial"
    })
}

async fn create_benefit(app: &Router, student: &str, body: Value) -> Value {
    let (status, json) = send(app, "POST", &format!("/api/v1/{}/benefits", student), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    json
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _, _) = setup_app();
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "benefits");
    assert_eq!(body["consumer"], "idle");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ping() {
    let (app, _, _) = setup_app();
    let (status, body) = send(&app, "GET", "/api/v1/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"msg": "ok"}));
}

// =============================================================================
// Benefit CRUD Tests
// =============================================================================

#[tokio::test]
async fn test_create_benefit_returns_active_entity() {
    let (app, _, bus) = setup_app();
    let mut events = bus.subscribe_to("benefits.*.*");

    let body = create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
    assert_eq!(body["benefit_id"], "B1");
    assert_eq!(body["status"], "active");
    assert_eq!(body["current_recipients"], 0);
    assert_eq!(body["payments"], json!([]));
    assert!(body["created_at"].is_string());

    let event = events.try_next().expect("created event");
    assert_eq!(event.subject(), "benefits.B1.created");
    assert_eq!(event.body.origin_service, "benefits");
    assert_eq!(event.body.student_id, "s1");
    assert_eq!(event.body.data["amount"], 5000.0);
}

#[tokio::test]
async fn test_duplicate_benefit_is_conflict() {
    let (app, _, _) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits",
        Some(benefit("B1", 1.0, "2025-01-01T00:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].as_str().unwrap().contains("B1"));

    // Same id for another student is fine
    create_benefit(&app, "s2", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
}

#[tokio::test]
async fn test_invalid_benefit_is_bad_request() {
    let (app, _, _) = setup_app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits",
        Some(benefit("B1", -10.0, "2024-01-01T00:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits",
        Some(benefit("B.1", 10.0, "2024-01-01T00:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_undecodable_requests_are_json_bad_requests() {
    let (app, _, bus) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
    let mut events = bus.subscribe_to(">");

    // Missing name
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits",
        Some(json!({"benefit_id": "B2", "amount": 10.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("name"));

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/s1/benefits/B1",
        Some(json!({"amount": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("bogus"));

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B1/payments",
        Some(json!({"payment_id": "P1", "amount": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    assert!(events.drain().is_empty());
}

#[tokio::test]
async fn test_create_ignores_status_in_body() {
    let (app, _, _) = setup_app();
    let mut body = benefit("B1", 5000.0, "2024-01-01T00:00:00Z");
    body["status"] = json!("inactive");

    let created = create_benefit(&app, "s1", body).await;
    assert_eq!(created["status"], "active");

    let (status, payment) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B1/payments",
        Some(json!({"payment_id": "P1", "status": "inactive"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "active");
}

#[tokio::test]
async fn test_get_benefit() {
    let (app, _, _) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;

    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Scholarship B1");

    let (status, _) = send(&app, "GET", "/api/v1/s1/benefits/B9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/v1/nobody/benefits/B1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_benefit() {
    let (app, _, bus) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
    let mut events = bus.subscribe_to("benefits.*.updated");

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/s1/benefits/B1",
        Some(json!({"amount": 6500.0, "status": "expired"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 6500.0);
    assert_eq!(body["status"], "expired");
    assert_eq!(body["name"], "Scholarship B1");
    assert_ne!(body["updated_at"], body["created_at"]);

    let event = events.try_next().expect("updated event");
    assert_eq!(event.subject(), "benefits.B1.updated");
    assert_eq!(event.body.data["amount"], 6500.0);
}

#[tokio::test]
async fn test_update_errors() {
    let (app, _, _) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;

    let (status, _) = send(&app, "PUT", "/api/v1/s1/benefits/B1", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "PUT", "/api/v1/s1/benefits/B9", Some(json!({"amount": 1.0}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PUT", "/api/v1/s9/benefits/B1", Some(json!({"amount": 1.0}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_delete_twice() {
    let (app, _, bus) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
    let mut events = bus.subscribe_to("benefits.*.deleted");

    let (status, body) = send(&app, "DELETE", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "inactive");

    let event = events.try_next().expect("deleted event");
    assert_eq!(event.body.data, json!({"student_id": "s1", "benefit_id": "B1"}));

    let (status, body) = send(&app, "DELETE", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("already deleted"));

    // Record is kept
    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "inactive");
}

// =============================================================================
// List Tests
// =============================================================================

async fn seed_list(app: &Router) {
    create_benefit(app, "s1", benefit("B1", 300.0, "2024-03-01T00:00:00Z")).await;
    create_benefit(app, "s1", benefit("B2", 100.0, "2024-01-01T00:00:00Z")).await;
    create_benefit(app, "s1", benefit("B3", 200.0, "2024-02-01T00:00:00Z")).await;
    send(app, "DELETE", "/api/v1/s1/benefits/B3", None).await;
}

fn ids(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["benefit_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_list_envelope_and_paging() {
    let (app, _, _) = setup_app();
    seed_list(&app).await;

    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits?skip=1&limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student_id"], "s1");
    assert_eq!(body["total"], 3);
    assert_eq!(body["skip"], 1);
    assert_eq!(body["limit"], 1);
    assert_eq!(ids(&body), vec!["B2"]);

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits?page=2&page_size=2", None).await;
    assert_eq!(ids(&body), vec!["B3"]);
}

#[tokio::test]
async fn test_list_filters_and_sorting() {
    let (app, _, _) = setup_app();
    seed_list(&app).await;

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits?status=active&sort=amount", None).await;
    assert_eq!(ids(&body), vec!["B2", "B1"]);

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits?status=inactive", None).await;
    assert_eq!(ids(&body), vec!["B3"]);

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits?min_amount=150&max_amount=300", None).await;
    assert_eq!(ids(&body), vec!["B1", "B3"]);

    let (_, body) = send(
        &app,
        "GET",
        "/api/v1/s1/benefits?from=2024-01-15T00:00:00Z&sort=start_date&order=desc",
        None,
    )
    .await;
    assert_eq!(ids(&body), vec!["B1", "B3"]);
}

#[tokio::test]
async fn test_list_errors() {
    let (app, _, _) = setup_app();
    seed_list(&app).await;

    let (status, _) = send(&app, "GET", "/api/v1/s1/benefits?sort=password", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/v1/s1/benefits?min_amount=5&max_amount=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/v1/unknown/benefits", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Benefit Payment Tests
// =============================================================================

#[tokio::test]
async fn test_register_payment_defaults_amount_and_announces_it() {
    let (app, _, bus) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
    let mut events = bus.subscribe_to(">");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B1/payments",
        Some(json!({"payment_id": "P1", "description": "March installment"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["payment_id"], "P1");
    assert_eq!(body["amount"], 5000.0);
    assert_eq!(body["status"], "active");

    let published = events.drain();
    let subjects: Vec<String> = published.iter().map(|e| e.subject()).collect();
    assert_eq!(subjects, vec!["benefits.B1.updated", "payments.P1.created"]);

    let announce = &published[1];
    assert_eq!(announce.body.origin_service, "benefits");
    assert_eq!(announce.body.data["type"], "beneficio");
    assert_eq!(announce.body.data["amount"], 5000.0);
    assert_eq!(announce.body.data["description"], "March installment");

    let (_, benefit) = send(&app, "GET", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(benefit["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_payment_errors() {
    let (app, _, _) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;

    let payment = json!({"payment_id": "P1", "amount": 100.0});
    let (status, _) = send(&app, "POST", "/api/v1/s1/benefits/B1/payments", Some(payment.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "POST", "/api/v1/s1/benefits/B1/payments", Some(payment.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/api/v1/s1/benefits/B9/payments", Some(payment.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, "DELETE", "/api/v1/s1/benefits/B1", None).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B1/payments",
        Some(json!({"payment_id": "P2"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("inactive"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payment_writes_are_all_kept() {
    let (app, _, _) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;

    let registrations: Vec<_> = (0..50)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let payment = json!({"payment_id": format!("P{}", i), "amount": 10.0});
                send(&app, "POST", "/api/v1/s1/benefits/B1/payments", Some(payment)).await
            })
        })
        .collect();
    for task in registrations {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(body["payments"].as_array().unwrap().len(), 50);

    // Edits of sibling payments must not overwrite each other
    let edits: Vec<_> = (0..50)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let uri = format!("/api/v1/s1/benefits/B1/payments/P{}", i);
                send(&app, "PUT", &uri, Some(json!({"amount": (i + 1) as f64}))).await
            })
        })
        .collect();
    for task in edits {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits/B1", None).await;
    for payment in body["payments"].as_array().unwrap() {
        let index: u32 = payment["payment_id"].as_str().unwrap()[1..].parse().unwrap();
        assert_eq!(payment["amount"], (index + 1) as f64);
    }
}

#[tokio::test]
async fn test_concurrent_duplicate_payment_registers_once() {
    let (app, _, _) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;

    let attempts: Vec<_> = (0..10)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                let payment = json!({"payment_id": "P1", "amount": 10.0});
                send(&app, "POST", "/api/v1/s1/benefits/B1/payments", Some(payment)).await.0
            })
        })
        .collect();
    let mut created = 0;
    for task in attempts {
        match task.await.unwrap() {
            StatusCode::CREATED => created += 1,
            status => assert_eq!(status, StatusCode::CONFLICT),
        }
    }
    assert_eq!(created, 1);

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits/B1/payments", None).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_zero_amount_payment_is_rejected() {
    let (app, _, bus) = setup_app();
    create_benefit(&app, "s1", benefit("B0", 0.0, "2024-01-01T00:00:00Z")).await;
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
    let mut events = bus.subscribe_to(">");

    // Defaulted from a zero-amount benefit
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B0/payments",
        Some(json!({"payment_id": "P1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("greater than zero"));

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B1/payments",
        Some(json!({"payment_id": "P1", "amount": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(events.drain().is_empty());

    send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B1/payments",
        Some(json!({"payment_id": "P2", "amount": 5.0})),
    )
    .await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/s1/benefits/B1/payments/P2",
        Some(json!({"amount": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits/B0", None).await;
    assert_eq!(body["payments"], json!([]));
}

#[tokio::test]
async fn test_benefit_payment_lifecycle() {
    let (app, _, _) = setup_app();
    create_benefit(&app, "s1", benefit("B1", 5000.0, "2024-01-01T00:00:00Z")).await;
    for id in ["P1", "P2", "P3"] {
        send(
            &app,
            "POST",
            "/api/v1/s1/benefits/B1/payments",
            Some(json!({"payment_id": id, "amount": 10.0})),
        )
        .await;
    }

    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits/B1/payments?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/s1/benefits/B1/payments/P2",
        Some(json!({"amount": 25.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 25.0);

    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits/B1/payments/P2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 25.0);

    let (status, _) = send(&app, "PUT", "/api/v1/s1/benefits/B1/payments/P2", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "DELETE", "/api/v1/s1/benefits/B1/payments/P2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "inactive");

    let (status, _) = send(&app, "DELETE", "/api/v1/s1/benefits/B1/payments/P2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/v1/s1/benefits/B1/payments/P9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits/B1/payments?status=active", None).await;
    assert_eq!(body["total"], 2);
}

// =============================================================================
// Event Replay Tests
// =============================================================================

fn remote(action: Action, id: &str, data: Value) -> DomainEvent {
    DomainEvent::new(RoutingKey::new("benefits", id, action), "registry", "s1", data)
}

#[tokio::test]
async fn test_remote_events_are_replayed() {
    let (app, state, bus) = setup_app();
    let handler = state.sync_handler();
    let mut echoes = bus.subscribe_to(">");

    let created = remote(
        Action::Created,
        "B7",
        json!({"name": "Housing aid", "amount": 800.0, "start_date": "2024-05-01T00:00:00Z"}),
    );
    assert_eq!(deliver(handler.as_ref(), &created).await, Disposition::Applied);
    assert_eq!(deliver(handler.as_ref(), &created).await, Disposition::AlreadyApplied);

    let updated = remote(Action::Updated, "B7", json!({"amount": 900.0}));
    assert_eq!(deliver(handler.as_ref(), &updated).await, Disposition::Applied);

    let (_, body) = send(&app, "GET", "/api/v1/s1/benefits/B7", None).await;
    assert_eq!(body["amount"], 900.0);

    let deleted = remote(Action::Deleted, "B7", json!({"benefit_id": "B7"}));
    assert_eq!(deliver(handler.as_ref(), &deleted).await, Disposition::Applied);
    assert_eq!(deliver(handler.as_ref(), &deleted).await, Disposition::AlreadyApplied);

    // Replays do not publish
    assert!(echoes.try_next().is_none());
}

#[tokio::test]
async fn test_own_and_premature_events() {
    let (app, state, _) = setup_app();
    let handler = state.sync_handler();

    let mut own = remote(Action::Created, "B1", benefit("B1", 1.0, "2024-01-01T00:00:00Z"));
    own.body.origin_service = "benefits".into();
    assert_eq!(deliver(handler.as_ref(), &own).await, Disposition::SelfOrigin);

    let (status, _) = send(&app, "GET", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let early = remote(Action::Updated, "B1", json!({"amount": 2.0}));
    assert!(matches!(
        deliver(handler.as_ref(), &early).await,
        Disposition::Retry(_)
    ));

    let bad = remote(Action::Created, "B2", json!({"name": "no amount"}));
    assert!(matches!(
        deliver(handler.as_ref(), &bad).await,
        Disposition::Reject(_)
    ));
}

// =============================================================================
// Broker Failure Tests
// =============================================================================

/// Publisher whose broker is always down
struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &DomainEvent) -> aranceles_common::Result<()> {
        Err(aranceles_common::Error::broker("broker unavailable"))
    }
}

#[tokio::test]
async fn test_publish_failure_keeps_the_write() {
    let app = build_router(AppState::in_memory(Arc::new(FailingPublisher)));

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits",
        Some(benefit("B1", 5000.0, "2024-01-01T00:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].is_string());

    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits/B1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    // Same for a nested payment: stored, then the announcement fails
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/s1/benefits/B1/payments",
        Some(json!({"payment_id": "P1"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].is_string());

    let (status, body) = send(&app, "GET", "/api/v1/s1/benefits/B1/payments/P1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 5000.0);
}
