//! HTTP integration tests for the webhook receiver and operator endpoints.
//!
//! Requests go through the fully layered router with
//! `tower::ServiceExt::oneshot`; no socket is opened.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use subscription_gate::adapters::events::RecordingNotifier;
use subscription_gate::adapters::http::{build_router, WebhookAppState};
use subscription_gate::adapters::memory::InMemorySubscriptionStore;
use subscription_gate::adapters::storage::InMemorySnapshotStorage;
use subscription_gate::application::{
    BufferPolicy, ConnectionGuardian, DurableBuffer, GuardianSettings, IdempotencyStore,
    ProcessorSettings, WebhookProcessor,
};
use subscription_gate::domain::webhook::{signature_hex, SignatureVerifier};
use subscription_gate::ports::SubscriptionRepository;

const SECRET: &str = "whsec_http";
const SIGNATURE_HEADER: &str = "asaas-signature";

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestApp {
    router: Router,
    processor: Arc<WebhookProcessor>,
    store: InMemorySubscriptionStore,
    guardian: Arc<ConnectionGuardian>,
    buffer: Arc<DurableBuffer>,
}

async fn test_app() -> TestApp {
    let store = InMemorySubscriptionStore::new();
    let storage = Arc::new(InMemorySnapshotStorage::new());
    let idempotency = Arc::new(IdempotencyStore::new(storage.clone(), 100));
    let buffer = Arc::new(DurableBuffer::new(
        storage,
        idempotency.clone(),
        BufferPolicy {
            max_retries: 1,
            ..BufferPolicy::default()
        },
    ));
    let guardian = Arc::new(ConnectionGuardian::new(
        Arc::new(store.clone()),
        GuardianSettings::default(),
    ));
    guardian.establish().await.unwrap();

    let processor = Arc::new(WebhookProcessor::new(
        SignatureVerifier::new(Some(SecretString::new(SECRET.to_string()))),
        idempotency.clone(),
        buffer.clone(),
        guardian.clone(),
        Arc::new(store.clone()),
        Arc::new(RecordingNotifier::new()),
        ProcessorSettings {
            source: "asaas".to_string(),
            ready_timeout: Duration::from_millis(20),
            apply_timeout: Duration::from_millis(200),
        },
    ));

    let state = WebhookAppState {
        processor: processor.clone(),
        buffer: buffer.clone(),
        idempotency,
        guardian: guardian.clone(),
        repository: Arc::new(store.clone()),
        signature_header: SIGNATURE_HEADER.to_string(),
    };

    TestApp {
        router: build_router(state, Duration::from_secs(5), 64 * 1024),
        processor,
        store,
        guardian,
        buffer,
    }
}

fn confirmed_payment(id: &str) -> String {
    format!(
        r#"{{"event":"PAYMENT_CONFIRMED","id":"{}","payment":{{"subscription":"sub_1","customer":"cus_1","value":29.9}}}}"#,
        id
    )
}

fn webhook_request(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::post("/webhooks/asaas").header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn signed_request(body: &str) -> Request<Body> {
    webhook_request(body, Some(signature_hex(SECRET, body.as_bytes())))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// =============================================================================
// Webhook Receiver
// =============================================================================

#[tokio::test]
async fn signed_webhook_is_acknowledged_with_request_id() {
    let app = test_app().await;

    let (status, body) = send(&app.router, signed_request(&confirmed_payment("evt_1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["requestId"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(body["eventId"].as_str().is_some());
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let app = test_app().await;
    let body = confirmed_payment("evt_1");
    let mut request = signed_request(&body);
    request
        .headers_mut()
        .insert("x-request-id", "trace-abc".parse().unwrap());

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-abc");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["requestId"], "trace-abc");
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        webhook_request(&confirmed_payment("evt_1"), Some("ab".repeat(32))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(app.store.list_billing().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_signature_is_unauthorized() {
    let app = test_app().await;

    let (status, _) = send(&app.router, webhook_request(&confirmed_payment("evt_1"), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let app = test_app().await;

    let (status, body) = send(&app.router, signed_request(r#"{"payment":{}}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_provider_is_not_found() {
    let app = test_app().await;
    let request = Request::post("/webhooks/stripe")
        .body(Body::from("{}"))
        .unwrap();

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "UNKNOWN_PROVIDER");
}

#[tokio::test]
async fn outage_is_still_acknowledged() {
    let app = test_app().await;
    app.store.set_available(false);
    app.guardian.report_disconnect("test outage");

    let (status, body) = send(&app.router, signed_request(&confirmed_payment("evt_1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.buffer.len().await, 1);

    let (_, health) = send(
        &app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["bufferPending"], 1);
}

#[tokio::test]
async fn hanging_store_write_is_acknowledged_before_request_timeout() {
    let app = test_app().await;
    app.store.set_write_delay(Duration::from_secs(3600));

    let (status, body) = tokio::time::timeout(
        Duration::from_secs(2),
        send(&app.router, signed_request(&confirmed_payment("evt_1"))),
    )
    .await
    .expect("response must arrive within the apply deadline");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.buffer.len().await, 1);
    assert!(app.store.list_billing().await.unwrap().is_empty());
}

// =============================================================================
// Operator Endpoints
// =============================================================================

#[tokio::test]
async fn entitlement_reflects_applied_webhook() {
    let app = test_app().await;
    send(&app.router, signed_request(&confirmed_payment("evt_1"))).await;

    let (status, body) = send(
        &app.router,
        Request::get("/api/entitlements/cus_1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entitled"], true);
    assert_eq!(body["status"], "active");
    assert_eq!(body["subscriptionId"], "sub_1");
}

#[tokio::test]
async fn stats_report_buffer_and_idempotency_counts() {
    let app = test_app().await;
    send(&app.router, signed_request(&confirmed_payment("evt_1"))).await;

    let (status, body) = send(
        &app.router,
        Request::get("/api/webhooks/stats")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storeReady"], true);
    assert_eq!(body["pending"], 0);
    assert_eq!(body["processedIds"], 1);
}

#[tokio::test]
async fn audit_reports_consistent_collections() {
    let app = test_app().await;
    send(&app.router, signed_request(&confirmed_payment("evt_1"))).await;

    let (status, body) = send(
        &app.router,
        Request::get("/api/subscriptions/audit")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);
    assert_eq!(body["billingCount"], 1);
}

#[tokio::test]
async fn retry_of_unknown_event_is_not_found() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        Request::post("/api/webhooks/failed/asaas:missing/retry")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "BUFFERED_EVENT_NOT_FOUND");
}

#[tokio::test]
async fn failed_event_can_be_requeued() {
    let app = test_app().await;
    app.store.fail_billing_writes(true);

    let (status, body) = send(&app.router, signed_request(&confirmed_payment("evt_1"))).await;
    assert_eq!(status, StatusCode::OK);
    let event_id = body["eventId"].as_str().unwrap().to_string();

    // One failed drain reaches max_retries and freezes the event.
    let report = app.processor.drain_buffer().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(app.buffer.stats().await.failed, 1);

    app.store.fail_billing_writes(false);
    let (status, body) = send(
        &app.router,
        Request::post(format!("/api/webhooks/failed/{}/retry", event_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);

    let report = app.processor.drain_buffer().await.unwrap();
    assert_eq!(report.processed, 1);
    assert!(app.buffer.is_empty().await);
}
