//! HTTP-level tests driving the router with in-memory collaborators

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;

use prime_core::notify::{MailReceipt, Notification, OutgoingEmail};
use prime_core::{
    CatalogModel, LocalObjectStorage, Mailer, MemoryStore, ModelFile, ModelId, OutboxNotifier,
    StaticSessions, SubscriptionTier, UserId, UserProfile, ACCESS_DENIED_MESSAGE,
};
use prime_payments::{CheckoutUrls, MockGateway, PaidLineItem, WebhookVerifier, MODEL_ID_KEY};
use prime_server::{router, AppState};

const WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, email: &OutgoingEmail) -> prime_core::Result<MailReceipt> {
        let mut sent = self.sent.lock().await;
        sent.push(email.clone());
        Ok(MailReceipt {
            id: format!("re_{}", sent.len()),
        })
    }
}

struct TestApp {
    store: Arc<MemoryStore>,
    gateway: Arc<MockGateway>,
    outbox: Arc<OutboxNotifier>,
    mailer: Arc<CapturingMailer>,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_profile(
                UserProfile::new(UserId::from_string("u_pro"))
                    .with_tier(SubscriptionTier::Pro)
                    .with_email("pro@example.com"),
            )
            .await;
        store
            .upsert_profile(UserProfile::new(UserId::from_string("u_free")).with_email("free@example.com"))
            .await;
        store
            .insert_model(CatalogModel {
                id: ModelId::from_string("m1"),
                is_free: true,
                files: Some(vec![ModelFile {
                    name: "benchy.stl".into(),
                    path: "m1/benchy.stl".into(),
                }]),
            })
            .await;
        store
            .insert_model(CatalogModel {
                id: ModelId::from_string("m2"),
                is_free: false,
                files: Some(vec![ModelFile {
                    name: "vase.3mf".into(),
                    path: "m2/vase.3mf".into(),
                }]),
            })
            .await;

        Self {
            store,
            gateway: Arc::new(MockGateway::new()),
            outbox: Arc::new(OutboxNotifier::new()),
            mailer: Arc::new(CapturingMailer::default()),
        }
    }

    /// Router with no payment or email integration
    fn bare(&self) -> Router {
        router(self.base_state())
    }

    /// Router with every integration wired to the in-memory doubles
    fn full(&self) -> Router {
        let state = self
            .base_state()
            .with_checkout(
                self.gateway.clone(),
                CheckoutUrls::from_app_url("https://stlprime.test"),
                "brl",
            )
            .with_webhook(
                self.gateway.clone(),
                WebhookVerifier::new(WEBHOOK_SECRET),
                self.outbox.clone(),
            )
            .with_mailer(self.mailer.clone());
        router(state)
    }

    fn base_state(&self) -> AppState {
        let sessions = StaticSessions::new()
            .with_session("tok_pro", UserId::from_string("u_pro"))
            .with_session("tok_free", UserId::from_string("u_free"));
        AppState::new(
            self.store.clone(),
            Arc::new(LocalObjectStorage::new("https://files.test")),
            Arc::new(sessions),
        )
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn cart_item(id: &str, price: f64) -> Value {
    json!({"id": id, "title": format!("Model {id}"), "price": price, "author_username": "ana"})
}

fn signed_webhook(payload: &str) -> Request<Body> {
    let signature = WebhookVerifier::new(WEBHOOK_SECRET)
        .sign(payload, unix_now())
        .unwrap();
    Request::post("/api/webhooks/payment")
        .header("stripe-signature", signature)
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn unix_now() -> i64 {
    i64::try_from(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs(),
    )
    .unwrap()
}

fn completed_payment(user_id: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_0001",
            "mode": "payment",
            "metadata": {"user_id": user_id, "item_ids": "m2"},
            "customer_details": {"email": "buyer@example.com", "name": "Bia Lima"},
            "amount_total": 800,
            "payment_intent": "pi_1"
        }}
    })
    .to_string()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_reports_integrations() {
    let app = TestApp::new().await;

    let (status, body) = send(app.bare(), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payments_configured"], false);

    let (_, body) = send(app.full(), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(body["payments_configured"], true);
    assert_eq!(body["webhook_configured"], true);
    assert_eq!(body["email_configured"], true);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn checkout_rejects_free_only_cart() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.full(),
        post_json("/api/checkout", &json!({"items": [cart_item("m1", 0.0)]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No payable items in cart");
    assert!(app.gateway.sessions().await.is_empty());
}

#[tokio::test]
async fn checkout_rejects_empty_cart() {
    let app = TestApp::new().await;

    let (status, body) = send(app.full(), post_json("/api/checkout", &json!({"items": []}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cart is empty");
}

#[tokio::test]
async fn checkout_without_items_is_empty_cart() {
    let app = TestApp::new().await;

    let (status, body) = send(app.full(), post_json("/api/checkout", &json!({"userId": "u_pro"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cart is empty");

    let (status, body) = send(app.full(), post_json("/api/checkout", &json!({"items": null}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cart is empty");
}

#[tokio::test]
async fn checkout_rejects_malformed_body() {
    let app = TestApp::new().await;

    let (status, body) = send(app.full(), post_json("/api/checkout", &json!({"items": "m2"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CART");
    assert!(app.gateway.sessions().await.is_empty());
}

#[tokio::test]
async fn checkout_applies_pro_discount() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.full(),
        post_json(
            "/api/checkout",
            &json!({"items": [cart_item("m2", 10.0)], "userId": "u_pro"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("https://checkout.mock/pay/"));

    let sessions = app.gateway.sessions().await;
    assert_eq!(sessions[0].line_items[0].unit_amount, 800);
    assert_eq!(sessions[0].metadata["user_id"], "u_pro");
}

#[tokio::test]
async fn checkout_without_provider_fails_closed() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.bare(),
        post_json("/api/checkout", &json!({"items": [cart_item("m2", 10.0)]})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "PAYMENTS_DISABLED");
}

// ============================================================================
// Webhook
// ============================================================================

#[tokio::test]
async fn webhook_without_secrets_is_misconfigured() {
    let app = TestApp::new().await;

    let (status, body) = send(app.bare(), signed_webhook(&completed_payment("u_free"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Server misconfigured");
}

#[tokio::test]
async fn webhook_rejects_bad_signature() {
    let app = TestApp::new().await;
    let payload = completed_payment("u_free");

    let request = Request::post("/api/webhooks/payment")
        .header("stripe-signature", "t=1,v1=deadbeef")
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(app.full(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook Error"));
    assert_eq!(app.gateway.line_item_calls().await, 0);

    let unsigned = Request::post("/api/webhooks/payment")
        .body(Body::from(completed_payment("u_free")))
        .unwrap();
    let (status, _) = send(app.full(), unsigned).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_records_purchase_and_unlocks_download() {
    let app = TestApp::new().await;
    app.gateway
        .register_line_items(
            "cs_test_0001",
            vec![PaidLineItem {
                product_name: Some("Vase".into()),
                product_metadata: [(MODEL_ID_KEY.to_string(), "m2".to_string())].into(),
                amount_total: Some(800),
            }],
        )
        .await;

    // Not yet purchased
    let download = || {
        Request::get("/api/models/m2/download")
            .header(header::AUTHORIZATION, "Bearer tok_free")
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(app.full(), download()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(app.full(), signed_webhook(&completed_payment("u_free"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true}));

    let purchases = app.store.purchases().await;
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].amount_paid.to_string(), "8.00");

    let sent = app.outbox.sent().await;
    assert!(matches!(&sent[0], Notification::Receipt(r) if r.order_id == "pi_1"));

    let (status, body) = send(app.full(), download()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["name"], "vase.3mf");
}

#[tokio::test]
async fn webhook_acknowledges_failures_and_unknown_events() {
    let app = TestApp::new().await;

    // No line items registered: the fetch fails but the provider still gets 200
    let (status, body) = send(app.full(), signed_webhook(&completed_payment("u_free"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert!(app.store.purchases().await.is_empty());

    let ignored = json!({"id": "evt_2", "type": "invoice.paid", "data": {"object": {}}}).to_string();
    let (status, _) = send(app.full(), signed_webhook(&ignored)).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Downloads
// ============================================================================

#[tokio::test]
async fn download_free_model_anonymously() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.bare(),
        Request::get("/api/models/m1/download").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["files"][0]["url"],
        "https://files.test/m1/benchy.stl?expires_in=3600"
    );
}

#[tokio::test]
async fn download_paid_model_requires_entitlement() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.bare(),
        Request::get("/api/models/m2/download").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], ACCESS_DENIED_MESSAGE);

    // Pro tier via session cookie
    let (status, _) = send(
        app.bare(),
        Request::get("/api/models/m2/download")
            .header(header::COOKIE, "sb-access-token=tok_pro")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Unknown token is just an anonymous caller
    let (status, _) = send(
        app.bare(),
        Request::get("/api/models/m2/download")
            .header(header::AUTHORIZATION, "Bearer tok_unknown")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn download_unknown_model() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.bare(),
        Request::get("/api/models/nope/download").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Model not found");
}

// ============================================================================
// Email
// ============================================================================

#[tokio::test]
async fn email_skipped_without_provider() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.bare(),
        post_json("/api/emails/welcome", &json!({"to": "new@example.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"skipped": true}));
}

#[tokio::test]
async fn receipt_email_sent() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.full(),
        post_json(
            "/api/emails/receipt",
            &json!({
                "to": "buyer@example.com",
                "firstName": "Bia",
                "items": [{"title": "Vase", "author": "ana", "price": "8.00"}],
                "total": "8.00",
                "orderId": "pi_1"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "re_1");

    let sent = app.mailer.sent.lock().await;
    assert_eq!(sent[0].to, vec!["buyer@example.com".to_string()]);
    assert!(sent[0].subject.contains("pi_1"));
}

#[tokio::test]
async fn receipt_email_requires_fields() {
    let app = TestApp::new().await;

    let (status, body) = send(
        app.full(),
        post_json("/api/emails/receipt", &json!({"firstName": "Bia"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required variables");
}

#[tokio::test]
async fn receipt_email_without_order_details() {
    let app = TestApp::new().await;

    let (status, _) = send(
        app.full(),
        post_json(
            "/api/emails/receipt",
            &json!({
                "to": "buyer@example.com",
                "items": [{"title": "Vase", "author": "ana", "price": "8.00"}]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.mailer.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn follower_email_resolves_creator() {
    let app = TestApp::new().await;
    let payload = |creator: &str| {
        json!({
            "creatorId": creator,
            "creatorName": "Ana",
            "followerName": "Bia",
            "followerUsername": "bia"
        })
    };

    let (status, _) = send(app.full(), post_json("/api/emails/follower", &payload("u_pro"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.mailer.sent.lock().await[0].to,
        vec!["pro@example.com".to_string()]
    );

    let (status, body) = send(app.full(), post_json("/api/emails/follower", &payload("ghost"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Creator not found or email missing");
}
