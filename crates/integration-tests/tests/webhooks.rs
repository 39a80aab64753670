//! `POST /webhooks` verification and dispatch.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::future::BoxFuture;
use shopify_embed_core::WebhookTopic;
use shopify_embed_integration_tests::{
    SHOP, TestApp, location, mock_token_exchange, shop, test_config, webhook_signature,
};
use shopify_embed_server::{
    AppState,
    services::{InstalledShops, StandardAfterAuth},
    shopify::{AdminApiClient, WebhookDelivery, WebhookError, WebhookHandler, WebhookRegistry},
};
use wiremock::MockServer;

const BODY: &str = r#"{"id":1,"name":"Test Shop","domain":"test-shop.myshopify.com"}"#;

fn delivery(topic: &str, body: &str, signature: &str) -> Request<Body> {
    Request::post("/webhooks")
        .header("content-type", "application/json")
        .header("x-shopify-topic", topic)
        .header("x-shopify-shop-domain", SHOP)
        .header("x-shopify-hmac-sha256", signature)
        .header("x-shopify-webhook-id", "b54557e4-bdd9-4b37-8a5f-bf7d70bcd043")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[derive(Default)]
struct CountingHandler {
    calls: AtomicUsize,
}

impl WebhookHandler for CountingHandler {
    fn handle<'a>(
        &'a self,
        _delivery: &'a WebhookDelivery,
    ) -> BoxFuture<'a, Result<(), WebhookError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

async fn counting_app() -> (TestApp, Arc<CountingHandler>) {
    let server = MockServer::start().await;
    let config = test_config(&server.uri(), &[]);
    let handler = Arc::new(CountingHandler::default());
    let registry = WebhookRegistry::new().with_handler(
        WebhookTopic::parse("orders/create").unwrap(),
        handler.clone(),
    );
    let hook = Arc::new(StandardAfterAuth::from_config(
        &config,
        AdminApiClient::new(&config.shopify),
    ));
    let state = AppState::from_parts(config, InstalledShops::new(), registry, hook);
    (TestApp::with_state(state), handler)
}

#[tokio::test]
async fn test_valid_delivery_invokes_handler() {
    let (mut app, handler) = counting_app().await;

    let response = app
        .send(delivery("orders/create", BODY, &webhook_signature(BODY.as_bytes())))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tampered_signature_is_rejected() {
    let (mut app, handler) = counting_app().await;

    let mut signature = webhook_signature(BODY.as_bytes());
    signature.replace_range(0..1, if signature.starts_with('A') { "B" } else { "A" });

    let response = app.send(delivery("orders/create", BODY, &signature)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let (mut app, handler) = counting_app().await;

    let signature = webhook_signature(BODY.as_bytes());
    let tampered = BODY.replace("Test Shop", "Evil Shop");

    let response = app.send(delivery("orders/create", &tampered, &signature)).await;
    assert!(!response.status().is_success());
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_signature_is_bad_request() {
    let (mut app, handler) = counting_app().await;

    let request = Request::post("/webhooks")
        .header("x-shopify-topic", "orders/create")
        .header("x-shopify-shop-domain", SHOP)
        .body(Body::from(BODY))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unregistered_topic_is_not_found() {
    let (mut app, _handler) = counting_app().await;

    let response = app
        .send(delivery("products/update", BODY, &webhook_signature(BODY.as_bytes())))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uninstall_forces_reauthentication() {
    let server = MockServer::start().await;
    mock_token_exchange(&server).await;
    let mut app = TestApp::new(test_config(
        &server.uri(),
        &[("BILLING_ENABLED", "false"), ("WEBHOOK_TOPICS", "")],
    ));

    app.login().await;
    assert_eq!(app.get(&format!("/?shop={SHOP}")).await.status(), StatusCode::OK);

    let body = r#"{"id":1}"#;
    let response = app
        .send(delivery("app/uninstalled", body, &webhook_signature(body.as_bytes())))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.state.installed_shops().get(&shop()).await.is_none());

    let response = app.get(&format!("/?shop={SHOP}")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/auth?shop={SHOP}"));
}
