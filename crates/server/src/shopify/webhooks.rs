//! Webhook delivery processing and subscription registration.
//!
//! Deliveries arrive at `POST /webhooks`. The registry verifies the body
//! signature, resolves the topic and hands the delivery to that topic's
//! handler. Subscriptions are created through the Admin GraphQL API after a
//! merchant logs in.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use shopify_embed_core::{ShopDomain, WebhookTopic};
use thiserror::Error;
use tracing::{debug, instrument};

use super::{AdminApiClient, ShopifyError, UserError, format_user_errors, hmac};

pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
pub const TOPIC_HEADER: &str = "x-shopify-topic";
pub const SHOP_HEADER: &str = "x-shopify-shop-domain";
pub const WEBHOOK_ID_HEADER: &str = "x-shopify-webhook-id";
pub const API_VERSION_HEADER: &str = "x-shopify-api-version";

/// Errors from webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid header {0}: {1}")]
    InvalidHeader(&'static str, String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("no handler registered for topic {0}")]
    UnhandledTopic(WebhookTopic),

    #[error("webhook handler failed: {0}")]
    Handler(String),
}

impl WebhookError {
    /// HTTP status returned to Shopify for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::InvalidHeader(..) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::UnhandledTopic(_) => StatusCode::NOT_FOUND,
            Self::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A verified webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub topic: WebhookTopic,
    pub shop: ShopDomain,
    pub webhook_id: Option<String>,
    pub api_version: Option<String>,
    pub body: Bytes,
}

impl WebhookDelivery {
    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Handles verified deliveries for one topic.
pub trait WebhookHandler: Send + Sync {
    /// Process a delivery. An error makes the endpoint answer 500 so Shopify
    /// retries.
    fn handle<'a>(&'a self, delivery: &'a WebhookDelivery) -> BoxFuture<'a, Result<(), WebhookError>>;
}

/// Topic to handler table used by `POST /webhooks`.
#[derive(Default, Clone)]
pub struct WebhookRegistry {
    handlers: HashMap<WebhookTopic, Arc<dyn WebhookHandler>>,
}

impl WebhookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`, replacing any previous handler.
    #[must_use]
    pub fn with_handler(mut self, topic: WebhookTopic, handler: Arc<dyn WebhookHandler>) -> Self {
        self.handlers.insert(topic, handler);
        self
    }

    /// Verify and dispatch a delivery.
    ///
    /// The signature is checked before anything else in the request is
    /// trusted; the handler only runs for a verified body.
    ///
    /// # Errors
    ///
    /// Returns a `WebhookError` whose [`status_code`](WebhookError::status_code)
    /// is the response Shopify should see.
    #[instrument(skip_all)]
    pub async fn process(
        &self,
        secret: &[u8],
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<WebhookDelivery, WebhookError> {
        let signature = header(headers, HMAC_HEADER)?.ok_or(WebhookError::MissingHeader(HMAC_HEADER))?;
        hmac::verify_webhook(&body, signature, secret).map_err(|_| WebhookError::InvalidSignature)?;

        let topic = header(headers, TOPIC_HEADER)?.ok_or(WebhookError::MissingHeader(TOPIC_HEADER))?;
        let topic = WebhookTopic::parse(topic)
            .map_err(|e| WebhookError::InvalidHeader(TOPIC_HEADER, e.to_string()))?;

        let shop = header(headers, SHOP_HEADER)?.ok_or(WebhookError::MissingHeader(SHOP_HEADER))?;
        let shop = ShopDomain::parse(shop)
            .map_err(|e| WebhookError::InvalidHeader(SHOP_HEADER, e.to_string()))?;

        let handler = self
            .handlers
            .get(&topic)
            .ok_or_else(|| WebhookError::UnhandledTopic(topic.clone()))?;

        let delivery = WebhookDelivery {
            topic,
            shop,
            webhook_id: header(headers, WEBHOOK_ID_HEADER)?.map(str::to_owned),
            api_version: header(headers, API_VERSION_HEADER)?.map(str::to_owned),
            body,
        };

        handler.handle(&delivery).await?;
        debug!(topic = %delivery.topic, shop = %delivery.shop, "Webhook processed");

        Ok(delivery)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, WebhookError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|e| WebhookError::InvalidHeader(name, e.to_string()))
        })
        .transpose()
}

// =============================================================================
// Subscription registration
// =============================================================================

const FIND_SUBSCRIPTION: &str = r"
query FindWebhookSubscription($topic: WebhookSubscriptionTopic!) {
  webhookSubscriptions(first: 1, topics: [$topic]) {
    edges {
      node {
        id
        endpoint {
          __typename
          ... on WebhookHttpEndpoint { callbackUrl }
        }
      }
    }
  }
}";

const CREATE_SUBSCRIPTION: &str = r"
mutation CreateWebhookSubscription($topic: WebhookSubscriptionTopic!, $callbackUrl: URL!) {
  webhookSubscriptionCreate(topic: $topic, webhookSubscription: { callbackUrl: $callbackUrl, format: JSON }) {
    webhookSubscription { id }
    userErrors { field message }
  }
}";

const UPDATE_SUBSCRIPTION: &str = r"
mutation UpdateWebhookSubscription($id: ID!, $callbackUrl: URL!) {
  webhookSubscriptionUpdate(id: $id, webhookSubscription: { callbackUrl: $callbackUrl }) {
    webhookSubscription { id }
    userErrors { field message }
  }
}";

/// Result of registering one webhook topic for a shop.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub topic: WebhookTopic,
    pub success: bool,
    /// The mutation payload, or the lookup result when nothing changed
    pub result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindData {
    webhook_subscriptions: Connection,
}

#[derive(Debug, Deserialize)]
struct Connection {
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: SubscriptionNode,
}

#[derive(Debug, Deserialize)]
struct SubscriptionNode {
    id: String,
    endpoint: Option<Endpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Endpoint {
    callback_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct MutationPayload {
    webhook_subscription: Option<serde_json::Value>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    webhook_subscription_create: MutationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateData {
    webhook_subscription_update: MutationPayload,
}

impl AdminApiClient {
    /// Ensure `shop` has a subscription for `topic` pointing at `callback_url`.
    ///
    /// An existing subscription with the same callback is left alone; one with
    /// a different callback is updated; otherwise a new one is created.
    /// Mutation `userErrors` come back as an unsuccessful outcome rather than
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the Admin API cannot be reached or answers
    /// with GraphQL errors.
    #[instrument(skip(self, access_token), fields(shop = %shop, topic = %topic))]
    pub async fn register_webhook(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        topic: &WebhookTopic,
        callback_url: &str,
    ) -> Result<RegisterOutcome, ShopifyError> {
        let existing: FindData = self
            .graphql(
                shop,
                access_token,
                FIND_SUBSCRIPTION,
                serde_json::json!({ "topic": topic.as_str() }),
            )
            .await?;

        let current = existing
            .webhook_subscriptions
            .edges
            .into_iter()
            .next()
            .map(|edge| edge.node);

        let payload = match current {
            Some(node)
                if node
                    .endpoint
                    .as_ref()
                    .and_then(|e| e.callback_url.as_deref())
                    == Some(callback_url) =>
            {
                debug!("Webhook subscription already current");
                return Ok(RegisterOutcome {
                    topic: topic.clone(),
                    success: true,
                    result: serde_json::json!({ "id": node.id, "callbackUrl": callback_url }),
                });
            }
            Some(node) => {
                let data: UpdateData = self
                    .graphql(
                        shop,
                        access_token,
                        UPDATE_SUBSCRIPTION,
                        serde_json::json!({ "id": node.id, "callbackUrl": callback_url }),
                    )
                    .await?;
                data.webhook_subscription_update
            }
            None => {
                let data: CreateData = self
                    .graphql(
                        shop,
                        access_token,
                        CREATE_SUBSCRIPTION,
                        serde_json::json!({ "topic": topic.as_str(), "callbackUrl": callback_url }),
                    )
                    .await?;
                data.webhook_subscription_create
            }
        };

        if !payload.user_errors.is_empty() {
            debug!(errors = %format_user_errors(&payload.user_errors), "Webhook registration rejected");
        }

        Ok(RegisterOutcome {
            topic: topic.clone(),
            success: payload.user_errors.is_empty() && payload.webhook_subscription.is_some(),
            result: serde_json::to_value(&payload)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::HeaderValue;

    use super::*;

    const SECRET: &[u8] = b"webhook-secret";

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl WebhookHandler for Counting {
        fn handle<'a>(
            &'a self,
            _delivery: &'a WebhookDelivery,
        ) -> BoxFuture<'a, Result<(), WebhookError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    Err(WebhookError::Handler("boom".to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn headers(body: &[u8], topic: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HMAC_HEADER,
            HeaderValue::from_str(&hmac::sign_webhook(body, SECRET).unwrap()).unwrap(),
        );
        headers.insert(TOPIC_HEADER, HeaderValue::from_str(topic).unwrap());
        headers.insert(SHOP_HEADER, HeaderValue::from_static("test-shop.myshopify.com"));
        headers
    }

    #[tokio::test]
    async fn test_dispatches_verified_delivery() {
        let handler = Arc::new(Counting::default());
        let registry =
            WebhookRegistry::new().with_handler(WebhookTopic::app_uninstalled(), handler.clone());

        let body = Bytes::from_static(br#"{"id":1}"#);
        let delivery = registry
            .process(SECRET, &headers(&body, "app/uninstalled"), body)
            .await
            .unwrap();

        assert_eq!(delivery.topic, WebhookTopic::app_uninstalled());
        assert_eq!(delivery.shop.as_str(), "test-shop.myshopify.com");
        assert_eq!(delivery.payload().unwrap()["id"], 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_signature_skips_handler() {
        let handler = Arc::new(Counting::default());
        let registry =
            WebhookRegistry::new().with_handler(WebhookTopic::app_uninstalled(), handler.clone());

        let headers = headers(br#"{"id":1}"#, "app/uninstalled");
        let err = registry
            .process(SECRET, &headers, Bytes::from_static(br#"{"id":2}"#))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_signature_is_bad_request() {
        let registry = WebhookRegistry::new();
        let err = registry
            .process(SECRET, &HeaderMap::new(), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MissingHeader(HMAC_HEADER)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_topic_is_not_found() {
        let registry = WebhookRegistry::new();
        let body = Bytes::from_static(b"{}");
        let err = registry
            .process(SECRET, &headers(&body, "products/update"), body)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handler_failure_is_server_error() {
        let handler = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let registry =
            WebhookRegistry::new().with_handler(WebhookTopic::app_uninstalled(), handler.clone());
        let body = Bytes::from_static(b"{}");
        let err = registry
            .process(SECRET, &headers(&body, "APP_UNINSTALLED"), body)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}
