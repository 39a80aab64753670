//! Webhook receiver.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::state::AppState;

/// Receive a webhook delivery.
///
/// POST /webhooks
///
/// Answers 200 with an empty body once the topic handler succeeds. Rejected
/// deliveries get the status from [`WebhookError`](crate::shopify::WebhookError).
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let delivery = state
        .webhooks()
        .process(state.config().shopify.secret_bytes(), &headers, body)
        .await?;

    info!(
        topic = %delivery.topic,
        shop = %delivery.shop,
        webhook_id = delivery.webhook_id.as_deref().unwrap_or_default(),
        "Webhook delivered"
    );

    Ok(StatusCode::OK)
}
