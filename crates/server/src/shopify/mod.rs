//! Shopify platform integration.
//!
//! Everything that talks to, or authenticates messages from, Shopify:
//!
//! - [`AdminApiClient`] - OAuth authorization URLs, token exchange, GraphQL
//!   calls and raw GraphQL forwarding for the proxy
//! - [`hmac`] - OAuth callback and webhook signature verification
//! - [`webhooks`] - Topic handler registry, delivery processing and
//!   subscription registration
//! - [`billing`] - Recurring subscription creation after login

mod client;
pub mod billing;
pub mod hmac;
pub mod webhooks;

pub use billing::BillingClient;
pub use client::{AccessToken, AdminApiClient, ForwardedResponse};
pub use webhooks::{
    RegisterOutcome, WebhookDelivery, WebhookError, WebhookHandler, WebhookRegistry,
};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when interacting with Shopify.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// OAuth token exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User error from mutation (e.g., invalid input).
    #[error("User error: {0}")]
    UserError(String),
}

/// A GraphQL error returned by the Admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the error in the response.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

/// A `userErrors` entry from a mutation payload.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct UserError {
    /// Input field path the error refers to.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    /// Human-readable message.
    pub message: String,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Join mutation `userErrors` into a single message.
pub(crate) fn format_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| match &e.field {
            Some(field) if !field.is_empty() => format!("{}: {}", field.join("."), e.message),
            _ => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
