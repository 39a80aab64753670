//! Core types for the embedded app.
//!
//! This module provides type-safe wrappers for Shopify domain concepts.

pub mod api_version;
pub mod scopes;
pub mod shop;
pub mod webhook_topic;

pub use api_version::{ApiVersion, ApiVersionError};
pub use scopes::AuthScopes;
pub use shop::{ShopDomain, ShopDomainError};
pub use webhook_topic::{WebhookTopic, WebhookTopicError};
