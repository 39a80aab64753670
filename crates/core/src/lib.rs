//! Shopify Embed Core - Shared types library.
//!
//! This crate provides the Shopify domain types used by the embedded app
//! server and its integration tests:
//! - [`ShopDomain`] - A validated `*.myshopify.com` shop domain
//! - [`AuthScopes`] - The ordered list of OAuth access scopes
//! - [`WebhookTopic`] - A webhook topic in its GraphQL enum form
//! - [`ApiVersion`] - A dated Admin API version
//!
//! # Architecture
//!
//! The core crate contains only types and parsing - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
