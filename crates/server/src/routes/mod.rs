//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health          - Health check
//!
//! # OAuth
//! GET  /auth            - Start OAuth (iframe escape when embedded=1)
//! GET  /auth/inline     - Start OAuth from the top-level window
//! GET  /auth/callback   - Complete OAuth, run the after-auth hook
//!
//! # Shopify
//! POST /webhooks        - Webhook deliveries
//! POST /graphql         - Admin API passthrough (middleware, not routed)
//!
//! # Assets
//! GET  /static/*        - Static files
//!
//! # App
//! GET  *                - App shell (verified shop session required)
//! ```

pub mod auth;
pub mod pages;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Create all routes for the app, including the page fallback.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // OAuth
        .route("/auth", get(auth::begin))
        .route("/auth/inline", get(auth::inline))
        .route("/auth/callback", get(auth::callback))
        // Shopify webhooks
        .route("/webhooks", post(webhooks::receive))
        // Static files
        .nest_service("/static", ServeDir::new(&state.config().static_dir))
        // Everything else renders the app shell
        .fallback(pages::fallback)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
