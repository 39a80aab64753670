//! GraphQL passthrough to the Shopify Admin API.
//!
//! Runs before routing: `POST /graphql` is answered here and never reaches
//! the router, so the page fallback cannot render it. Every other request
//! passes through untouched.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

use super::auth::current_shop_session;

/// Path served by the passthrough.
pub const GRAPHQL_PATH: &str = "/graphql";

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Proxy `POST /graphql`; call `next` for everything else.
pub async fn graphql_proxy_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST || request.uri().path() != GRAPHQL_PATH {
        return next.run(request).await;
    }

    proxy(&state, request)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

#[instrument(skip_all)]
async fn proxy(state: &AppState, request: Request) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("No active Shopify session".to_string()))?;

    let shop_session = current_shop_session(&session)
        .await
        .ok_or_else(|| AppError::Unauthorized("No active Shopify session".to_string()))?;

    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(format!("Unreadable GraphQL body: {e}")))?;

    let upstream = state
        .admin()
        .forward_graphql(&shop_session.shop, &shop_session.access_token, body)
        .await?;

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = upstream.content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from(upstream.body))
        .map_err(|e| AppError::Internal(format!("Failed to build proxy response: {e}")))
}
