//! Shopify OAuth route handlers.
//!
//! Installation and login share one flow:
//!
//! 1. `GET /auth?shop=` stores a random state and redirects to the shop's
//!    authorization page. From inside the admin iframe (`embedded=1`) it first
//!    breaks out to the top window via `/auth/inline`, since the session
//!    cookie cannot be set from a third-party frame on first visit.
//! 2. Shopify redirects back to `GET /auth/callback`, which verifies the
//!    query HMAC and state, exchanges the code for an offline token, stores
//!    the session and runs the after-auth hook.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use serde::Deserialize;
use shopify_embed_core::ShopDomain;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::middleware::set_shop_session;
use crate::models::{ShopSession, session_keys};
use crate::services::{AuthContext, OfflineToken};
use crate::shopify::hmac;
use crate::state::AppState;

/// Length of the OAuth state nonce.
const STATE_LENGTH: usize = 32;

/// Generate a cryptographically random alphanumeric string.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|&b| char::from(b))
        .collect()
}

/// Query parameters for OAuth start.
#[derive(Debug, Deserialize)]
pub struct AuthStartQuery {
    pub shop: Option<String>,
    pub embedded: Option<String>,
}

/// Page that sends the top-level window to OAuth start.
#[derive(Template, WebTemplate)]
#[template(path = "auth/top_level.html")]
pub struct TopLevelRedirectTemplate {
    pub redirect_url: String,
    pub shop: String,
}

fn require_shop(shop: Option<&str>) -> Result<ShopDomain, AppError> {
    let shop = shop
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing shop parameter".to_string()))?;
    ShopDomain::parse(shop).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Begin OAuth.
///
/// GET /auth?shop={shop}[&embedded=1]
#[instrument(skip(state, session))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<AuthStartQuery>,
) -> Result<Response, AppError> {
    let shop = require_shop(query.shop.as_deref())?;

    if query.embedded.as_deref() == Some("1") {
        let redirect_url = format!(
            "{}/auth/inline?shop={}",
            state.config().app_url(),
            urlencoding::encode(shop.as_str())
        );
        return Ok(TopLevelRedirectTemplate {
            redirect_url,
            shop: shop.into_inner(),
        }
        .into_response());
    }

    start_oauth(&state, &session, shop).await
}

/// Begin OAuth from the top-level window.
///
/// GET /auth/inline?shop={shop}
#[instrument(skip(state, session))]
pub async fn inline(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<AuthStartQuery>,
) -> Result<Response, AppError> {
    let shop = require_shop(query.shop.as_deref())?;
    start_oauth(&state, &session, shop).await
}

async fn start_oauth(
    state: &AppState,
    session: &Session,
    shop: ShopDomain,
) -> Result<Response, AppError> {
    let oauth_state = generate_random_string(STATE_LENGTH);

    session.insert(session_keys::OAUTH_STATE, &oauth_state).await?;
    session.insert(session_keys::OAUTH_SHOP, &shop).await?;

    let config = state.config();
    let auth_url = state.admin().authorization_url(
        &shop,
        &config.shopify.scopes,
        &config.oauth_callback_url(),
        &oauth_state,
    );

    info!(shop = %shop, "Starting Shopify OAuth");
    Ok(Redirect::to(&auth_url).into_response())
}

/// Complete OAuth.
///
/// GET /auth/callback?code=&hmac=&shop=&state=&timestamp=[&host=]
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    let params: Vec<(String, String)> =
        url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();
    let param = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    if let Some(error) = param("error") {
        warn!(
            error,
            description = param("error_description").unwrap_or_default(),
            "OAuth authorization denied"
        );
        return Err(AppError::Forbidden(
            "OAuth authorization was denied".to_string(),
        ));
    }

    if let Err(e) = hmac::verify_oauth_query(&params, state.config().shopify.secret_bytes()) {
        warn!(error = %e, "OAuth callback HMAC verification failed");
        return Err(AppError::BadRequest("Invalid OAuth callback".to_string()));
    }

    // One-time values: removed whether or not they match
    let expected_state: Option<String> = session.remove(session_keys::OAUTH_STATE).await?;
    let expected_shop: Option<ShopDomain> = session.remove(session_keys::OAUTH_SHOP).await?;

    let state_matches = matches!(
        (param("state"), expected_state.as_deref()),
        (Some(got), Some(expected)) if got == expected
    );
    if !state_matches {
        warn!("OAuth state mismatch");
        return Err(AppError::Forbidden("Invalid OAuth state".to_string()));
    }

    let shop = require_shop(param("shop"))?;
    if expected_shop.as_ref() != Some(&shop) {
        warn!(shop = %shop, "OAuth callback for a different shop");
        return Err(AppError::Forbidden(
            "Shop does not match OAuth request".to_string(),
        ));
    }

    let code = param("code")
        .ok_or_else(|| AppError::BadRequest("Missing code parameter".to_string()))?;

    let token = state.admin().exchange_code(&shop, code).await?;
    let scopes = token.scopes();
    let now = chrono::Utc::now().timestamp();

    set_shop_session(
        &session,
        &ShopSession {
            shop: shop.clone(),
            access_token: token.access_token.clone(),
            scopes: scopes.clone(),
            established_at: now,
        },
    )
    .await?;

    state
        .installed_shops()
        .store(
            shop.clone(),
            OfflineToken {
                access_token: token.access_token.clone(),
                scopes: scopes.clone(),
                obtained_at: now,
            },
        )
        .await;

    info!(shop = %shop, scopes = %scopes, "Shop authenticated");

    let ctx = AuthContext {
        shop,
        access_token: token.access_token,
        scopes,
        host: param("host").map(str::to_owned),
    };
    let redirect = state.after_auth().after_auth(&ctx).await?;

    Ok(redirect.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_string() {
        let a = generate_random_string(STATE_LENGTH);
        let b = generate_random_string(STATE_LENGTH);
        assert_eq!(a.len(), STATE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_require_shop() {
        assert!(matches!(require_shop(None), Err(AppError::BadRequest(_))));
        assert!(matches!(require_shop(Some(" ")), Err(AppError::BadRequest(_))));
        assert!(matches!(
            require_shop(Some("evil.example.com")),
            Err(AppError::BadRequest(_))
        ));
        assert!(require_shop(Some("test-shop.myshopify.com")).is_ok());
    }
}
