//! Shop session verification.
//!
//! [`VerifiedShop`] guards every page the merchant sees inside the admin. A
//! request passes only with a current Shopify session for an installed shop;
//! anything else is sent back through OAuth.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use shopify_embed_core::ShopDomain;
use tower_sessions::Session;
use tracing::debug;

use crate::models::{ShopSession, session_keys};
use crate::state::AppState;

/// Extractor that requires an authenticated, installed shop.
///
/// # Example
///
/// ```rust,ignore
/// async fn page(VerifiedShop(session): VerifiedShop) -> impl IntoResponse {
///     format!("Hello, {}!", session.shop)
/// }
/// ```
pub struct VerifiedShop(pub ShopSession);

/// Rejection sending the browser to OAuth start.
#[derive(Debug, PartialEq, Eq)]
pub struct ReauthRedirect {
    shop: Option<ShopDomain>,
    embedded: bool,
}

impl ReauthRedirect {
    /// Path and query of the OAuth start URL.
    #[must_use]
    pub fn location(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(shop) = &self.shop {
            serializer.append_pair("shop", shop.as_str());
        }
        if self.embedded {
            serializer.append_pair("embedded", "1");
        }
        let query = serializer.finish();

        if query.is_empty() {
            "/auth".to_string()
        } else {
            format!("/auth?{query}")
        }
    }
}

impl IntoResponse for ReauthRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.location()).into_response()
    }
}

impl FromRequestParts<AppState> for VerifiedShop {
    type Rejection = ReauthRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let query = RequestShop::from_query(parts.uri.query());

        let session = match parts.extensions.get::<Session>() {
            Some(session) => current_shop_session(session).await,
            None => None,
        };

        let reject = |stale: Option<&ShopSession>| ReauthRedirect {
            shop: query
                .shop
                .clone()
                .or_else(|| stale.map(|s| s.shop.clone())),
            embedded: query.embedded,
        };

        let Some(session) = session else {
            debug!("No Shopify session, redirecting to OAuth");
            return Err(reject(None));
        };

        if query.shop.as_ref().is_some_and(|shop| *shop != session.shop) {
            debug!(session_shop = %session.shop, "Shop parameter differs from session");
            return Err(reject(None));
        }

        if !session.scopes.satisfies(&state.config().shopify.scopes) {
            debug!(shop = %session.shop, "Session scopes no longer sufficient");
            return Err(reject(Some(&session)));
        }

        match state.installed_shops().get(&session.shop).await {
            None => {
                debug!(shop = %session.shop, "Shop not installed");
                return Err(reject(Some(&session)));
            }
            Some(installed) if installed.access_token != session.access_token => {
                debug!(shop = %session.shop, "Session token superseded by a newer install");
                return Err(reject(Some(&session)));
            }
            Some(_) => {}
        }

        Ok(Self(session))
    }
}

/// `shop` and `embedded` query parameters of the current request.
#[derive(Debug, Default)]
struct RequestShop {
    shop: Option<ShopDomain>,
    embedded: bool,
}

impl RequestShop {
    fn from_query(query: Option<&str>) -> Self {
        let mut parsed = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "shop" => parsed.shop = ShopDomain::parse(&value).ok(),
                "embedded" => parsed.embedded = value == "1",
                _ => {}
            }
        }
        parsed
    }
}

/// Read the Shopify session, treating store errors as no session.
pub async fn current_shop_session(session: &Session) -> Option<ShopSession> {
    session
        .get::<ShopSession>(session_keys::SHOPIFY_SESSION)
        .await
        .ok()
        .flatten()
}

/// Store the Shopify session after OAuth.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn set_shop_session(
    session: &Session,
    shop_session: &ShopSession,
) -> Result<(), tower_sessions::session::Error> {
    // Rotate the session id on login
    session.cycle_id().await?;
    session
        .insert(session_keys::SHOPIFY_SESSION, shop_session)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shop(s: &str) -> ShopDomain {
        ShopDomain::parse(s).unwrap()
    }

    #[test]
    fn test_reauth_location() {
        let redirect = ReauthRedirect {
            shop: Some(shop("test-shop.myshopify.com")),
            embedded: false,
        };
        assert_eq!(redirect.location(), "/auth?shop=test-shop.myshopify.com");

        let redirect = ReauthRedirect {
            shop: Some(shop("test-shop.myshopify.com")),
            embedded: true,
        };
        assert_eq!(
            redirect.location(),
            "/auth?shop=test-shop.myshopify.com&embedded=1"
        );

        let redirect = ReauthRedirect {
            shop: None,
            embedded: false,
        };
        assert_eq!(redirect.location(), "/auth");
    }

    #[test]
    fn test_request_shop_from_query() {
        let parsed = RequestShop::from_query(Some("shop=Test-Shop.myshopify.com&embedded=1&host=abc"));
        assert_eq!(parsed.shop, Some(shop("test-shop.myshopify.com")));
        assert!(parsed.embedded);

        let parsed = RequestShop::from_query(Some("shop=evil.example.com"));
        assert_eq!(parsed.shop, None);
        assert!(!parsed.embedded);

        let parsed = RequestShop::from_query(None);
        assert_eq!(parsed.shop, None);
    }
}
