//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};
use shopify_embed_core::{AuthScopes, ShopDomain};

/// Session-stored shop identity, written when an OAuth handshake completes.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShopSession {
    /// Shop the merchant authenticated for.
    pub shop: ShopDomain,
    /// Offline Admin API access token.
    pub access_token: String,
    /// Scopes granted by the merchant.
    pub scopes: AuthScopes,
    /// Unix timestamp when the handshake completed.
    pub established_at: i64,
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("established_at", &self.established_at)
            .finish()
    }
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for the authenticated shop session.
    pub const SHOPIFY_SESSION: &str = "shopify_session";

    /// Key for the OAuth state parameter (CSRF protection).
    pub const OAUTH_STATE: &str = "shopify_oauth_state";

    /// Key for the shop an OAuth handshake was started for.
    pub const OAUTH_SHOP: &str = "shopify_oauth_shop";
}
