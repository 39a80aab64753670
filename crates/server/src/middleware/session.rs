//! Session middleware configuration.
//!
//! Cookie sessions backed by the in-memory store. The app runs inside the
//! Shopify admin iframe, so the cookie must be `SameSite=None; Secure` to be
//! sent on embedded requests at all.

use sha2::{Digest, Sha512};
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "shopify_app_session";

/// Session expiry time in seconds (1 day).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Context string mixed into the cookie signing key.
const COOKIE_KEY_CONTEXT: &[u8] = b"shopify-app-session-cookie";

/// Create the session layer with an in-memory store.
///
/// Cookies are signed with a 64-byte key derived from the API secret, so
/// every instance configured with the same secret accepts the same cookies.
#[must_use]
pub fn create_session_layer(config: &AppConfig) -> SessionManagerLayer<MemoryStore, SignedCookie> {
    let store = MemoryStore::default();

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(true)
        .with_same_site(tower_sessions::cookie::SameSite::None)
        .with_http_only(true)
        .with_path("/")
        .with_signed(cookie_key(config.shopify.secret_bytes()))
}

/// Derive the cookie signing key from the API secret.
fn cookie_key(secret: &[u8]) -> Key {
    // SHA-512 output is exactly the 64 bytes `Key::from` requires.
    let digest = Sha512::new()
        .chain_update(COOKIE_KEY_CONTEXT)
        .chain_update(secret)
        .finalize();
    Key::from(digest.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_key_is_deterministic() {
        let a = cookie_key(b"shpss_one");
        let b = cookie_key(b"shpss_one");
        let c = cookie_key(b"shpss_two");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }
}
