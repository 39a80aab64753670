//! HMAC signatures Shopify attaches to OAuth callbacks and webhooks.
//!
//! Both are HMAC-SHA256 keyed with the app's API secret:
//!
//! - OAuth callbacks carry a hex digest in the `hmac` query parameter,
//!   computed over the remaining parameters sorted by key.
//! - Webhooks carry a base64 digest of the raw body in
//!   `X-Shopify-Hmac-Sha256`.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors from signature verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing hmac parameter")]
    Missing,
    #[error("invalid HMAC key")]
    InvalidKey,
    #[error("signature mismatch")]
    Mismatch,
}

/// Build the message Shopify signs for an OAuth callback.
///
/// `hmac` and `signature` are excluded; the rest are sorted by key and
/// re-encoded as `key=value` pairs joined by `&`.
#[must_use]
pub fn oauth_message(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params
        .iter()
        .filter(|(k, _)| k != "hmac" && k != "signature")
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in sorted {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Hex HMAC-SHA256 of an OAuth callback's parameters.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the secret cannot key the MAC.
pub fn sign_oauth_query(params: &[(String, String)], secret: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(oauth_message(params).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the `hmac` parameter of an OAuth callback query.
///
/// # Errors
///
/// Returns `SignatureError::Missing` if there is no `hmac` parameter and
/// `SignatureError::Mismatch` if it does not match.
pub fn verify_oauth_query(params: &[(String, String)], secret: &[u8]) -> Result<(), SignatureError> {
    let provided = params
        .iter()
        .find(|(k, _)| k == "hmac")
        .map(|(_, v)| v.as_str())
        .ok_or(SignatureError::Missing)?;

    let expected = sign_oauth_query(params, secret)?;

    if constant_time_compare(&expected, &provided.to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Base64 HMAC-SHA256 of a webhook body, as sent in `X-Shopify-Hmac-Sha256`.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the secret cannot key the MAC.
pub fn sign_webhook(body: &[u8], secret: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verify a webhook body against its `X-Shopify-Hmac-Sha256` header.
///
/// # Errors
///
/// Returns `SignatureError::Mismatch` if the header does not match.
pub fn verify_webhook(body: &[u8], header: &str, secret: &[u8]) -> Result<(), SignatureError> {
    let expected = sign_webhook(body, secret)?;

    if constant_time_compare(&expected, header.trim()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"hush";

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "ab"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_oauth_message_sorts_and_excludes_hmac() {
        let params = pairs(&[
            ("timestamp", "1337178173"),
            ("shop", "some-shop.myshopify.com"),
            ("hmac", "ignored"),
            ("code", "0907a61c0c8d55e99db179b68161bc00"),
        ]);
        assert_eq!(
            oauth_message(&params),
            "code=0907a61c0c8d55e99db179b68161bc00&shop=some-shop.myshopify.com&timestamp=1337178173"
        );
    }

    #[test]
    fn test_oauth_message_encodes_values() {
        let params = pairs(&[("state", "a b&c")]);
        assert_eq!(oauth_message(&params), "state=a+b%26c");
    }

    #[test]
    fn test_verify_oauth_query_accepts_valid() {
        let mut params = pairs(&[
            ("code", "abc"),
            ("shop", "some-shop.myshopify.com"),
            ("state", "xyz"),
            ("timestamp", "1337178173"),
        ]);
        let hmac = sign_oauth_query(&params, SECRET).unwrap();
        params.push(("hmac".to_string(), hmac));
        assert_eq!(verify_oauth_query(&params, SECRET), Ok(()));
    }

    #[test]
    fn test_verify_oauth_query_rejects_tampering() {
        let mut params = pairs(&[("code", "abc"), ("shop", "some-shop.myshopify.com")]);
        let hmac = sign_oauth_query(&params, SECRET).unwrap();
        params.push(("hmac".to_string(), hmac));
        params[0].1 = "other".to_string();
        assert_eq!(
            verify_oauth_query(&params, SECRET),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_oauth_query_missing_hmac() {
        let params = pairs(&[("code", "abc")]);
        assert_eq!(
            verify_oauth_query(&params, SECRET),
            Err(SignatureError::Missing)
        );
    }

    #[test]
    fn test_verify_webhook() {
        let body = br#"{"id":1}"#;
        let header = sign_webhook(body, SECRET).unwrap();
        assert_eq!(verify_webhook(body, &header, SECRET), Ok(()));
        assert_eq!(
            verify_webhook(br#"{"id":2}"#, &header, SECRET),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_webhook(body, &header, b"other-secret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_sign_webhook_known_vector() {
        let header = sign_webhook(b"", b"key").unwrap();
        assert_eq!(header, "XV0TlWPJW1lnub2ajJsjOp3ttFByeUzSMtwbdIMmB9A=");
    }
}
