//! Shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The domain is not under `myshopify.com`.
    #[error("shop domain must end with .myshopify.com")]
    WrongSuffix,
    /// The shop handle (before `.myshopify.com`) is malformed.
    #[error("invalid shop handle: {0}")]
    InvalidHandle(String),
}

/// A Shopify shop domain, e.g. `example.myshopify.com`.
///
/// Shop domains arrive as untrusted query parameters (OAuth start, callback,
/// session verification) and as webhook headers, so they are validated before
/// they are ever used to build an outbound URL.
///
/// ## Constraints
///
/// - Length: 1-255 characters
/// - Must end with `.myshopify.com` (compared case-insensitively, stored lowercase)
/// - Handle must start with an ASCII letter or digit and contain only
///   ASCII letters, digits and hyphens
///
/// ## Examples
///
/// ```
/// use shopify_embed_core::ShopDomain;
///
/// assert!(ShopDomain::parse("example.myshopify.com").is_ok());
/// assert!(ShopDomain::parse("My-Shop.myshopify.com").is_ok());
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("evil.com").is_err());
/// assert!(ShopDomain::parse("evil.com/.myshopify.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Maximum length of a DNS name.
    pub const MAX_LENGTH: usize = 255;

    /// Domain suffix every shop lives under.
    pub const SUFFIX: &'static str = ".myshopify.com";

    /// Parse a `ShopDomain` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, not under
    /// `myshopify.com`, or has a malformed handle.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let lower = s.to_ascii_lowercase();
        let handle = lower
            .strip_suffix(Self::SUFFIX)
            .ok_or(ShopDomainError::WrongSuffix)?;

        let mut chars = handle.chars();
        let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_first || !valid_rest {
            return Err(ShopDomainError::InvalidHandle(handle.to_owned()));
        }

        Ok(Self(lower))
    }

    /// Returns the shop domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(shop: ShopDomain) -> Self {
        shop.0
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_shops() {
        assert!(ShopDomain::parse("example.myshopify.com").is_ok());
        assert!(ShopDomain::parse("my-shop.myshopify.com").is_ok());
        assert!(ShopDomain::parse("shop123.myshopify.com").is_ok());
        assert!(ShopDomain::parse("1shop.myshopify.com").is_ok());
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let shop = ShopDomain::parse("  Example.MyShopify.com ").unwrap();
        assert_eq!(shop.as_str(), "example.myshopify.com");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ShopDomain::parse(""), Err(ShopDomainError::Empty));
        assert_eq!(ShopDomain::parse("   "), Err(ShopDomainError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}.myshopify.com", "a".repeat(250));
        assert!(matches!(
            ShopDomain::parse(&long),
            Err(ShopDomainError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_wrong_suffix() {
        assert_eq!(
            ShopDomain::parse("example.com"),
            Err(ShopDomainError::WrongSuffix)
        );
        assert_eq!(
            ShopDomain::parse("example.myshopify.com.evil.com"),
            Err(ShopDomainError::WrongSuffix)
        );
    }

    #[test]
    fn test_parse_rejects_smuggled_hosts() {
        assert!(ShopDomain::parse("evil.com/.myshopify.com").is_err());
        assert!(ShopDomain::parse("evil.com?.myshopify.com").is_err());
        assert!(ShopDomain::parse("a.b.myshopify.com").is_err());
        assert!(ShopDomain::parse("-shop.myshopify.com").is_err());
        assert!(ShopDomain::parse(".myshopify.com").is_err());
    }

    #[test]
    fn test_display() {
        let shop = ShopDomain::parse("example.myshopify.com").unwrap();
        assert_eq!(format!("{shop}"), "example.myshopify.com");
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let shop: ShopDomain = serde_json::from_str("\"example.myshopify.com\"").unwrap();
        assert_eq!(shop.as_str(), "example.myshopify.com");
        assert_eq!(
            serde_json::to_string(&shop).unwrap(),
            "\"example.myshopify.com\""
        );

        let bad: Result<ShopDomain, _> = serde_json::from_str("\"evil.com\"");
        assert!(bad.is_err());
    }
}
