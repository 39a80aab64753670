//! OAuth access scopes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// An ordered list of Shopify OAuth access scopes.
///
/// Scopes are configured as a comma-separated string (`SCOPES` env var) and
/// echoed back by Shopify in the same format on token exchange. Order is
/// preserved as given; surrounding whitespace and empty entries are dropped.
///
/// ```
/// use shopify_embed_core::AuthScopes;
///
/// let scopes = AuthScopes::parse("read_products, write_products");
/// assert_eq!(scopes.len(), 2);
/// assert_eq!(scopes.to_string(), "read_products,write_products");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AuthScopes(Vec<String>);

impl AuthScopes {
    /// Parse a comma-separated scope list.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self(
            s.split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Returns the scopes in configured order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no scopes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether `self` grants every scope in `required`.
    ///
    /// A `write_x` scope implies `read_x`, matching how Shopify reports
    /// granted scopes (it omits the implied read scope).
    #[must_use]
    pub fn satisfies(&self, required: &Self) -> bool {
        required.0.iter().all(|needed| {
            self.0.iter().any(|granted| {
                granted == needed
                    || needed.strip_prefix("read_").is_some_and(|resource| {
                        granted.strip_prefix("write_") == Some(resource)
                    })
            })
        })
    }
}

impl fmt::Display for AuthScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl From<Vec<String>> for AuthScopes {
    fn from(scopes: Vec<String>) -> Self {
        Self(scopes)
    }
}
