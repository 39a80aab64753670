//! Admin API version.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when an API version string is malformed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("API version must be YYYY-MM or \"unstable\", got {0:?}")]
pub struct ApiVersionError(pub String);

/// A Shopify Admin API version such as `2025-10`, or `unstable`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiVersion(String);

impl ApiVersion {
    /// Parse an API version.
    ///
    /// # Errors
    ///
    /// Returns `ApiVersionError` unless the input is `unstable` or has the
    /// form `YYYY-MM` with a month in 01-12.
    pub fn parse(s: &str) -> Result<Self, ApiVersionError> {
        let s = s.trim();
        if s == "unstable" {
            return Ok(Self(s.to_owned()));
        }

        let valid = s.split_once('-').is_some_and(|(year, month)| {
            year.len() == 4
                && year.chars().all(|c| c.is_ascii_digit())
                && month.len() == 2
                && month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
        });

        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(ApiVersionError(s.to_owned()))
        }
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
