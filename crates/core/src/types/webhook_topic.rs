//! Webhook topic type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`WebhookTopic`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookTopicError {
    /// The input string is empty.
    #[error("webhook topic cannot be empty")]
    Empty,
    /// The input contains characters that cannot appear in a topic.
    #[error("invalid webhook topic: {0}")]
    Invalid(String),
}

/// A webhook topic in its GraphQL enum form, e.g. `APP_UNINSTALLED`.
///
/// Shopify uses two spellings for the same topic: the REST/header form
/// (`app/uninstalled`, sent in `X-Shopify-Topic`) and the GraphQL enum form
/// (`APP_UNINSTALLED`, used by `webhookSubscriptionCreate`). Both parse to the
/// same value.
///
/// ```
/// use shopify_embed_core::WebhookTopic;
///
/// let from_header = WebhookTopic::parse("app_subscriptions/update").unwrap();
/// let from_config = WebhookTopic::parse("APP_SUBSCRIPTIONS_UPDATE").unwrap();
/// assert_eq!(from_header, from_config);
/// assert_eq!(from_header.as_str(), "APP_SUBSCRIPTIONS_UPDATE");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct WebhookTopic(String);

impl WebhookTopic {
    /// Parse a topic from either the header or the GraphQL form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or contains anything other than
    /// ASCII letters, digits, `_` and `/`.
    pub fn parse(s: &str) -> Result<Self, WebhookTopicError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(WebhookTopicError::Empty);
        }

        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/')
        {
            return Err(WebhookTopicError::Invalid(s.to_owned()));
        }

        Ok(Self(s.replace('/', "_").to_ascii_uppercase()))
    }

    /// The GraphQL enum form, e.g. `APP_UNINSTALLED`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `APP_UNINSTALLED` topic.
    #[must_use]
    pub fn app_uninstalled() -> Self {
        Self("APP_UNINSTALLED".to_owned())
    }
}

impl fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WebhookTopic {
    type Err = WebhookTopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WebhookTopic {
    type Error = WebhookTopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WebhookTopic> for String {
    fn from(topic: WebhookTopic) -> Self {
        topic.0
    }
}
