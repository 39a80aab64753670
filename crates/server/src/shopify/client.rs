//! Shopify Admin API client.
//!
//! One client serves every installed shop. Calls take the shop domain and
//! access token explicitly; tokens live in the session and in
//! [`InstalledShops`](crate::services::InstalledShops), never in the client.

use std::sync::Arc;

use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use shopify_embed_core::{ApiVersion, AuthScopes, ShopDomain};
use tracing::instrument;
use url::Url;

use crate::config::ShopifyAppConfig;

use super::{GraphQLError, ShopifyError};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Offline access token returned by the OAuth code exchange.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    /// The access token for Admin API calls
    pub access_token: String,
    /// Granted scopes, comma separated
    pub scope: String,
}

impl AccessToken {
    /// Granted scopes as parsed from the exchange response.
    #[must_use]
    pub fn scopes(&self) -> AuthScopes {
        AuthScopes::parse(&self.scope)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Shopify Admin API client.
#[derive(Clone)]
pub struct AdminApiClient {
    inner: Arc<AdminApiClientInner>,
}

struct AdminApiClientInner {
    client: reqwest::Client,
    api_key: String,
    api_secret: SecretString,
    api_version: ApiVersion,
    origin_override: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// Raw upstream reply to a forwarded GraphQL request.
#[derive(Debug)]
pub struct ForwardedResponse {
    /// Upstream HTTP status
    pub status: u16,
    /// Upstream `Content-Type`, if any
    pub content_type: Option<String>,
    /// Upstream body, untouched
    pub body: Bytes,
}

impl AdminApiClient {
    /// Create a new Admin API client.
    #[must_use]
    pub fn new(config: &ShopifyAppConfig) -> Self {
        Self {
            inner: Arc::new(AdminApiClientInner {
                client: reqwest::Client::new(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                api_version: config.api_version.clone(),
                origin_override: config
                    .admin_origin
                    .as_ref()
                    .map(|url| url.as_str().trim_end_matches('/').to_string()),
            }),
        }
    }

    /// Base URL for a shop's admin, `https://{shop}` unless overridden.
    #[must_use]
    pub fn origin(&self, shop: &ShopDomain) -> String {
        self.inner
            .origin_override
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"))
    }

    /// GraphQL endpoint for a shop at the configured API version.
    #[must_use]
    pub fn graphql_endpoint(&self, shop: &ShopDomain) -> String {
        format!(
            "{}/admin/api/{}/graphql.json",
            self.origin(shop),
            self.inner.api_version
        )
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL.
    ///
    /// Redirect the merchant's browser here to begin installation or login.
    #[must_use]
    pub fn authorization_url(
        &self,
        shop: &ShopDomain,
        scopes: &AuthScopes,
        redirect_uri: &str,
        state: &str,
    ) -> String {
        let mut url = match Url::parse(&format!("{}/admin/oauth/authorize", self.origin(shop))) {
            Ok(url) => url,
            Err(_) => return format!("https://{shop}/admin/oauth/authorize"),
        };
        url.query_pairs_mut()
            .append_pair("client_id", &self.inner.api_key)
            .append_pair("scope", &scopes.to_string())
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state);
        url.into()
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if Shopify rejects the exchange.
    /// Returns `ShopifyError::Http` if the HTTP request fails.
    #[instrument(skip(self, code), fields(shop = %shop))]
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessToken, ShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.origin(shop));

        let params = [
            ("client_id", self.inner.api_key.as_str()),
            ("client_secret", self.inner.api_secret.expose_secret()),
            ("code", code),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed ({status}): {text}"
            )));
        }

        Ok(response.json().await?)
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL document and deserialize its `data`.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::RateLimited` on 429, `ShopifyError::Unauthorized`
    /// on 401, and `ShopifyError::GraphQL` when the response carries errors or
    /// no data.
    #[instrument(skip(self, access_token, query, variables), fields(shop = %shop))]
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ShopifyError> {
        let body = serde_json::json!({ "query": query, "variables": variables });

        let response = self
            .inner
            .client
            .post(self.graphql_endpoint(shop))
            .header(ACCESS_TOKEN_HEADER, access_token)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        let graphql_response: GraphQLResponse<T> = response.json().await?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            return Err(ShopifyError::GraphQL(errors));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }

    /// Forward a GraphQL request body unchanged and return the raw reply.
    ///
    /// Unlike [`graphql`](Self::graphql) the upstream status and body are not
    /// interpreted; GraphQL errors reach the caller as Shopify sent them.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if Shopify cannot be reached.
    #[instrument(skip(self, access_token, body), fields(shop = %shop, bytes = body.len()))]
    pub async fn forward_graphql(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        body: Bytes,
    ) -> Result<ForwardedResponse, ShopifyError> {
        let response = self
            .inner
            .client
            .post(self.graphql_endpoint(shop))
            .header(ACCESS_TOKEN_HEADER, access_token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        Ok(ForwardedResponse {
            status,
            content_type,
            body,
        })
    }
}
