//! Post-authentication hook.
//!
//! Runs exactly once per successful OAuth callback, after the session holds
//! the new shop credentials. The hook decides where the merchant goes next;
//! the callback handler performs the redirect.
//!
//! [`StandardAfterAuth`] covers the usual setups, selected by configuration:
//!
//! | `WEBHOOK_TOPICS` | `BILLING_ENABLED` | After login |
//! |------------------|-------------------|-------------|
//! | empty            | true              | Billing confirmation |
//! | empty            | false             | `/?shop={shop}` |
//! | topics           | true              | Register topics, then billing confirmation |
//! | topics           | false             | Register topics, then `/?shop={shop}` |

use axum::response::{IntoResponse, Redirect, Response};
use futures::future::BoxFuture;
use shopify_embed_core::{AuthScopes, ShopDomain, WebhookTopic};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::shopify::{AdminApiClient, BillingClient, RegisterOutcome};

/// Credentials and request details handed to the hook.
#[derive(Clone)]
pub struct AuthContext {
    pub shop: ShopDomain,
    pub access_token: String,
    pub scopes: AuthScopes,
    /// Base64 `host` parameter from the admin, when present
    pub host: Option<String>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("host", &self.host)
            .finish()
    }
}

/// Where to send the merchant after login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterAuthRedirect(String);

impl AfterAuthRedirect {
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.0
    }
}

impl IntoResponse for AfterAuthRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.0).into_response()
    }
}

/// Hook invoked after a successful OAuth callback.
pub trait AfterAuth: Send + Sync {
    /// Decide the post-login destination.
    ///
    /// An error is reported to the merchant as an error page; no redirect is
    /// performed.
    fn after_auth<'a>(
        &'a self,
        ctx: &'a AuthContext,
    ) -> BoxFuture<'a, Result<AfterAuthRedirect, AppError>>;
}

/// URL Shopify returns the merchant to after confirming a charge.
#[must_use]
pub fn return_url(host_name: &str, shop: &ShopDomain) -> String {
    format!("https://{host_name}?shop={shop}")
}

/// Default hook: optional webhook registration followed by billing or the
/// app home page.
#[derive(Clone)]
pub struct StandardAfterAuth {
    host_name: String,
    admin: AdminApiClient,
    webhook_topics: Vec<WebhookTopic>,
    webhook_callback_url: String,
    billing: Option<BillingClient>,
}

impl StandardAfterAuth {
    #[must_use]
    pub fn from_config(config: &AppConfig, admin: AdminApiClient) -> Self {
        let billing = config
            .billing
            .enabled
            .then(|| BillingClient::new(admin.clone(), config.billing.clone()));

        Self {
            host_name: config.host_name.clone(),
            admin,
            webhook_topics: config.webhook_topics.clone(),
            webhook_callback_url: config.webhook_callback_url(),
            billing,
        }
    }

    /// Register every configured topic. Failures are logged and do not stop
    /// the login.
    async fn register_webhooks(&self, ctx: &AuthContext) -> Vec<RegisterOutcome> {
        let mut outcomes = Vec::with_capacity(self.webhook_topics.len());

        for topic in &self.webhook_topics {
            match self
                .admin
                .register_webhook(&ctx.shop, &ctx.access_token, topic, &self.webhook_callback_url)
                .await
            {
                Ok(outcome) if outcome.success => {
                    info!(shop = %ctx.shop, topic = %topic, "Registered webhook");
                    outcomes.push(outcome);
                }
                Ok(outcome) => {
                    warn!(
                        shop = %ctx.shop,
                        topic = %topic,
                        result = %outcome.result,
                        "Failed to register webhook"
                    );
                    outcomes.push(outcome);
                }
                Err(e) => {
                    warn!(shop = %ctx.shop, topic = %topic, error = %e, "Failed to register webhook");
                }
            }
        }

        outcomes
    }
}

impl AfterAuth for StandardAfterAuth {
    fn after_auth<'a>(
        &'a self,
        ctx: &'a AuthContext,
    ) -> BoxFuture<'a, Result<AfterAuthRedirect, AppError>> {
        Box::pin(async move {
            if !self.webhook_topics.is_empty() {
                self.register_webhooks(ctx).await;
            }

            match &self.billing {
                Some(billing) => {
                    let return_url = return_url(&self.host_name, &ctx.shop);
                    let confirmation = billing
                        .subscription_url(&ctx.shop, &ctx.access_token, &return_url)
                        .await?;
                    Ok(AfterAuthRedirect::to(confirmation))
                }
                None => Ok(AfterAuthRedirect::to(format!("/?shop={}", ctx.shop))),
            }
        })
    }
}
