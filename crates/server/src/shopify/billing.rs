//! Recurring application charges.
//!
//! After login the merchant can be sent to Shopify's charge confirmation page
//! for a 30-day recurring plan. Shopify redirects back to the app's
//! `returnUrl` once the merchant accepts or declines.

use serde::Deserialize;
use shopify_embed_core::ShopDomain;
use tracing::{info, instrument};

use crate::config::BillingConfig;

use super::{AdminApiClient, ShopifyError, UserError, format_user_errors};

const CREATE_SUBSCRIPTION: &str = r"
mutation AppSubscriptionCreate(
  $name: String!
  $returnUrl: URL!
  $test: Boolean
  $lineItems: [AppSubscriptionLineItemInput!]!
) {
  appSubscriptionCreate(name: $name, returnUrl: $returnUrl, test: $test, lineItems: $lineItems) {
    confirmationUrl
    appSubscription { id }
    userErrors { field message }
  }
}";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    app_subscription_create: CreatePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload {
    confirmation_url: Option<String>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

/// Creates recurring subscriptions for the configured plan.
#[derive(Clone)]
pub struct BillingClient {
    admin: AdminApiClient,
    plan: BillingConfig,
}

impl BillingClient {
    #[must_use]
    pub const fn new(admin: AdminApiClient, plan: BillingConfig) -> Self {
        Self { admin, plan }
    }

    /// GraphQL variables for the subscription mutation.
    fn variables(&self, return_url: &str) -> serde_json::Value {
        serde_json::json!({
            "name": self.plan.plan_name,
            "returnUrl": return_url,
            "test": self.plan.test,
            "lineItems": [{
                "plan": {
                    "appRecurringPricingDetails": {
                        "price": {
                            "amount": self.plan.price,
                            "currencyCode": self.plan.currency,
                        },
                        "interval": "EVERY_30_DAYS",
                    }
                }
            }],
        })
    }

    /// Create a subscription and return the merchant confirmation URL.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if Shopify rejects the subscription
    /// or returns no confirmation URL, and other `ShopifyError` variants if
    /// the call itself fails.
    #[instrument(skip(self, access_token), fields(shop = %shop, plan = %self.plan.plan_name))]
    pub async fn subscription_url(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        return_url: &str,
    ) -> Result<String, ShopifyError> {
        let data: CreateData = self
            .admin
            .graphql(
                shop,
                access_token,
                CREATE_SUBSCRIPTION,
                self.variables(return_url),
            )
            .await?;

        let payload = data.app_subscription_create;
        if !payload.user_errors.is_empty() {
            return Err(ShopifyError::UserError(format_user_errors(
                &payload.user_errors,
            )));
        }

        let url = payload.confirmation_url.ok_or_else(|| {
            ShopifyError::UserError("subscription created without confirmation URL".to_string())
        })?;

        info!("Created app subscription");
        Ok(url)
    }
}
