//! Application state shared across handlers.

use std::sync::Arc;

use shopify_embed_core::WebhookTopic;

use crate::config::AppConfig;
use crate::services::{AfterAuth, AppUninstalledHandler, InstalledShops, StandardAfterAuth};
use crate::shopify::{AdminApiClient, WebhookRegistry};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    admin: AdminApiClient,
    installed_shops: InstalledShops,
    webhooks: WebhookRegistry,
    after_auth: Arc<dyn AfterAuth>,
}

impl AppState {
    /// Create state with the standard hook and an `APP_UNINSTALLED` handler.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let admin = AdminApiClient::new(&config.shopify);
        let installed_shops = InstalledShops::new();
        let webhooks = WebhookRegistry::new().with_handler(
            WebhookTopic::app_uninstalled(),
            Arc::new(AppUninstalledHandler::new(installed_shops.clone())),
        );
        let after_auth = Arc::new(StandardAfterAuth::from_config(&config, admin.clone()));

        Self::assemble(config, admin, installed_shops, webhooks, after_auth)
    }

    /// Create state with a caller-supplied webhook registry and hook.
    #[must_use]
    pub fn from_parts(
        config: AppConfig,
        installed_shops: InstalledShops,
        webhooks: WebhookRegistry,
        after_auth: Arc<dyn AfterAuth>,
    ) -> Self {
        let admin = AdminApiClient::new(&config.shopify);
        Self::assemble(config, admin, installed_shops, webhooks, after_auth)
    }

    fn assemble(
        config: AppConfig,
        admin: AdminApiClient,
        installed_shops: InstalledShops,
        webhooks: WebhookRegistry,
        after_auth: Arc<dyn AfterAuth>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                admin,
                installed_shops,
                webhooks,
                after_auth,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the Shopify Admin API client.
    #[must_use]
    pub fn admin(&self) -> &AdminApiClient {
        &self.inner.admin
    }

    /// Shops with a current offline token.
    #[must_use]
    pub fn installed_shops(&self) -> &InstalledShops {
        &self.inner.installed_shops
    }

    /// Webhook topic handlers.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookRegistry {
        &self.inner.webhooks
    }

    /// Post-authentication hook.
    #[must_use]
    pub fn after_auth(&self) -> &dyn AfterAuth {
        self.inner.after_auth.as_ref()
    }
}
