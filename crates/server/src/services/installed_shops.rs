//! Shops that have completed OAuth and still have the app installed.
//!
//! Records the offline token per shop. A shop is added on a successful OAuth
//! callback and removed when Shopify reports `APP_UNINSTALLED`, which forces
//! the next visit back through OAuth.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use shopify_embed_core::{AuthScopes, ShopDomain};
use tokio::sync::RwLock;
use tracing::info;

use crate::shopify::{WebhookDelivery, WebhookError, WebhookHandler};

/// Offline access token kept for an installed shop.
#[derive(Clone)]
pub struct OfflineToken {
    pub access_token: String,
    pub scopes: AuthScopes,
    /// Unix timestamp when the token was obtained
    pub obtained_at: i64,
}

impl std::fmt::Debug for OfflineToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineToken")
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// In-memory table of installed shops.
///
/// Cheaply cloneable; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct InstalledShops {
    inner: Arc<RwLock<HashMap<ShopDomain, OfflineToken>>>,
}

impl InstalledShops {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the token for `shop`.
    pub async fn store(&self, shop: ShopDomain, token: OfflineToken) {
        self.inner.write().await.insert(shop, token);
    }

    /// Token for `shop`, if installed.
    pub async fn get(&self, shop: &ShopDomain) -> Option<OfflineToken> {
        self.inner.read().await.get(shop).cloned()
    }

    /// Forget `shop`. Returns true if it was installed.
    pub async fn remove(&self, shop: &ShopDomain) -> bool {
        self.inner.write().await.remove(shop).is_some()
    }
}

/// `APP_UNINSTALLED` handler: drops the shop from [`InstalledShops`].
#[derive(Debug, Clone)]
pub struct AppUninstalledHandler {
    shops: InstalledShops,
}

impl AppUninstalledHandler {
    #[must_use]
    pub const fn new(shops: InstalledShops) -> Self {
        Self { shops }
    }
}

impl WebhookHandler for AppUninstalledHandler {
    fn handle<'a>(&'a self, delivery: &'a WebhookDelivery) -> BoxFuture<'a, Result<(), WebhookError>> {
        Box::pin(async move {
            let removed = self.shops.remove(&delivery.shop).await;
            info!(shop = %delivery.shop, removed, "App uninstalled");
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Bytes;
    use shopify_embed_core::WebhookTopic;

    use super::*;

    fn shop() -> ShopDomain {
        ShopDomain::parse("test-shop.myshopify.com").unwrap()
    }

    fn token() -> OfflineToken {
        OfflineToken {
            access_token: "shpat_test".to_string(),
            scopes: AuthScopes::parse("read_products"),
            obtained_at: 0,
        }
    }

    #[tokio::test]
    async fn test_store_get_remove() {
        let shops = InstalledShops::new();
        assert!(shops.get(&shop()).await.is_none());

        shops.store(shop(), token()).await;
        assert_eq!(shops.get(&shop()).await.unwrap().access_token, "shpat_test");

        assert!(shops.remove(&shop()).await);
        assert!(!shops.remove(&shop()).await);
        assert!(shops.get(&shop()).await.is_none());
    }

    #[tokio::test]
    async fn test_uninstall_handler_removes_shop() {
        let shops = InstalledShops::new();
        shops.store(shop(), token()).await;

        let handler = AppUninstalledHandler::new(shops.clone());
        let delivery = WebhookDelivery {
            topic: WebhookTopic::app_uninstalled(),
            shop: shop(),
            webhook_id: None,
            api_version: None,
            body: Bytes::from_static(b"{}"),
        };
        handler.handle(&delivery).await.unwrap();

        assert!(shops.get(&shop()).await.is_none());
    }

    #[test]
    fn test_offline_token_debug_redacts() {
        assert!(!format!("{:?}", token()).contains("shpat_test"));
    }
}
