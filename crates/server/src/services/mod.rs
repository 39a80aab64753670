//! App services shared by route handlers.

pub mod after_auth;
pub mod installed_shops;

pub use after_auth::{AfterAuth, AfterAuthRedirect, AuthContext, StandardAfterAuth, return_url};
pub use installed_shops::{AppUninstalledHandler, InstalledShops, OfflineToken};
