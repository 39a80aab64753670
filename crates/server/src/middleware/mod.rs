//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, HTTP transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with signed cookies)
//! 5. GraphQL passthrough (`POST /graphql` answered before routing)

pub mod auth;
pub mod graphql_proxy;
pub mod request_id;
pub mod session;

pub use auth::{ReauthRedirect, VerifiedShop, current_shop_session, set_shop_session};
pub use graphql_proxy::graphql_proxy_middleware;
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
