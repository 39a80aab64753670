//! Domain models for the embedded app server.
//!
//! Types stored in the cookie-backed session and passed between the OAuth
//! flow and the `after_auth` hook.

pub mod session;

pub use session::{ShopSession, session_keys};
