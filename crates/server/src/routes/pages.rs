//! Embedded app pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode, Uri, header::CONTENT_SECURITY_POLICY},
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use crate::middleware::{ReauthRedirect, VerifiedShop};
use crate::models::ShopSession;
use crate::state::AppState;

/// App shell rendered inside the Shopify admin.
#[derive(Template, WebTemplate)]
#[template(path = "app.html")]
pub struct AppTemplate {
    pub api_key: String,
    pub shop: String,
    pub host: Option<String>,
}

/// Fallback for requests no route matched.
///
/// GET and HEAD render the app shell for a verified shop and redirect to
/// OAuth otherwise. Every other method is 404.
#[instrument(skip_all, fields(method = %method))]
pub async fn fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    verified: Result<VerifiedShop, ReauthRedirect>,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::NOT_FOUND.into_response();
    }

    match verified {
        Ok(VerifiedShop(session)) => render_app(&state, &session, admin_host(uri.query())),
        Err(redirect) => {
            debug!(location = %redirect.location(), "Session not verified");
            redirect.into_response()
        }
    }
}

/// Base64 admin host the admin appends when loading the app, handed to App
/// Bridge. The first non-empty `host` wins.
fn admin_host(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .find(|(key, value)| key == "host" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

fn render_app(state: &AppState, session: &ShopSession, host: Option<String>) -> Response {
    let template = AppTemplate {
        api_key: state.config().shopify.api_key.clone(),
        shop: session.shop.to_string(),
        host,
    };

    let mut response = template.into_response();

    // Only the merchant's admin may frame the app
    let policy = format!(
        "frame-ancestors https://{} https://admin.shopify.com",
        session.shop
    );
    if let Ok(value) = HeaderValue::from_str(&policy) {
        response.headers_mut().insert(CONTENT_SECURITY_POLICY, value);
    }

    response
}
