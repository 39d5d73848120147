//! API routes

pub mod admin;
pub mod auth;
pub mod health;
pub mod usb_key;

use axum::{
    http::HeaderMap,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Extract client IP address from request headers.
/// Checks common proxy headers in order of preference.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-real-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/verify-usb-key", post(usb_key::verify_usb_key))
        .route("/api/health", get(health::health));

    // Routes requiring a valid session token
    let protected_routes = Router::new()
        .route("/api/users/me", get(auth::me))
        .route("/api/admin/usb-key", get(usb_key::usb_key_status))
        .route("/api/admin/usb-key", post(usb_key::set_usb_key))
        .route("/api/admin/users", post(admin::create_admin))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id/status", put(admin::update_user_status))
        .route("/api/admin/users/:id", delete(admin::delete_user));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_client_ip_prefers_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn test_extract_client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn test_extract_client_ip_none_when_missing() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }
}
