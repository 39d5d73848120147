//! Request authentication extractor
//!
//! `AuthUser` pulls the bearer token from the `Authorization` header and
//! validates it as a session credential. USB challenge tokens are rejected
//! here; they are only meaningful to the USB key verification endpoint.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use bookmarket_shared::Role;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// The authenticated caller, derived from a valid session token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Guard for admin-only handlers
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;

        let claims = state
            .jwt_manager
            .validate_session_token(&token)
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        })
    }
}

/// Extract the bearer token from the `Authorization` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(
            extract_bearer_token(&headers),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn test_extract_bearer_token_lowercase_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("bearer abc"),
        );
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_missing_or_empty() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_require_admin() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            username: "admin".to_string(),
            role: Role::Admin,
        };
        assert!(admin.require_admin().is_ok());

        let buyer = AuthUser {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
            role: Role::Buyer,
        };
        assert!(matches!(buyer.require_admin(), Err(ApiError::Forbidden)));
    }
}
