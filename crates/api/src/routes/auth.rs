//! Authentication routes
//!
//! Stage 1 of the login protocol lives here: password verification. Buyers
//! and sellers receive a session token immediately; administrators receive a
//! short-lived challenge token and must complete USB key verification
//! (`routes::usb_key`) before a session is issued.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use bookmarket_shared::{Role, UserSummary};

use crate::{
    auth::{hash_password, verify_password, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
    store,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: UserSummary,
}

// Missing fields deserialize as empty strings; an empty username simply
// fails the lookup, keeping the response identical to a wrong password.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Full authentication response (non-admin, or admin after USB key proof)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

/// Response when login requires USB key verification.
///
/// `pub_key_x`/`pub_key_y` are present only when the administrator has a
/// provisioned key record; otherwise `use_default_key` tells the client to
/// fall back to the well-known default credential set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbKeyRequiredResponse {
    pub requires_usb_key: bool,
    /// Short-lived token proving password verification succeeded
    pub temp_token: String,
    pub user: UserSummary,
    pub has_key_info: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_key_x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_key_y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_default_key: Option<bool>,
}

/// Unified login response: either a full session or a USB key challenge
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Success(AuthResponse),
    UsbKeyRequired(UsbKeyRequiredResponse),
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserSummary,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new buyer or seller account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    if !state.config.enable_signup {
        return Err(ApiError::BadRequest(
            "Registration is currently disabled".to_string(),
        ));
    }

    // Administrators are provisioned by other administrators, never through
    // self-service registration.
    if !req.role.self_registrable() {
        return Err(ApiError::Validation(
            "Role is invalid; only buyer or seller registration is allowed".to_string(),
        ));
    }

    let username = req.username.trim();
    if username.is_empty() || username.len() > 64 {
        return Err(ApiError::Validation(
            "Username must be between 1 and 64 characters".to_string(),
        ));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("Password must not be empty".to_string()));
    }
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    let password_hash = hash_password(&req.password).map_err(|_| ApiError::Internal)?;

    let user = store::insert_user(&state.pool, username, email, &password_hash, req.role).await?;

    tracing::info!(user_id = %user.id, role = %user.role.as_str(), "register: account created");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registration successful".to_string(),
            user: user.summary(),
        }),
    ))
}

/// Login with username and password.
///
/// Whether the username was unknown or the password wrong is never revealed;
/// both fail with the same response.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = store::find_user_by_username(&state.pool, req.username.trim())
        .await?
        .ok_or_else(|| {
            tracing::warn!(username = %req.username, "login: user not found");
            ApiError::InvalidCredentials
        })?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!(error = ?e, "login: password verification failed with error");
        ApiError::Internal
    })?;

    if !valid {
        tracing::warn!(user_id = %user.id, "login: invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if user.status == bookmarket_shared::UserStatus::Suspended {
        tracing::warn!(user_id = %user.id, "login: suspended account");
        return Err(ApiError::AccountSuspended);
    }

    store::update_last_login(&state.pool, user.id).await?;

    // Buyers and sellers are done after the password check
    if user.role != Role::Admin {
        let token = state
            .jwt_manager
            .generate_session_token(user.id, &user.username, user.role)
            .map_err(|e| {
                tracing::error!(error = ?e, "login: token generation failed");
                ApiError::Internal
            })?;

        tracing::info!(user_id = %user.id, "login: session issued");
        return Ok(Json(LoginResponse::Success(AuthResponse {
            token,
            user: user.summary(),
        })));
    }

    // Administrators must additionally prove possession of their USB key.
    // The challenge token carries everything stage 2 needs; no attempt state
    // is held server-side between the stages.
    let temp_token = state
        .jwt_manager
        .generate_challenge_token(user.id, &user.username, user.role)
        .map_err(|e| {
            tracing::error!(error = ?e, "login: challenge token generation failed");
            ApiError::Internal
        })?;

    let response = match store::get_usb_key(&state.pool, user.id).await? {
        Some(record) => {
            tracing::info!(user_id = %user.id, "login: USB key proof required (provisioned key)");
            UsbKeyRequiredResponse {
                requires_usb_key: true,
                temp_token,
                user: user.summary(),
                has_key_info: true,
                pub_key_x: Some(record.pub_key_x),
                pub_key_y: Some(record.pub_key_y),
                use_default_key: None,
            }
        }
        None => {
            tracing::info!(user_id = %user.id, "login: USB key proof required (default key)");
            UsbKeyRequiredResponse {
                requires_usb_key: true,
                temp_token,
                user: user.summary(),
                has_key_info: false,
                pub_key_x: None,
                pub_key_y: None,
                use_default_key: Some(true),
            }
        }
    };

    Ok(Json(LoginResponse::UsbKeyRequired(response)))
}

/// Return the fresh account summary for the presented session token.
/// Clients use this to re-validate a stored token on startup.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<MeResponse>> {
    let user = store::find_user_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(MeResponse {
        user: user.summary(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn summary(role: Role) -> UserSummary {
        UserSummary {
            id: Uuid::nil(),
            username: "admin".to_string(),
            role,
        }
    }

    #[test]
    fn test_success_response_shape() {
        let value = serde_json::to_value(LoginResponse::Success(AuthResponse {
            token: "jwt".to_string(),
            user: summary(Role::Buyer),
        }))
        .unwrap();

        assert_eq!(value["token"], "jwt");
        assert_eq!(value["user"]["role"], "buyer");
        // A direct login never mentions the USB key flow
        assert!(value.get("requiresUsbKey").is_none());
    }

    #[test]
    fn test_challenge_response_shape_with_key_info() {
        let value = serde_json::to_value(LoginResponse::UsbKeyRequired(UsbKeyRequiredResponse {
            requires_usb_key: true,
            temp_token: "temp".to_string(),
            user: summary(Role::Admin),
            has_key_info: true,
            pub_key_x: Some("AA".to_string()),
            pub_key_y: Some("BB".to_string()),
            use_default_key: None,
        }))
        .unwrap();

        assert_eq!(value["requiresUsbKey"], true);
        assert_eq!(value["tempToken"], "temp");
        assert_eq!(value["hasKeyInfo"], true);
        assert_eq!(value["pubKeyX"], "AA");
        assert_eq!(value["pubKeyY"], "BB");
        assert!(value.get("useDefaultKey").is_none());
    }

    #[test]
    fn test_challenge_response_shape_default_key() {
        let value = serde_json::to_value(LoginResponse::UsbKeyRequired(UsbKeyRequiredResponse {
            requires_usb_key: true,
            temp_token: "temp".to_string(),
            user: summary(Role::Admin),
            has_key_info: false,
            pub_key_x: None,
            pub_key_y: None,
            use_default_key: Some(true),
        }))
        .unwrap();

        assert_eq!(value["hasKeyInfo"], false);
        assert_eq!(value["useDefaultKey"], true);
        assert!(value.get("pubKeyX").is_none());
        assert!(value.get("pubKeyY").is_none());
    }
}
