//! Administrator moderation routes
//!
//! All handlers require an admin session. Two hard rules carried through
//! from the user lifecycle: administrators cannot act on their own account
//! through these endpoints, and administrators cannot delete other
//! administrators.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use bookmarket_shared::{Role, UserStatus, UserSummary};

use crate::{
    auth::{hash_password, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
    store,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAdminResponse {
    pub success: bool,
    pub message: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListItem {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create another administrator account
pub async fn create_admin(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateAdminRequest>,
) -> ApiResult<(StatusCode, Json<CreateAdminResponse>)> {
    auth.require_admin()?;

    let username = req.username.trim();
    if username.is_empty() || username.len() > 64 {
        return Err(ApiError::Validation(
            "Username must be between 1 and 64 characters".to_string(),
        ));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("Password must not be empty".to_string()));
    }

    let password_hash = hash_password(&req.password).map_err(|_| ApiError::Internal)?;

    let user = store::insert_user(
        &state.pool,
        username,
        req.email.trim(),
        &password_hash,
        Role::Admin,
    )
    .await?;

    tracing::info!(
        admin_id = %auth.user_id,
        new_admin_id = %user.id,
        "create_admin: administrator account created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateAdminResponse {
            success: true,
            message: "Administrator account created".to_string(),
            user: user.summary(),
        }),
    ))
}

/// List all user accounts, newest first
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<UserListItem>>> {
    auth.require_admin()?;

    let users = store::list_users(&state.pool).await?;

    Ok(Json(
        users
            .into_iter()
            .map(|user| UserListItem {
                id: user.id,
                username: user.username,
                email: user.email,
                role: user.role,
                status: user.status,
                created_at: user.created_at,
            })
            .collect(),
    ))
}

/// Suspend or reactivate a user account
pub async fn update_user_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<MessageResponse>> {
    auth.require_admin()?;

    if user_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Cannot modify your own status".to_string(),
        ));
    }

    let updated = store::update_user_status(&state.pool, user_id, req.status).await?;
    if !updated {
        return Err(ApiError::NotFound);
    }

    tracing::info!(
        admin_id = %auth.user_id,
        target = %user_id,
        status = %req.status.as_str(),
        "update_user_status: status changed"
    );

    Ok(Json(MessageResponse {
        success: true,
        message: "User status updated".to_string(),
    }))
}

/// Delete a user account. Self-deletion and deletion of other
/// administrators are forbidden.
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    auth.require_admin()?;

    if user_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    let target = store::find_user_by_id(&state.pool, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if target.role == Role::Admin {
        return Err(ApiError::Forbidden);
    }

    let deleted = store::delete_user(&state.pool, user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    tracing::info!(
        admin_id = %auth.user_id,
        target = %user_id,
        "delete_user: account removed"
    );

    Ok(Json(MessageResponse {
        success: true,
        message: "User deleted".to_string(),
    }))
}
