//! Credential store queries
//!
//! All reads and writes against the `users` and `admin_usb_keys` tables go
//! through this module. Raw sqlx errors are translated into `ApiError` at
//! the handler boundary via `From<sqlx::Error>`; the one exception is the
//! username uniqueness violation, which is mapped to `UsernameTaken` here
//! because only this module knows which constraint fired.

use sqlx::PgPool;
use uuid::Uuid;

use bookmarket_shared::{Role, User, UsbKeyRecord, UserStatus};

use crate::error::ApiError;

/// Look up a user by username; `Ok(None)` when absent
pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role, status, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// Look up a user by id; `Ok(None)` when absent
pub async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role, status, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Insert a new user. Duplicate usernames surface as `UsernameTaken`.
pub async fn insert_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, ApiError> {
    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id, username, email, password_hash, role, status, created_at
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(err) if is_unique_violation(&err) => Err(ApiError::UsernameTaken),
        Err(err) => Err(err.into()),
    }
}

/// Record a successful password verification
pub async fn update_last_login(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// List all users, newest first
pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role, status, created_at
        FROM users
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Set a user's account status. Returns false when no row matched.
pub async fn update_user_status(
    pool: &PgPool,
    user_id: Uuid,
    status: UserStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a user account. Returns false when no row matched.
pub async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Fetch the USB key record provisioned for an administrator
pub async fn get_usb_key(
    pool: &PgPool,
    admin_id: Uuid,
) -> Result<Option<UsbKeyRecord>, sqlx::Error> {
    sqlx::query_as::<_, UsbKeyRecord>(
        r#"
        SELECT admin_id, pub_key_x, pub_key_y, pin_hash, created_at, updated_at
        FROM admin_usb_keys
        WHERE admin_id = $1
        "#,
    )
    .bind(admin_id)
    .fetch_optional(pool)
    .await
}

/// Create or replace an administrator's USB key record
pub async fn upsert_usb_key(
    pool: &PgPool,
    admin_id: Uuid,
    pub_key_x: &str,
    pub_key_y: &str,
    pin_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO admin_usb_keys (admin_id, pub_key_x, pub_key_y, pin_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (admin_id) DO UPDATE SET
            pub_key_x = EXCLUDED.pub_key_x,
            pub_key_y = EXCLUDED.pub_key_y,
            pin_hash = EXCLUDED.pin_hash,
            updated_at = NOW()
        "#,
    )
    .bind(admin_id)
    .bind(pub_key_x)
    .bind(pub_key_y)
    .bind(pin_hash)
    .execute(pool)
    .await?;
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
