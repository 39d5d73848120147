//! Common types used across BookMarket

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Account role.
///
/// `Buyer` and `Seller` are self-service registrations; `Admin` accounts can
/// only be created by an existing administrator and must complete USB key
/// verification to obtain a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Role {
    /// Roles allowed for self-service registration
    pub fn self_registrable(&self) -> bool {
        matches!(self, Self::Buyer | Self::Seller)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account status, mutated only by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A user account as stored in the database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Public view of the account, safe to return to clients
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// The public subset of a user account included in auth responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// USB key record provisioned for an administrator (at most one per admin).
///
/// The public key coordinates are stored hex-encoded exactly as the device
/// reports them; the PIN is stored as an Argon2id hash, never in the clear.
#[derive(Debug, Clone, FromRow)]
pub struct UsbKeyRecord {
    pub admin_id: Uuid,
    pub pub_key_x: String,
    pub pub_key_y: String,
    pub pin_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Buyer).unwrap(), "\"buyer\"");
        assert_eq!(serde_json::to_string(&Role::Seller).unwrap(), "\"seller\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("buyer".parse::<Role>().unwrap(), Role::Buyer);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_self_registrable_roles() {
        assert!(Role::Buyer.self_registrable());
        assert!(Role::Seller.self_registrable());
        assert!(!Role::Admin.self_registrable());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [UserStatus::Active, UserStatus::Suspended] {
            let parsed: UserStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_user_summary_hides_password_hash() {
        let value = serde_json::to_value(UserSummary {
            id: Uuid::nil(),
            username: "alice".to_string(),
            role: Role::Buyer,
        })
        .unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["username"], "alice");
        assert_eq!(value["role"], "buyer");
    }
}
