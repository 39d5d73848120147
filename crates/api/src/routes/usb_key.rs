//! USB key verification and provisioning routes
//!
//! Stage 2 of the administrator login protocol. The client presents the
//! challenge token from stage 1 together with the PIN it collected and the
//! public key coordinates and signature obtained from the device bridge.
//! The server re-validates the token, re-fetches the account, and checks the
//! PIN and public key against the provisioned record (or the configured
//! default credential set when no record exists).
//!
//! The exchanged signature is required to be present and hex encoded, but is
//! not cryptographically verified against the public key; the authoritative
//! checks are the PIN hash and the exact public key match.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use bookmarket_shared::{Role, UsbKeyRecord, UserSummary};

use crate::{
    auth::{hash_pin, verify_pin, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
    store,
};

// =============================================================================
// Request/Response Types
// =============================================================================

// Missing fields deserialize as empty strings so that an absent input and a
// blank input fail the same way: 400 with MissingParameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyUsbKeyRequest {
    pub temp_token: String,
    pub challenge: String,
    pub signature: String,
    pub pub_key_x: String,
    pub pub_key_y: String,
    pub pin_code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyUsbKeyResponse {
    pub success: bool,
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUsbKeyRequest {
    pub pub_key_x: String,
    pub pub_key_y: String,
    pub pin_code: String,
}

#[derive(Debug, Serialize)]
pub struct SetUsbKeyResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbKeyStatusResponse {
    pub has_key_info: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
}

// =============================================================================
// Device proof checks
// =============================================================================

/// What the submitted PIN and public key must match
pub enum KeyExpectation<'a> {
    /// The administrator has a provisioned key record
    Provisioned(&'a UsbKeyRecord),
    /// No record; fall back to the configured default credential set
    Default {
        pin: &'a str,
        pub_key_x: &'a str,
        pub_key_y: &'a str,
    },
}

/// Constant-time string equality. Comparison is case-sensitive: coordinates
/// must match exactly as stored.
fn constant_time_eq(submitted: &str, expected: &str) -> bool {
    submitted.len() == expected.len()
        && bool::from(submitted.as_bytes().ct_eq(expected.as_bytes()))
}

/// Check the submitted PIN and public key coordinates against the
/// expectation. PIN is checked first; the public key only after the PIN
/// passed, mirroring the order the device itself enforces.
pub fn verify_device_proof(
    expectation: &KeyExpectation<'_>,
    pin_code: &str,
    pub_key_x: &str,
    pub_key_y: &str,
) -> Result<(), ApiError> {
    match expectation {
        KeyExpectation::Provisioned(record) => {
            let pin_ok =
                verify_pin(pin_code, &record.pin_hash).map_err(|_| ApiError::Internal)?;
            if !pin_ok {
                return Err(ApiError::InvalidPin("Incorrect PIN".to_string()));
            }
            if !constant_time_eq(pub_key_x, &record.pub_key_x)
                || !constant_time_eq(pub_key_y, &record.pub_key_y)
            {
                return Err(ApiError::PublicKeyMismatch);
            }
        }
        KeyExpectation::Default {
            pin,
            pub_key_x: default_x,
            pub_key_y: default_y,
        } => {
            if !constant_time_eq(pin_code.trim(), pin) {
                return Err(ApiError::InvalidPin(
                    "Incorrect PIN (use the default PIN)".to_string(),
                ));
            }
            if !constant_time_eq(pub_key_x, default_x) || !constant_time_eq(pub_key_y, default_y)
            {
                return Err(ApiError::PublicKeyMismatch);
            }
        }
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Complete an administrator login with USB key proof.
///
/// Re-verification with the same still-valid challenge token is idempotent:
/// the same inputs re-derive the same outcome. The token's short lifetime is
/// what bounds its usefulness, not a single-use marker.
pub async fn verify_usb_key(
    State(state): State<AppState>,
    Json(req): Json<VerifyUsbKeyRequest>,
) -> ApiResult<Json<VerifyUsbKeyResponse>> {
    // All five proof inputs are required
    if req.temp_token.trim().is_empty()
        || req.challenge.trim().is_empty()
        || req.signature.trim().is_empty()
        || req.pub_key_x.trim().is_empty()
        || req.pub_key_y.trim().is_empty()
        || req.pin_code.trim().is_empty()
    {
        return Err(ApiError::MissingParameters);
    }

    // The signature is exchanged hex encoded; reject garbage early
    if hex::decode(req.signature.trim()).is_err() {
        return Err(ApiError::Validation(
            "Signature must be hex encoded".to_string(),
        ));
    }

    // The challenge token must be valid, unexpired, of the challenge kind,
    // and minted for an administrator.
    let claims = state
        .jwt_manager
        .validate_challenge_token(req.temp_token.trim())
        .map_err(|e| {
            tracing::warn!(error = ?e, "verify_usb_key: challenge token rejected");
            ApiError::InvalidToken
        })?;

    if claims.role != Role::Admin {
        tracing::warn!(user_id = %claims.sub, "verify_usb_key: token not minted for an admin");
        return Err(ApiError::InvalidToken);
    }

    // Re-fetch the account: it must still exist and still be an admin
    let user = store::find_user_by_id(&state.pool, claims.sub)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    if user.role != Role::Admin {
        return Err(ApiError::UserNotFound);
    }

    let record = store::get_usb_key(&state.pool, user.id).await?;
    let expectation = match &record {
        Some(record) => KeyExpectation::Provisioned(record),
        None => KeyExpectation::Default {
            pin: &state.config.usb_default_pin,
            pub_key_x: &state.config.usb_default_pubkey_x,
            pub_key_y: &state.config.usb_default_pubkey_y,
        },
    };

    verify_device_proof(
        &expectation,
        &req.pin_code,
        req.pub_key_x.trim(),
        req.pub_key_y.trim(),
    )
    .inspect_err(|_| {
        tracing::warn!(user_id = %user.id, "verify_usb_key: device proof rejected");
    })?;

    let token = state
        .jwt_manager
        .generate_session_token(user.id, &user.username, user.role)
        .map_err(|e| {
            tracing::error!(error = ?e, "verify_usb_key: token generation failed");
            ApiError::Internal
        })?;

    tracing::info!(user_id = %user.id, "verify_usb_key: admin session issued");

    Ok(Json(VerifyUsbKeyResponse {
        success: true,
        token,
        user: user.summary(),
    }))
}

/// Provision (or replace) the USB key record for the logged-in administrator
pub async fn set_usb_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SetUsbKeyRequest>,
) -> ApiResult<Json<SetUsbKeyResponse>> {
    auth.require_admin()?;

    let pub_key_x = req.pub_key_x.trim();
    let pub_key_y = req.pub_key_y.trim();
    for coordinate in [pub_key_x, pub_key_y] {
        if coordinate.is_empty()
            || coordinate.len() > 128
            || !coordinate.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(ApiError::Validation(
                "Public key coordinates must be hex encoded".to_string(),
            ));
        }
    }

    let pin = req.pin_code.trim();
    if pin.is_empty() || pin.len() > 16 {
        return Err(ApiError::Validation(
            "PIN must be between 1 and 16 characters".to_string(),
        ));
    }

    let pin_hash = hash_pin(pin).map_err(|_| ApiError::Internal)?;

    store::upsert_usb_key(&state.pool, auth.user_id, pub_key_x, pub_key_y, &pin_hash).await?;

    tracing::info!(user_id = %auth.user_id, "set_usb_key: key record provisioned");

    Ok(Json(SetUsbKeyResponse {
        success: true,
        message: "USB key information saved".to_string(),
    }))
}

/// Report whether the logged-in administrator has a provisioned key record
pub async fn usb_key_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<UsbKeyStatusResponse>> {
    auth.require_admin()?;

    let record = store::get_usb_key(&state.pool, auth.user_id).await?;

    Ok(Json(match record {
        Some(record) => UsbKeyStatusResponse {
            has_key_info: true,
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        },
        None => UsbKeyStatusResponse {
            has_key_info: false,
            created_at: None,
            updated_at: None,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const KEY_X: &str = "09F9DF311E5421A150DD7D161E4BC5C672179FAD1833FC076BB08FF356F35020";
    const KEY_Y: &str = "CCEA490CE26775A52DC6EA718CC1AA600AED05FBF35E084A6632F6072DA9AD13";

    fn provisioned_record(pin: &str) -> UsbKeyRecord {
        UsbKeyRecord {
            admin_id: Uuid::new_v4(),
            pub_key_x: KEY_X.to_string(),
            pub_key_y: KEY_Y.to_string(),
            pin_hash: hash_pin(pin).expect("Failed to hash PIN"),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_provisioned_proof_accepts_exact_match() {
        let record = provisioned_record("4321");
        let expectation = KeyExpectation::Provisioned(&record);
        assert!(verify_device_proof(&expectation, "4321", KEY_X, KEY_Y).is_ok());
    }

    #[test]
    fn test_provisioned_proof_rejects_wrong_pin() {
        let record = provisioned_record("4321");
        let expectation = KeyExpectation::Provisioned(&record);
        let err = verify_device_proof(&expectation, "0000", KEY_X, KEY_Y).unwrap_err();
        assert!(matches!(err, ApiError::InvalidPin(_)));
    }

    #[test]
    fn test_provisioned_proof_rejects_any_coordinate_mismatch() {
        let record = provisioned_record("4321");
        let expectation = KeyExpectation::Provisioned(&record);

        let mut wrong_x = KEY_X.to_string();
        wrong_x.replace_range(0..1, "F");
        let err = verify_device_proof(&expectation, "4321", &wrong_x, KEY_Y).unwrap_err();
        assert!(matches!(err, ApiError::PublicKeyMismatch));

        let mut wrong_y = KEY_Y.to_string();
        wrong_y.replace_range(63..64, "0");
        let err = verify_device_proof(&expectation, "4321", KEY_X, &wrong_y).unwrap_err();
        assert!(matches!(err, ApiError::PublicKeyMismatch));
    }

    #[test]
    fn test_coordinate_comparison_is_case_sensitive() {
        let record = provisioned_record("4321");
        let expectation = KeyExpectation::Provisioned(&record);
        let lowered = KEY_X.to_lowercase();
        let err = verify_device_proof(&expectation, "4321", &lowered, KEY_Y).unwrap_err();
        assert!(matches!(err, ApiError::PublicKeyMismatch));
    }

    #[test]
    fn test_default_proof_accepts_default_set() {
        let expectation = KeyExpectation::Default {
            pin: "123",
            pub_key_x: KEY_X,
            pub_key_y: KEY_Y,
        };
        assert!(verify_device_proof(&expectation, "123", KEY_X, KEY_Y).is_ok());
    }

    #[test]
    fn test_default_proof_rejects_wrong_pin_with_hint() {
        let expectation = KeyExpectation::Default {
            pin: "123",
            pub_key_x: KEY_X,
            pub_key_y: KEY_Y,
        };
        let err = verify_device_proof(&expectation, "000", KEY_X, KEY_Y).unwrap_err();
        match err {
            ApiError::InvalidPin(message) => {
                assert!(message.contains("default PIN"), "message was: {message}");
            }
            other => panic!("expected InvalidPin, got: {other:?}"),
        }
    }

    #[test]
    fn test_default_proof_rejects_non_default_key() {
        let expectation = KeyExpectation::Default {
            pin: "123",
            pub_key_x: KEY_X,
            pub_key_y: KEY_Y,
        };
        let err = verify_device_proof(&expectation, "123", KEY_Y, KEY_X).unwrap_err();
        assert!(matches!(err, ApiError::PublicKeyMismatch));
    }

    #[test]
    fn test_verification_is_repeatable() {
        // Stage 2 has no single-use marker; the same correct inputs verify
        // every time within the token lifetime.
        let record = provisioned_record("4321");
        let expectation = KeyExpectation::Provisioned(&record);
        for _ in 0..2 {
            assert!(verify_device_proof(&expectation, "4321", KEY_X, KEY_Y).is_ok());
        }
    }
}
