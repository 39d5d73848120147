//! Two-stage login orchestration
//!
//! Drives the full administrator login against the BookMarket API:
//! password stage first, then, when the server demands it, the USB key
//! proof produced through the bridge. Session issuance always happens
//! server-side; there is no local path that synthesizes a session from a
//! device-only check.

use rand::RngCore;
use serde::Deserialize;

use bookmarket_shared::defaults::{DEFAULT_USB_PIN, DEFAULT_USB_PUBKEY_X, DEFAULT_USB_PUBKEY_Y};
use bookmarket_shared::UserSummary;

use crate::client::BridgeError;
use crate::device::UsbKeyDevice;

/// A fully established session
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// Stage 1 rejected the credentials
    #[error("{0}")]
    InvalidCredentials(String),

    /// Stage 2 rejected the device proof
    #[error("{0}")]
    VerificationFailed(String),

    /// The server demanded device proof against a provisioned key but no
    /// PIN was supplied
    #[error("A PIN is required to complete this login")]
    PinRequired,

    /// The bridge could not produce the proof. `BridgeError::Unavailable`
    /// means the service is not running (fatal, user-visible); device error
    /// codes are recoverable per-attempt failures.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Login request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered outside the documented contract
    #[error("Unexpected login response: {0}")]
    Unexpected(String),
}

// Mirror of the server's login-stage responses. One struct of options keeps
// the untagged success/challenge/error shapes in a single decode path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginReply {
    token: Option<String>,
    user: Option<UserSummary>,
    #[serde(default)]
    requires_usb_key: bool,
    temp_token: Option<String>,
    #[serde(default)]
    has_key_info: bool,
    pub_key_x: Option<String>,
    pub_key_y: Option<String>,
    #[serde(default)]
    use_default_key: bool,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyReply {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    user: Option<UserSummary>,
    message: Option<String>,
}

/// Client driving both stages of the login protocol
pub struct LoginClient {
    http: reqwest::Client,
    api_base: String,
    device: UsbKeyDevice,
}

impl LoginClient {
    pub fn new(api_base: impl Into<String>, device: UsbKeyDevice) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            device,
        }
    }

    /// Log in. `pin` is only consulted when the server demands USB key
    /// proof; pass `None` for buyer and seller accounts.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        pin: Option<&str>,
    ) -> Result<Session, LoginError> {
        let response = self
            .http
            .post(format!("{}/api/login", self.api_base))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await?;

        let status = response.status();
        let reply: LoginReply = response.json().await?;

        if !status.is_success() {
            return Err(LoginError::InvalidCredentials(
                reply.message.unwrap_or_else(|| format!("login failed ({status})")),
            ));
        }

        // Non-admin accounts are done after the password stage
        if let (Some(token), Some(user)) = (reply.token, reply.user.clone()) {
            return Ok(Session { token, user });
        }

        if !reply.requires_usb_key {
            return Err(LoginError::Unexpected(
                "neither a session token nor a USB key challenge".to_string(),
            ));
        }
        let temp_token = reply
            .temp_token
            .ok_or_else(|| LoginError::Unexpected("challenge without tempToken".to_string()))?;

        // Resolve the credential set for the proof
        let (pub_key_x, pub_key_y) = if reply.has_key_info {
            match (reply.pub_key_x, reply.pub_key_y) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    return Err(LoginError::Unexpected(
                        "hasKeyInfo without key coordinates".to_string(),
                    ))
                }
            }
        } else if reply.use_default_key {
            (
                DEFAULT_USB_PUBKEY_X.to_string(),
                DEFAULT_USB_PUBKEY_Y.to_string(),
            )
        } else {
            // Fall back to whatever key is actually plugged in
            (
                self.device.public_key_x().await?,
                self.device.public_key_y().await?,
            )
        };

        let pin = match pin {
            Some(pin) => pin.to_string(),
            None if reply.use_default_key => DEFAULT_USB_PIN.to_string(),
            None => return Err(LoginError::PinRequired),
        };

        // The device signs a fresh random challenge under the entered PIN
        let challenge = generate_challenge();
        let signature = self.device.sign_challenge(&challenge, &pin).await?;

        self.verify_usb_key(&temp_token, &challenge, &signature, &pub_key_x, &pub_key_y, &pin)
            .await
    }

    async fn verify_usb_key(
        &self,
        temp_token: &str,
        challenge: &str,
        signature: &str,
        pub_key_x: &str,
        pub_key_y: &str,
        pin: &str,
    ) -> Result<Session, LoginError> {
        let response = self
            .http
            .post(format!("{}/api/verify-usb-key", self.api_base))
            .json(&serde_json::json!({
                "tempToken": temp_token,
                "challenge": challenge,
                "signature": signature,
                "pubKeyX": pub_key_x,
                "pubKeyY": pub_key_y,
                "pinCode": pin,
            }))
            .send()
            .await?;

        let status = response.status();
        let reply: VerifyReply = response.json().await?;

        if !status.is_success() || !reply.success {
            return Err(LoginError::VerificationFailed(
                reply
                    .message
                    .unwrap_or_else(|| format!("USB key verification failed ({status})")),
            ));
        }

        match (reply.token, reply.user) {
            (Some(token), Some(user)) => Ok(Session { token, user }),
            _ => Err(LoginError::Unexpected(
                "verification succeeded without a session".to_string(),
            )),
        }
    }
}

/// A fresh random challenge for the device to sign (32 bytes, hex)
fn generate_challenge() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
