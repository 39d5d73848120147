//! Typed USB key device operations

use serde_json::Value;

use crate::client::{BridgeClient, BridgeError};
use crate::protocol::{
    Command, FN_FIND_PORT, FN_GEN_PRI_KEY, FN_GEN_PUB_KEY_X, FN_GEN_PUB_KEY_Y, FN_GET_PUB_KEY_X,
    FN_GET_PUB_KEY_Y, FN_SET_PIN, FN_SIGN, FN_START_GEN_KEY_PAIR,
};

/// Key pair material produced by the device.
///
/// Generation is a multi-step exchange; a failure partway through leaves the
/// later fields empty instead of discarding what already arrived, so always
/// check [`KeyPairInfo::is_complete`] before using the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPairInfo {
    pub private_key: String,
    pub public_key_x: String,
    pub public_key_y: String,
}

impl KeyPairInfo {
    pub fn is_complete(&self) -> bool {
        !self.private_key.is_empty()
            && !self.public_key_x.is_empty()
            && !self.public_key_y.is_empty()
    }
}

/// High-level operations against the USB key, one bridge channel each
pub struct UsbKeyDevice {
    client: BridgeClient,
    key_path: Value,
}

impl UsbKeyDevice {
    pub fn new(client: BridgeClient) -> Self {
        Self {
            client,
            // The vendor service addresses the first attached key as path 0
            key_path: Value::from(0),
        }
    }

    /// Address a specific attached key instead of the first one
    pub fn with_key_path(mut self, key_path: impl Into<Value>) -> Self {
        self.key_path = key_path.into();
        self
    }

    /// Probe for an attached device
    pub async fn find_device(&self) -> Result<(), BridgeError> {
        self.client
            .invoke(Command::new(FN_FIND_PORT).with("start", 0))
            .await?;
        Ok(())
    }

    /// Read the device public key, X coordinate (hex)
    pub async fn public_key_x(&self) -> Result<String, BridgeError> {
        let value = self
            .client
            .invoke(Command::new(FN_GET_PUB_KEY_X).with("Path", self.key_path.clone()))
            .await?;
        string_result(value)
    }

    /// Read the device public key, Y coordinate (hex)
    pub async fn public_key_y(&self) -> Result<String, BridgeError> {
        let value = self
            .client
            .invoke(Command::new(FN_GET_PUB_KEY_Y).with("Path", self.key_path.clone()))
            .await?;
        string_result(value)
    }

    /// Sign a challenge under the given PIN and return the signature (hex).
    /// A wrong PIN surfaces as a device error code, not a connection error.
    pub async fn sign_challenge(&self, challenge: &str, pin: &str) -> Result<String, BridgeError> {
        let value = self
            .client
            .invoke(
                Command::new(FN_SIGN)
                    .with("SignMsg", challenge)
                    .with("Pin", pin)
                    .with("Path", self.key_path.clone()),
            )
            .await?;
        string_result(value)
    }

    /// Change the device PIN
    pub async fn set_pin(&self, old_pin: &str, new_pin: &str) -> Result<(), BridgeError> {
        self.client
            .invoke(
                Command::new(FN_SET_PIN)
                    .with("OldPin", old_pin)
                    .with("NewPin", new_pin)
                    .with("Path", self.key_path.clone()),
            )
            .await?;
        Ok(())
    }

    /// Generate a fresh key pair on the device.
    ///
    /// Five-step exchange: trigger generation, then fetch the private key
    /// and both public key coordinates. Transport failures are errors; a
    /// device error partway through yields the partially-populated info.
    pub async fn generate_key_pair(&self) -> Result<KeyPairInfo, BridgeError> {
        let outcome = self
            .client
            .invoke_sequence(vec![
                Command::new(FN_START_GEN_KEY_PAIR).with("Path", self.key_path.clone()),
                Command::new(FN_GEN_PRI_KEY),
                Command::new(FN_GEN_PUB_KEY_X),
                Command::new(FN_GEN_PUB_KEY_Y),
            ])
            .await?;

        if !outcome.is_ok() {
            tracing::warn!(
                error_code = outcome.error_code,
                steps_completed = outcome.results.len(),
                "key pair generation stopped early"
            );
        }

        // results[0] is the trigger acknowledgement; material starts at 1
        let mut info = KeyPairInfo::default();
        let mut material = outcome.results.into_iter().skip(1);
        if let Some(value) = material.next() {
            info.private_key = string_or_empty(value);
        }
        if let Some(value) = material.next() {
            info.public_key_x = string_or_empty(value);
        }
        if let Some(value) = material.next() {
            info.public_key_y = string_or_empty(value);
        }
        Ok(info)
    }
}

fn string_result(value: Value) -> Result<String, BridgeError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(BridgeError::Protocol(format!(
            "expected a string result, got: {other}"
        ))),
    }
}

fn string_or_empty(value: Value) -> String {
    match value {
        Value::String(s) => s,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_completeness() {
        let mut info = KeyPairInfo::default();
        assert!(!info.is_complete());

        info.private_key = "PRI".to_string();
        info.public_key_x = "X".to_string();
        assert!(!info.is_complete());

        info.public_key_y = "Y".to_string();
        assert!(info.is_complete());
    }

    #[test]
    fn test_string_result_rejects_non_strings() {
        assert_eq!(string_result(Value::String("ok".into())).unwrap(), "ok");
        assert!(string_result(Value::Null).is_err());
        assert!(string_result(Value::from(7)).is_err());
    }
}
