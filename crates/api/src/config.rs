//! Application configuration

use std::env;

use bookmarket_shared::defaults::{DEFAULT_USB_PIN, DEFAULT_USB_PUBKEY_X, DEFAULT_USB_PUBKEY_Y};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub usb_challenge_expiry_minutes: i64,

    // Fallback credential set for admins without a provisioned USB key.
    // Must match the client-side defaults exactly.
    pub usb_default_pin: String,
    pub usb_default_pubkey_x: String,
    pub usb_default_pubkey_y: String,

    // Feature flags
    pub enable_signup: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                // Reject secrets too short to resist brute force
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            usb_challenge_expiry_minutes: env::var("USB_CHALLENGE_EXPIRY_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            usb_default_pin: {
                let pin = env::var("USB_DEFAULT_PIN").unwrap_or_else(|_| DEFAULT_USB_PIN.to_string());
                if pin.is_empty() {
                    return Err(ConfigError::InvalidDefaultKey(
                        "USB_DEFAULT_PIN must not be empty",
                    ));
                }
                pin
            },
            usb_default_pubkey_x: validated_coordinate(
                "USB_DEFAULT_PUBKEY_X",
                env::var("USB_DEFAULT_PUBKEY_X")
                    .unwrap_or_else(|_| DEFAULT_USB_PUBKEY_X.to_string()),
            )?,
            usb_default_pubkey_y: validated_coordinate(
                "USB_DEFAULT_PUBKEY_Y",
                env::var("USB_DEFAULT_PUBKEY_Y")
                    .unwrap_or_else(|_| DEFAULT_USB_PUBKEY_Y.to_string()),
            )?,

            // Feature flags
            enable_signup: env::var("ENABLE_SIGNUP")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        })
    }
}

/// Validate a public key coordinate override: 64 hex characters (32 bytes).
fn validated_coordinate(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.len() != 64 {
        return Err(ConfigError::InvalidDefaultKey(name));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidDefaultKey(name));
    }
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid USB default credential value: {0}")]
    InvalidDefaultKey(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (they modify shared env vars)
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn setup_minimal_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
    }

    fn cleanup_config() {
        env::remove_var("DATABASE_URL");
        env::remove_var("JWT_SECRET");
        env::remove_var("USB_DEFAULT_PIN");
        env::remove_var("USB_DEFAULT_PUBKEY_X");
        env::remove_var("USB_DEFAULT_PUBKEY_Y");
    }

    #[test]
    fn test_defaults_and_validation() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();

        // === Documented fallback credential set loads when env is silent ===
        setup_minimal_config();
        let config = Config::from_env().unwrap();
        assert_eq!(config.usb_default_pin, DEFAULT_USB_PIN);
        assert_eq!(config.usb_default_pubkey_x, DEFAULT_USB_PUBKEY_X);
        assert_eq!(config.usb_default_pubkey_y, DEFAULT_USB_PUBKEY_Y);
        assert_eq!(config.jwt_expiry_hours, 24);
        assert_eq!(config.usb_challenge_expiry_minutes, 5);

        // === Weak JWT secret rejected ===
        env::set_var("JWT_SECRET", "short");
        let result = Config::from_env();
        assert!(
            matches!(result, Err(ConfigError::WeakSecret(_))),
            "short JWT secret should be rejected, got: {result:?}"
        );
        setup_minimal_config();

        // === Non-hex coordinate override rejected ===
        env::set_var("USB_DEFAULT_PUBKEY_X", "not-hex");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidDefaultKey(_))));
        env::remove_var("USB_DEFAULT_PUBKEY_X");

        // === Wrong-length coordinate override rejected ===
        env::set_var("USB_DEFAULT_PUBKEY_Y", "abcd1234");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidDefaultKey(_))));
        env::remove_var("USB_DEFAULT_PUBKEY_Y");

        // === Empty default PIN rejected ===
        env::set_var("USB_DEFAULT_PIN", "");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidDefaultKey(_))));

        cleanup_config();
    }
}
