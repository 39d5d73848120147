//! JWT token generation and validation
//!
//! Two credential kinds share one signing key:
//! - `Session`: the long-lived bearer token accepted by protected routes.
//! - `UsbChallenge`: the short-lived intermediate token proving password
//!   verification succeeded for an administrator, consumed by the USB key
//!   verification step. It is never accepted in place of a session.

use bookmarket_shared::Role;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// JWT claims structure for BookMarket-issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Username at issuance time
    pub username: String,
    /// User role
    pub role: Role,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// Token kind (session or usb_challenge)
    pub kind: TokenKind,
    /// JWT ID (jti), unique per issued token
    pub jti: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Session,
    UsbChallenge,
}

/// JWT manager for token operations
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_expiry_hours: i64,
    challenge_expiry_minutes: i64,
}

impl JwtManager {
    /// Create a new JWT manager
    pub fn new(secret: &str, session_expiry_hours: i64, challenge_expiry_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_expiry_hours,
            challenge_expiry_minutes,
        }
    }

    /// Generate a session token for a fully authenticated user
    pub fn generate_session_token(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
    ) -> Result<String, JwtError> {
        self.generate(
            user_id,
            username,
            role,
            TokenKind::Session,
            Duration::hours(self.session_expiry_hours),
        )
    }

    /// Generate the short-lived intermediate token returned after password
    /// verification for an administrator, pending USB key proof.
    pub fn generate_challenge_token(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
    ) -> Result<String, JwtError> {
        self.generate(
            user_id,
            username,
            role,
            TokenKind::UsbChallenge,
            Duration::minutes(self.challenge_expiry_minutes),
        )
    }

    fn generate(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + ttl;

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            kind,
            jti: Uuid::new_v4().to_string(),
        };

        // Explicit algorithm prevents algorithm confusion attacks
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    /// Validate and decode a token of any kind
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60; // 60 second clock skew tolerance

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => JwtError::Invalid,
                _ => JwtError::Validation(e.to_string()),
            })
    }

    /// Validate a session token specifically
    pub fn validate_session_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.kind != TokenKind::Session {
            return Err(JwtError::WrongTokenKind);
        }
        Ok(claims)
    }

    /// Validate a USB challenge token specifically
    pub fn validate_challenge_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.kind != TokenKind::UsbChallenge {
            return Err(JwtError::WrongTokenKind);
        }
        Ok(claims)
    }

    /// Get session token expiry in seconds
    pub fn session_expiry_seconds(&self) -> i64 {
        self.session_expiry_hours * 3600
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Wrong token kind")]
    WrongTokenKind,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
    #[error("Token validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret-key-at-least-32-chars!", 24, 5)
    }

    #[test]
    fn test_session_token_round_trip() {
        let jwt = manager();
        let user_id = Uuid::new_v4();

        let token = jwt
            .generate_session_token(user_id, "admin", Role::Admin)
            .expect("Failed to generate token");

        let claims = jwt
            .validate_session_token(&token)
            .expect("Invalid session token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.kind, TokenKind::Session);
        assert!(!claims.jti.is_empty());

        // 24 hour lifetime
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_challenge_token_round_trip() {
        let jwt = manager();
        let user_id = Uuid::new_v4();

        let token = jwt
            .generate_challenge_token(user_id, "admin", Role::Admin)
            .expect("Failed to generate token");

        let claims = jwt
            .validate_challenge_token(&token)
            .expect("Invalid challenge token");
        assert_eq!(claims.kind, TokenKind::UsbChallenge);

        // 5 minute lifetime
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn test_token_kinds_are_mutually_rejected() {
        let jwt = manager();
        let user_id = Uuid::new_v4();

        let session = jwt
            .generate_session_token(user_id, "alice", Role::Buyer)
            .expect("Failed to generate token");
        let challenge = jwt
            .generate_challenge_token(user_id, "admin", Role::Admin)
            .expect("Failed to generate token");

        // A challenge token must never be accepted as a session
        assert!(matches!(
            jwt.validate_session_token(&challenge),
            Err(JwtError::WrongTokenKind)
        ));
        // A session token must never be accepted as device proof input
        assert!(matches!(
            jwt.validate_challenge_token(&session),
            Err(JwtError::WrongTokenKind)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Negative TTLs are not reachable through the public API, so mint an
        // already-expired token directly.
        let jwt = manager();
        let token = jwt
            .generate(
                Uuid::new_v4(),
                "admin",
                Role::Admin,
                TokenKind::UsbChallenge,
                Duration::seconds(-300),
            )
            .expect("Failed to generate token");

        assert!(matches!(
            jwt.validate_challenge_token(&token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let jwt = manager();
        let other = JwtManager::new("another-secret-key-of-enough-length!!", 24, 5);

        let token = other
            .generate_session_token(Uuid::new_v4(), "admin", Role::Admin)
            .expect("Failed to generate token");

        assert!(jwt.validate_session_token(&token).is_err());
    }
}
