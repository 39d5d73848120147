//! Error types for BookMarket

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookMarketError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Device bridge error: {0}")]
    Bridge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
