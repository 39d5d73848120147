//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::{auth::JwtManager, config::Config};

/// State shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt_manager: Arc<JwtManager>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt_manager = JwtManager::new(
            &config.jwt_secret,
            config.jwt_expiry_hours,
            config.usb_challenge_expiry_minutes,
        );
        Self {
            pool,
            config: Arc::new(config),
            jwt_manager: Arc::new(jwt_manager),
        }
    }
}
