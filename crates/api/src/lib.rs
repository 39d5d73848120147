//! BookMarket API Library
//!
//! This crate contains the HTTP server components for BookMarket: the
//! credential store, the two-stage administrator authentication flow, and
//! the admin moderation surface.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
