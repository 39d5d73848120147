//! BookMarket API server entrypoint

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bookmarket_api::{routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; real deployments set the environment directly
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = bookmarket_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to database")?;

    bookmarket_shared::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    tracing::info!(address = %bind_address, "BookMarket API listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
