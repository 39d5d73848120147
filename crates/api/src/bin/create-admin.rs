//! Bootstrap utility: create an administrator account
//!
//! The HTTP surface only lets existing administrators create new ones, so
//! the first account has to come from outside the API. This inserts it
//! directly, hashing the password the same way the server does.
//!
//! Usage:
//!   cargo run --bin create-admin <username> <email>
//!
//! The password is read from stdin so it never shows up in the process list.
//! `DATABASE_URL` must point at the BookMarket database.

use std::env;
use std::io::{self, Write};

use bookmarket_api::auth::hash_password;
use bookmarket_shared::Role;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let (Some(username), Some(email)) = (args.next(), args.next()) else {
        eprintln!("Usage: create-admin <username> <email>");
        std::process::exit(2);
    };

    print!("Password for {username}: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();

    if password.is_empty() {
        eprintln!("Error: password cannot be empty");
        std::process::exit(1);
    }

    let database_url = env::var("DATABASE_URL")?;
    let pool = bookmarket_shared::create_pool(&database_url, 1).await?;
    bookmarket_shared::run_migrations(&pool).await?;

    let existing: Option<(uuid::Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = $1")
            .bind(&username)
            .fetch_optional(&pool)
            .await?;
    if existing.is_some() {
        eprintln!("Username \"{username}\" already exists; nothing to do.");
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;

    let (id,): (uuid::Uuid,) = sqlx::query_as(
        "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .bind(Role::Admin)
    .fetch_one(&pool)
    .await?;

    println!("Administrator account created: {username} ({id})");
    println!("Provision a USB key record after first login; until then the");
    println!("default credential set applies.");

    Ok(())
}
