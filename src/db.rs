// src/db.rs
use crate::error::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

fn max_connections() -> AppResult<u32> {
    match std::env::var("DB_MAX_CONNECTIONS") {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::Config(format!("DB_MAX_CONNECTIONS must be a positive integer, got '{raw}'"))),
        Err(std::env::VarError::NotPresent) => Ok(DEFAULT_MAX_CONNECTIONS),
        Err(e) => Err(e.into()),
    }
}

/// Opens the pool from `DATABASE_URL` and applies pending migrations.
pub async fn create_db_pool() -> AppResult<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL")?;
    let max_connections = max_connections()?;

    tracing::info!("connecting to database {} (max {} connections)", database_url, max_connections);

    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    tracing::info!("running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("migrations complete");

    Ok(pool)
}
