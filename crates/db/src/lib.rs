//! PostgreSQL persistence layer for the labelq work-distribution engine.
//!
//! `models` holds `FromRow` entity structs and DTOs; `repositories` holds
//! zero-sized structs with async CRUD methods taking `&PgPool`. All SQL
//! that mutates shared dispatch state (locks, annotations, `is_done`)
//! lives here so every caller goes through the same transactions.

pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Cheap liveness probe used by hosting services and tests.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
