//! Database initialization, migration runner, and data-access errors.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup uses this module to create the shared SQLx pool and enforce schema
//! migrations before accepting API traffic. Profile lookups and quiz-section
//! CRUD report failures through [`DataAccessError`].

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// Failure reading or writing the hosted tables.
#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    #[error("profile not found for identity {0}")]
    ProfileNotFound(Uuid),
    #[error("profile has unknown role {0:?}")]
    InvalidRole(String),
    #[error("invalid quiz section: {0}")]
    InvalidQuizSection(String),
    #[error("record not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Initialize the `PostgreSQL` connection pool and run migrations.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}
