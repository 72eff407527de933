pub mod billing;
pub mod db;
pub mod error;
pub mod models;

use sqlx::PgPool;

/// Application state containing shared resources.
///
/// Holds the database connection pool shared by all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,
}
