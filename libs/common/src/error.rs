//! Infrastructure error types
//!
//! Setup failures of the two backing services, PostgreSQL and Redis. Runtime
//! failures of individual commands travel as `anyhow::Error` through the
//! store traits.

use redis::RedisError;
use sqlx::Error as SqlxError;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// PostgreSQL setup failures
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    #[error("Database migration error: {0}")]
    Migration(#[source] MigrateError),

    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Redis setup failures
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid Redis URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: RedisError,
    },

    #[error("Redis connection error: {0}")]
    Connection(#[source] RedisError),
}

pub type CacheResult<T> = Result<T, CacheError>;
