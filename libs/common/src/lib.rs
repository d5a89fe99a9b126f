//! Shared infrastructure for the waste classifier services
//!
//! - [`database`]: PostgreSQL pool configuration, migrations and health checks
//! - [`cache`]: the [`KeyValueStore`] used for server-side sessions, backed by
//!   Redis or kept in process
//! - [`error`]: setup failures of both backends
//!
//! ```rust,no_run
//! use common::{
//!     cache::{RedisConfig, RedisPool},
//!     database::{DatabaseConfig, health_check, init_pool},
//!     KeyValueStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
//!     let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
//!
//!     println!("postgres: {}", health_check(&pool).await?);
//!     println!("redis: {}", redis.health_check().await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;

pub use cache::{KeyValueStore, MemoryCache};
pub use error::{CacheError, DatabaseError};
