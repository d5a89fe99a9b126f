//! Repositories for persisted state

pub mod account;

pub use account::{BalanceStore, MemoryBalanceStore, PgBalanceStore};

/// Embedded schema migrations for the accounts table
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
