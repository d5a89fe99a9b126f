//! Web service models

pub mod account;
pub mod identity;

// Re-export for convenience
pub use account::{Account, DEFAULT_BALANCE, PREDICTION_COST};
pub use identity::Identity;
