//! Account model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Credits granted to an account when it is first created
pub const DEFAULT_BALANCE: i64 = 1000;

/// Credits charged for one classification request
pub const PREDICTION_COST: u32 = 3;

/// Account entity, one row per email
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh account holding the default balance
    pub fn new(email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            balance: DEFAULT_BALANCE,
            created_at: now,
            updated_at: now,
        }
    }
}
