//! Balance store: per-user credit balances keyed by email

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::models::{Account, DEFAULT_BALANCE};

/// Storage for account balances
///
/// `try_deduct` must be atomic per call: two concurrent deductions against
/// the same account can never both observe the same pre-deduction balance.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Find the account for `email`, creating it with the default balance
    /// if it does not exist yet
    async fn get_or_create(&self, email: &str) -> Result<Account>;

    /// Deduct `amount` if the balance covers it
    ///
    /// Returns `false` without mutating anything when the balance is too low
    /// or no account exists for `email`.
    async fn try_deduct(&self, email: &str, amount: u32) -> Result<bool>;

    /// Check that the backing storage is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// PostgreSQL balance store
#[derive(Clone)]
pub struct PgBalanceStore {
    pool: PgPool,
}

impl PgBalanceStore {
    /// Create a new balance store over a connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an account by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, balance, created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn get_or_create(&self, email: &str) -> Result<Account> {
        // The unique constraint on email settles concurrent first visits:
        // the losing insert becomes a no-op and both callers read one row.
        let inserted = sqlx::query(
            r#"
            INSERT INTO accounts (id, email, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(DEFAULT_BALANCE)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!("Created account for {}", email);
        }

        self.find_by_email(email)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account for {} vanished after insert", email))
    }

    async fn try_deduct(&self, email: &str, amount: u32) -> Result<bool> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET balance = balance - $2, updated_at = NOW()
            WHERE email = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(email)
        .bind(i64::from(amount))
        .fetch_optional(&self.pool)
        .await?;

        match remaining {
            Some(balance) => {
                info!("Deducted {} credits from {}, {} left", amount, email, balance);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(common::database::health_check(&self.pool).await?)
    }
}

/// In-process balance store
///
/// The whole map sits behind one mutex, so every operation is serialized.
#[derive(Debug, Clone, Default)]
pub struct MemoryBalanceStore {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl MemoryBalanceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an account with an explicit balance
    pub async fn seed(&self, email: &str, balance: i64) -> Account {
        let mut account = Account::new(email);
        account.balance = balance;

        let mut accounts = self.accounts.lock().await;
        accounts.insert(email.to_string(), account.clone());
        account
    }

    /// Current balance for `email`, if the account exists
    pub async fn balance(&self, email: &str) -> Option<i64> {
        let accounts = self.accounts.lock().await;
        accounts.get(email).map(|account| account.balance)
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn get_or_create(&self, email: &str) -> Result<Account> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.entry(email.to_string()).or_insert_with(|| {
            info!("Created account for {}", email);
            Account::new(email)
        });
        Ok(account.clone())
    }

    async fn try_deduct(&self, email: &str, amount: u32) -> Result<bool> {
        let amount = i64::from(amount);
        let mut accounts = self.accounts.lock().await;

        match accounts.get_mut(email) {
            Some(account) if account.balance >= amount => {
                account.balance -= amount;
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
