//! Live checks of the two backing services
//!
//! Run against local PostgreSQL and Redis instances with
//! `cargo test -p common -- --ignored`

use std::time::Duration;

use common::{
    KeyValueStore,
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn postgres_pool_answers_queries() -> Result<(), Box<dyn std::error::Error>> {
    let pool = init_pool(&DatabaseConfig::from_env()?).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 AS result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Redis instance"]
async fn redis_session_entries_expire() -> Result<(), Box<dyn std::error::Error>> {
    let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
    assert!(redis.health_check().await?, "Redis health check failed");

    let key = "session:integration-test";
    let value = r#"{"state":"anonymous"}"#;

    redis.set(key, value, Some(1)).await?;
    assert_eq!(redis.get(key).await?, Some(value.to_string()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(redis.get(key).await?, None);

    redis.set(key, value, None).await?;
    redis.delete(key).await?;
    assert_eq!(redis.get(key).await?, None);
    Ok(())
}
