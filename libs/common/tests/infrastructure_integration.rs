//! Integration tests for the infrastructure components
//!
//! These tests need a running PostgreSQL and Redis and are ignored by
//! default. Run them with `cargo test -- --ignored`.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_migrations_create_metadata_tables() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");
    run_migrations(&pool).await?;

    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM information_schema.tables
         WHERE table_name IN ('tables', 'columns', 'permissions', 'records')",
    )
    .fetch_one(&pool)
    .await?;

    let n: i64 = row.get("n");
    assert_eq!(n, 4, "metadata tables missing after migration");

    Ok(())
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_token_revocation_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
    assert!(redis_pool.health_check().await?, "Redis health check failed");

    let token = format!("integration.test.{}", std::process::id());
    assert!(!redis_pool.is_token_revoked(&token).await?);

    redis_pool.revoke_token(&token, 10).await?;
    assert!(redis_pool.is_token_revoked(&token).await?);

    // entries expire with the token
    redis_pool.revoke_token("integration.short.token", 1).await?;
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert!(!redis_pool.is_token_revoked("integration.short.token").await?);

    // zero remaining lifetime writes nothing
    redis_pool.revoke_token("integration.expired.token", 0).await?;
    assert!(!redis_pool.is_token_revoked("integration.expired.token").await?);

    Ok(())
}
