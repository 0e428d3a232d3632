use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod sweeper;

use api::repositories::NotificationRepository;
use common::database::{DatabaseConfig, init_pool};

use crate::{config::NotifierConfig, sweeper::Sweeper};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting notifier service");

    let config = NotifierConfig::from_env()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    if !common::database::health_check(&pool).await? {
        anyhow::bail!("Failed to connect to database");
    }

    let sweeper = Sweeper::new(NotificationRepository::new(pool), config.retention_days);
    let mut scheduler = sweeper.start(&config).await?;

    // Keep the service running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down notifier service");
    scheduler.shutdown().await?;

    Ok(())
}
