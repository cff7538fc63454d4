pub mod entities;

use anyhow::Context;
use sea_orm::{Database, DatabaseConnection};

use crate::config::DatabaseConfig;

pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let db = Database::connect(config.connection_url()?)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database {}", config.redacted_url()?);
    Ok(db)
}
