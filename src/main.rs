use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sea_orm_migration::MigratorTrait;

use gridmail::{db, migration, AppConfig, FolderDirectory, SeaOrmObjectStore};

/// List the mail folders of one account and their message counts.
#[derive(Debug, Parser)]
#[command(name = "gridmail", version, about)]
struct Cli {
    /// TOML configuration file. Without it, GRIDMAIL_* environment
    /// variables are read (a .env file is honored).
    config: Option<PathBuf>,

    /// Create the named folder before listing; may be repeated.
    #[arg(long = "create", value_name = "FOLDER")]
    create: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };
    let namespace = config.namespace()?;
    tracing::info!("gridmail starting...");
    tracing::info!(
        "Account: {} (namespace {})",
        namespace.account(),
        namespace.key()
    );

    let db = db::connect(&config.database).await?;
    migration::Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations complete");

    let store = Arc::new(SeaOrmObjectStore::new(db));
    let directory = FolderDirectory::from_config(&config, store)?;

    if !cli.create.is_empty() {
        for name in &cli.create {
            directory
                .create_folder(name)
                .await
                .with_context(|| format!("Failed to create folder '{}'", name))?;
        }
        directory.invalidate().await;
    }

    let folders = directory.list_folders().await?;
    if folders.is_empty() {
        tracing::info!("No folders for {}", config.account.name);
    }
    for folder in folders {
        folder
            .load()
            .await
            .with_context(|| format!("Failed to load folder '{}'", folder.name()))?;
        let uids = folder.list_uids().await?;
        println!("{}\t{}", folder.name(), uids.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_config_and_folders() {
        let cli = Cli::try_parse_from([
            "gridmail",
            "mail.toml",
            "--create",
            "INBOX",
            "--create",
            "Archive.2024",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("mail.toml")));
        assert_eq!(cli.create, vec!["INBOX", "Archive.2024"]);
    }

    #[test]
    fn test_config_is_optional() {
        let cli = Cli::try_parse_from(["gridmail"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.create.is_empty());
        assert!(Cli::try_parse_from(["gridmail", "--create"]).is_err());
    }
}
