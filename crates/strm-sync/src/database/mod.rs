//! SeaORM-based catalog cache storage
//!
//! The cache lives in SQLite. Every domain run mutates it inside a single transaction so a
//! failed or cancelled run never leaves a half-applied catalog behind.

use std::error::Error;
use std::sync::Arc;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaOrmDatabase, DatabaseBackend,
    DatabaseConnection, DatabaseTransaction, Statement, TransactionTrait,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult, CacheIntegrityError};

pub mod cache;
pub mod migrations;
pub mod repositories;
pub mod session;

pub use cache::CatalogCache;
pub use session::CacheSession;

/// Database connection manager
#[derive(Clone)]
pub struct Database {
    pub connection: Arc<DatabaseConnection>,
    pub backend: DatabaseBackend,
    /// SQLite admits one writer; domain runs take turns for their transaction phase
    write_gate: Arc<Mutex<()>>,
}

impl Database {
    /// Connect to the configured SQLite database
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        if !config.url.starts_with("sqlite:") {
            return Err(AppError::configuration(format!(
                "Unsupported database URL format: {}",
                config.url
            )));
        }

        let in_memory = Self::is_in_memory(&config.url);
        let connection_url = Self::ensure_sqlite_auto_creation(&config.url)?;

        let mut connect_options = ConnectOptions::new(&connection_url);
        connect_options
            .min_connections(1)
            .connect_timeout(config.connect_timeout)
            .acquire_timeout(config.connect_timeout)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        if in_memory {
            // Each pooled connection to :memory: would see its own empty database
            connect_options.max_connections(1);
        } else {
            connect_options.max_connections(config.max_connections.max(1));
        }

        let connection = match SeaOrmDatabase::connect(connect_options).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("Database connection failed: {:?}", e);
                let mut source = e.source();
                let mut level = 0;
                while let Some(err) = source {
                    tracing::error!("  Level {}: {}", level, err);
                    source = err.source();
                    level += 1;
                }
                return Err(e.into());
            }
        };

        debug!("Database connection established successfully");

        Ok(Self {
            connection: Arc::new(connection),
            backend: DatabaseBackend::Sqlite,
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Open a fresh, migrated in-memory cache
    pub async fn in_memory() -> AppResult<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        let database = Self::new(&config).await?;
        database.migrate().await?;
        Ok(database)
    }

    fn is_in_memory(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }

    /// Ensure SQLite URL includes auto-creation mode if needed
    fn ensure_sqlite_auto_creation(url: &str) -> AppResult<String> {
        if url.contains("mode=") || Self::is_in_memory(url) {
            return Ok(url.to_string());
        }

        let file_path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .ok_or_else(|| AppError::configuration(format!("Invalid SQLite URL format: {url}")))?;
        let file_path = file_path.split('?').next().unwrap_or(file_path);

        let path = std::path::Path::new(file_path);
        if path.exists() {
            debug!("SQLite database file already exists: {}", file_path);
            return Ok(url.to_string());
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::configuration(format!(
                    "Failed to create directory for SQLite database {}: {e}",
                    parent.display()
                ))
            })?;
            info!("Created directory for SQLite database: {}", parent.display());
        }

        let auto_create_url = if url.contains('?') {
            format!("{url}&mode=rwc")
        } else {
            format!("{url}?mode=rwc")
        };
        debug!("Enabled SQLite auto-creation: {}", auto_create_url);
        Ok(auto_create_url)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> AppResult<()> {
        use migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        info!("Running catalog cache migrations");

        Migrator::up(&*self.connection, None).await.map_err(|e| {
            CacheIntegrityError::MigrationFailed {
                message: e.to_string(),
            }
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the main database connection
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }

    /// Wait for exclusive write access. Held for the transaction phase of a domain run.
    pub async fn write_access(&self) -> OwnedMutexGuard<()> {
        self.write_gate.clone().lock_owned().await
    }

    /// Start the transaction a domain run applies its changes in
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        Ok(self.connection.begin().await?)
    }

    /// Reclaim space left behind by purges
    pub async fn vacuum(&self) -> AppResult<()> {
        self.connection
            .execute(Statement::from_string(self.backend, "VACUUM"))
            .await?;
        info!("Vacuumed catalog cache");
        Ok(())
    }
}
