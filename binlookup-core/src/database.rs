use crate::common::error::{LookupError, Result};
use libsql::{Builder, Connection, Database};
use tracing::info;

/// Where the card record database lives.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// Remote Turso/libSQL URL. Takes precedence over `path` when set.
    pub url: Option<String>,
    pub auth_token: Option<String>,
    /// Local SQLite file used when no remote URL is configured.
    pub path: String,
}

pub struct DatabaseManager {
    db: Database,
}

impl DatabaseManager {
    /// Open the configured database, remote when a URL is present.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db = match &config.url {
            Some(url) => {
                let auth_token = config.auth_token.clone().ok_or_else(|| LookupError::Database {
                    message: "LIBSQL_AUTH_TOKEN must be set together with LIBSQL_URL".to_string(),
                })?;
                info!("Connecting to Turso database at {}", url);
                Builder::new_remote(url.clone(), auth_token).build().await
            }
            None => {
                info!("Opening local database at {}", config.path);
                Builder::new_local(&config.path).build().await
            }
        }
        .map_err(|e| LookupError::Database {
            message: format!("Failed to connect to database: {e}"),
        })?;

        Ok(Self { db })
    }

    /// Get a connection to the database
    pub fn get_connection(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| LookupError::Database {
            message: format!("Failed to get database connection: {e}"),
        })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection()?;

        let migration_sql_001 = include_str!("../migrations/001_create_card_records.sql");
        conn.execute_batch(migration_sql_001)
            .await
            .map_err(|e| LookupError::Database {
                message: format!("Failed to run card record migration: {e}"),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}
