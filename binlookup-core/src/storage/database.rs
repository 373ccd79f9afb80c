use super::traits::Storage;
use crate::common::error::{LookupError, Result};
use crate::database::{DatabaseConfig, DatabaseManager};
use crate::domain::{bin_prefix, CardRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

// Greatest prefix first; the autoincrement id breaks ties toward the newest row.
const FIND_BY_PREFIX_SQL: &str = "SELECT data FROM card_records
     WHERE substr(bin_prefix, 1, ?2) = ?1
     ORDER BY bin_prefix DESC, id DESC
     LIMIT 1";

const INSERT_SQL: &str = "INSERT INTO card_records (bin_prefix, data, created_at)
     VALUES (?1, ?2, datetime('now'))";

/// Database storage implementation using Turso/libSQL
pub struct DatabaseStorage {
    db: Arc<DatabaseManager>,
}

impl DatabaseStorage {
    /// Connect and apply migrations.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db_manager = DatabaseManager::new(config).await?;
        db_manager.run_migrations().await?;

        Ok(Self {
            db: Arc::new(db_manager),
        })
    }

    fn record_to_row_data(record: &CardRecord) -> Result<String> {
        serde_json::to_string(record).map_err(|e| LookupError::Database {
            message: format!("Failed to serialize card record: {e}"),
        })
    }

    fn row_data_to_record(data: &str) -> Result<CardRecord> {
        serde_json::from_str(data).map_err(|e| LookupError::Database {
            message: format!("Failed to deserialize card record: {e}"),
        })
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn get_card_record_by_bin(&self, bin: &str) -> Result<Option<CardRecord>> {
        let prefix = bin_prefix(bin);
        let conn = self.db.get_connection()?;

        let mut rows = conn
            .query(
                FIND_BY_PREFIX_SQL,
                libsql::params![prefix, prefix.chars().count() as i64],
            )
            .await
            .map_err(|e| LookupError::Database {
                message: format!("Failed to query card records: {e}"),
            })?;

        let row = rows.next().await.map_err(|e| LookupError::Database {
            message: format!("Failed to read row: {e}"),
        })?;

        match row {
            Some(row) => {
                let data: String = row.get(0).map_err(|e| LookupError::Database {
                    message: format!("Failed to get data: {e}"),
                })?;
                let record = Self::row_data_to_record(&data)?;
                debug!("Found card record {} for prefix {}", record.bin_prefix, prefix);
                Ok(Some(record))
            }
            None => {
                debug!("No card record for prefix {}", prefix);
                Ok(None)
            }
        }
    }

    async fn create_card_record(&self, record: &CardRecord) -> Result<()> {
        let data = Self::record_to_row_data(record)?;
        let conn = self.db.get_connection()?;

        conn.execute(INSERT_SQL, libsql::params![record.bin_prefix.as_str(), data])
            .await
            .map_err(|e| LookupError::Database {
                message: format!("Failed to insert card record: {e}"),
            })?;

        debug!("Created card record for prefix {}", record.bin_prefix);
        Ok(())
    }
}
