use super::traits::Storage;
use crate::common::error::{LookupError, Result};
use crate::domain::{bin_prefix, CardRecord};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// In-memory storage implementation for development/testing
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    // Insertion order is kept so equal prefixes resolve to the latest insert.
    records: Arc<RwLock<Vec<CardRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, duplicates included.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> LookupError {
    LookupError::Database {
        message: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_card_record_by_bin(&self, bin: &str) -> Result<Option<CardRecord>> {
        let prefix = bin_prefix(bin);
        let records = self.records.read().map_err(poisoned)?;

        // max_by yields the last of several equal elements, i.e. the newest.
        let found = records
            .iter()
            .filter(|r| r.matches_prefix(prefix))
            .max_by(|a, b| a.bin_prefix.cmp(&b.bin_prefix))
            .cloned();

        debug!(prefix, hit = found.is_some(), "In-memory card record lookup");
        Ok(found)
    }

    async fn create_card_record(&self, record: &CardRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.push(record.clone());

        debug!("Created card record for prefix {}", record.bin_prefix);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(prefix: &str, issuer: &str) -> CardRecord {
        CardRecord {
            bin_prefix: prefix.to_string(),
            issuer: issuer.to_string(),
            valid: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_prefix_match_on_truncated_query() {
        let storage = InMemoryStorage::new();
        storage.create_card_record(&record("411111", "Chase")).await.unwrap();

        let found = storage.get_card_record_by_bin("411111234567").await.unwrap();
        assert_eq!(found.unwrap().issuer, "Chase");

        assert!(storage.get_card_record_by_bin("422222").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_greatest_prefix_wins() {
        let storage = InMemoryStorage::new();
        storage.create_card_record(&record("41111199", "Specific")).await.unwrap();
        storage.create_card_record(&record("411111", "Generic")).await.unwrap();
        storage.create_card_record(&record("4111112", "Middle")).await.unwrap();

        let found = storage.get_card_record_by_bin("411111").await.unwrap().unwrap();
        assert_eq!(found.issuer, "Specific");
    }

    #[tokio::test]
    async fn test_latest_insert_wins_on_equal_prefix() {
        let storage = InMemoryStorage::new();
        storage.create_card_record(&record("411111", "First")).await.unwrap();
        storage.create_card_record(&record("411111", "Second")).await.unwrap();

        assert_eq!(storage.len(), 2);
        let found = storage.get_card_record_by_bin("411111").await.unwrap().unwrap();
        assert_eq!(found.issuer, "Second");
    }
}
