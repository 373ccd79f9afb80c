use crate::common::error::Result;
use crate::domain::CardRecord;
use async_trait::async_trait;

/// Storage trait for persisting card records keyed by BIN prefix.
///
/// Records are insert-only. Several records may share or overlap a prefix;
/// lookups resolve that by returning the greatest `bin_prefix`, and among
/// equal prefixes the most recently inserted record.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Find the best record for `bin`, which is truncated to six digits first.
    ///
    /// `Ok(None)` means no record matches. Errors are reserved for an
    /// unreachable or failing store.
    async fn get_card_record_by_bin(&self, bin: &str) -> Result<Option<CardRecord>>;

    /// Insert a record. No uniqueness constraint is enforced.
    async fn create_card_record(&self, record: &CardRecord) -> Result<()>;
}
