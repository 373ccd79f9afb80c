use serde::{Deserialize, Deserializer, Serialize};

pub mod validation;

pub use validation::{bin_prefix, is_valid_bin, BIN_PREFIX_LEN};

/// Card metadata for one issuing range, keyed by its BIN prefix.
///
/// Field names on the wire follow the provider's hyphenated casing, which is
/// also the casing of records already persisted by earlier deployments.
/// Every field is optional on input; the provider omits fields it has no data
/// for and occasionally sends `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CardRecord {
    #[serde(rename = "bin-number", alias = "bin-prefix", deserialize_with = "null_as_default")]
    pub bin_prefix: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country_code3: String,
    #[serde(deserialize_with = "null_as_default")]
    pub currency_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub card_brand: String,
    #[serde(deserialize_with = "null_as_default")]
    pub card_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub card_category: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_commercial: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_prepaid: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub issuer: String,
    #[serde(deserialize_with = "null_as_default")]
    pub issuer_website: String,
    #[serde(deserialize_with = "null_as_default")]
    pub issuer_phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub valid: bool,
}

impl CardRecord {
    /// Fill in an empty `bin_prefix` from the queried BIN.
    ///
    /// A prefix the provider did return is left untouched.
    pub fn backfill_bin_prefix(&mut self, queried_bin: &str) {
        if self.bin_prefix.trim().is_empty() {
            self.bin_prefix = bin_prefix(queried_bin).to_string();
        }
    }

    /// Whether this record belongs to the issuing range of `prefix`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.bin_prefix.starts_with(prefix)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
