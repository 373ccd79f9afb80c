use crate::app::ports::CardDataProviderPort;
use crate::config::UpstreamConfig;
use async_trait::async_trait;
use binlookup_core::{CardRecord, LookupError, Result};
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// reqwest client for the card data provider.
///
/// Sends `GET <url>?bin-number=<bin>` authenticated with the static
/// `user-id` / `api-key` headers. Never retries.
pub struct ProviderClient {
    client: reqwest::Client,
    url: String,
    user_id: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Self::with_timeout(
            &config.url,
            &config.user_id,
            &config.api_key,
            config.timeout(),
        )
    }

    pub fn with_timeout(url: &str, user_id: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            user_id: user_id.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

/// Interpret a successful response body.
///
/// An empty body or `null` means the provider has nothing for the BIN. The
/// provider reports some failures in-band as `api-error` fields.
pub(crate) fn parse_provider_body(body: &[u8]) -> Result<Option<CardRecord>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(body)?;
    if value.is_null() {
        return Ok(None);
    }

    if let Some(code) = value.get("api-error").filter(|c| !c.is_null()) {
        let message = value
            .get("api-error-msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(LookupError::Upstream {
            message: format!("api-error {code}: {message}"),
        });
    }

    Ok(Some(serde_json::from_value(value)?))
}

#[async_trait]
impl CardDataProviderPort for ProviderClient {
    async fn fetch(&self, bin: &str) -> Result<Option<CardRecord>> {
        info!("Requesting data for BIN/IIN number {}", bin);

        let resp = self
            .client
            .get(&self.url)
            .query(&[("bin-number", bin)])
            .header("user-id", self.user_id.as_str())
            .header("api-key", self.api_key.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("Provider returned non-success status {}", status);
            return Err(LookupError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await?;
        debug!("Provider response: {} bytes", body.len());
        parse_provider_body(&body)
    }
}
