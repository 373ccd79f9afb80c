use crate::app::{LookupSettings, Quota};
use binlookup_core::{DatabaseConfig, LookupError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Gateway configuration.
///
/// Built from defaults, then an optional TOML file, then environment
/// variables. Every field has a default so a file only needs the keys it
/// changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub limiter: LimiterConfig,
    pub upstream: UpstreamConfig,
    pub lookup: LookupConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Libsql,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "libsql" => Ok(Self::Libsql),
            "memory" => Ok(Self::Memory),
            other => Err(LookupError::Config(format!("Unknown store backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Remote Turso/libSQL URL; a local file is used when absent.
    pub url: Option<String>,
    pub auth_token: Option<String>,
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Libsql,
            url: None,
            auth_token: None,
            path: "binlookup.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterBackend {
    #[default]
    Redis,
    Local,
}

impl FromStr for LimiterBackend {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "local" => Ok(Self::Local),
            other => Err(LookupError::Config(format!("Unknown limiter backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub backend: LimiterBackend,
    pub url: String,
    /// Shared key every gateway instance draws from.
    pub key: String,
    pub rate_per_second: u32,
    pub pool_size: usize,
    pub timeout_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            backend: LimiterBackend::Redis,
            url: "redis://127.0.0.1:6379".to_string(),
            key: "bin-lookup-gateway".to_string(),
            rate_per_second: 100,
            pool_size: 16,
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub user_id: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://neutrinoapi.net/bin-lookup".to_string(),
            user_id: String::new(),
            api_key: String::new(),
            timeout_secs: 5,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Answer 500 on a store read failure instead of falling through to the provider.
    pub strict_store_reads: bool,
    /// Coalesce concurrent misses for the same prefix onto one provider call.
    pub single_flight: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_name: "binlookup-gateway.log".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, the optional TOML file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    LookupError::Config(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LookupError::Config(format!("Failed to parse config: {e}")))
    }

    /// Override settings from environment variables, read through `lookup_var`.
    pub fn apply_env<F>(&mut self, lookup_var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup_var(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("BINLOOKUP_PORT") {
            self.server.port = parse_var("BINLOOKUP_PORT", &port)?;
        }

        if let Some(backend) = var("BINLOOKUP_STORE_BACKEND") {
            self.store.backend = backend.parse()?;
        }
        if let Some(url) = var("LIBSQL_URL") {
            self.store.url = Some(url);
        }
        if let Some(token) = var("LIBSQL_AUTH_TOKEN") {
            self.store.auth_token = Some(token);
        }
        if let Some(path) = var("BINLOOKUP_DB_PATH") {
            self.store.path = path;
        }

        if let Some(backend) = var("BINLOOKUP_LIMITER_BACKEND") {
            self.limiter.backend = backend.parse()?;
        }
        // A full URL wins over a bare host.
        if let Some(url) = var("REDIS_URL") {
            self.limiter.url = url;
        } else if let Some(host) = var("REDIS_HOST") {
            self.limiter.url = format!("redis://{}:6379", host.trim());
        }
        if let Some(rate) = var("BINLOOKUP_RATE_LIMIT") {
            self.limiter.rate_per_second = parse_var("BINLOOKUP_RATE_LIMIT", &rate)?;
        }

        if let Some(url) = var("NEUTRINOAPI_URL") {
            self.upstream.url = url;
        }
        if let Some(user_id) = var("NEUTRINOAPI_USER_ID") {
            self.upstream.user_id = user_id;
        }
        if let Some(api_key) = var("NEUTRINOAPI_API_KEY") {
            self.upstream.api_key = api_key;
        }
        if let Some(secs) = var("BINLOOKUP_UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse_var("BINLOOKUP_UPSTREAM_TIMEOUT_SECS", &secs)?;
        }

        if let Some(strict) = var("BINLOOKUP_STRICT_STORE_READS") {
            self.lookup.strict_store_reads = parse_var("BINLOOKUP_STRICT_STORE_READS", &strict)?;
        }
        if let Some(single_flight) = var("BINLOOKUP_SINGLE_FLIGHT") {
            self.lookup.single_flight = parse_var("BINLOOKUP_SINGLE_FLIGHT", &single_flight)?;
        }

        Ok(())
    }

    /// Reject settings the gateway cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.limiter.rate_per_second == 0 {
            return Err(LookupError::Config(
                "limiter.rate_per_second must be greater than zero".to_string(),
            ));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(LookupError::Config(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.upstream.user_id.is_empty() || self.upstream.api_key.is_empty() {
            return Err(LookupError::Config(
                "NEUTRINOAPI_USER_ID and NEUTRINOAPI_API_KEY must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn quota(&self) -> Quota {
        Quota::per_second(self.limiter.rate_per_second)
    }

    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            rate_limit_key: self.limiter.key.clone(),
            quota: self.quota(),
            strict_store_reads: self.lookup.strict_store_reads,
            single_flight: self.lookup.single_flight,
        }
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.store.url.clone(),
            auth_token: self.store.auth_token.clone(),
            path: self.store.path.clone(),
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LookupError::Config(format!("Invalid value for {name}: {e}")))
}
