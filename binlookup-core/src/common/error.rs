use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream provider returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    #[error("Rate limiter error: {message}")]
    RateLimiter { message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl LookupError {
    /// Short, stable label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "http")]
            LookupError::Http(e) if e.is_timeout() => "timeout",
            #[cfg(feature = "http")]
            LookupError::Http(_) => "transport",
            LookupError::Json(_) => "decode",
            LookupError::Config(_) => "config",
            LookupError::UpstreamStatus { .. } => "status",
            LookupError::Upstream { .. } => "upstream",
            LookupError::RateLimiter { .. } => "rate_limiter",
            LookupError::Database { .. } => "database",
        }
    }
}

pub type Result<T> = std::result::Result<T, LookupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_labels() {
        let err = LookupError::UpstreamStatus { status: 503 };
        assert_eq!(err.kind(), "status");
        assert_eq!(err.to_string(), "Upstream provider returned status 503");

        let err: LookupError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "decode");
    }
}
