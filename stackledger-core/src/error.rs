use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failures surfaced by the collectors.
///
/// Configuration problems are raised before any I/O happens; transport and
/// API failures abort the run as-is (no retry, no partial output).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("No '{service}' endpoint in service catalog for interface '{interface}'")]
    Catalog { service: String, interface: String },

    #[error("Invalid timestamp '{value}': expected {format}")]
    InvalidTimestamp { value: String, format: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message() {
        let err = LedgerError::Api { status: 401, message: "token expired".into() };
        assert_eq!(err.to_string(), "API error (status 401): token expired");
    }

    #[test]
    fn test_missing_env_message() {
        let err = LedgerError::MissingEnv("OS_AUTH_URL");
        assert!(err.to_string().contains("OS_AUTH_URL"));
    }
}
