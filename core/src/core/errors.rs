//! Domain error types for the trading engine.
//!
//! Each subsystem boundary (adapter, strategy, config, tick source) gets its
//! own `thiserror` enum; callers compose these upward into `anyhow::Result`
//! at the runner boundary. None of these are ever `.unwrap()`'d outside of
//! tests.

use thiserror::Error;

/// Errors raised by a broker adapter (simulated or live).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("cash rejected: order would overdraw past the allowance")]
    CashRejected,

    #[error("unknown order id: {0}")]
    UnknownOrder(String),

    #[error("broker http error: {status} {body}")]
    BrokerHttp { status: u16, body: String },

    #[error("broker request failed: {0}")]
    BrokerException(#[from] anyhow::Error),

    #[error("signing failure: {0}")]
    Signing(#[from] SigningError),
}

/// Errors raised while signing or authenticating live broker requests.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("could not read private key at {path}: {source}")]
    KeyUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed private key: {0}")]
    MalformedKey(String),

    #[error("PSS signing failed: {0}")]
    SignFailed(String),
}

/// Errors raised while loading runner configuration or a portfolio snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed snapshot at {path}: {source}")]
    MalformedSnapshot {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CLI combination: {0}")]
    InvalidArgs(String),
}

/// Errors raised by the tick source while reading CSV logs or a live feed.
#[derive(Debug, Error)]
pub enum TickSourceError {
    #[error("unparseable timestamp {raw:?} in {file}")]
    BadTimestamp { raw: String, file: String },

    #[error("malformed row in {file}: {reason}")]
    MalformedRow { file: String, reason: String },

    #[error("io error reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_display() {
        let err = AdapterError::UnknownOrder("abc-123".into());
        assert!(format!("{err}").contains("abc-123"));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::MissingField("balance");
        assert_eq!(format!("{err}"), "missing required field: balance");
    }
}
