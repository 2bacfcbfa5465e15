//! Error types for protocols-io-mcp.
//!
//! # Security Note
//!
//! Error messages are carefully crafted to NEVER include the access token.
//! The bearer token only ever travels in a request header, and none of the
//! variants below carry header values.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Failures inside the resource bridge.
///
/// These never leave the bridge as errors: [`crate::protocols_io::ResourceBridge::access`]
/// folds them into an error record so that every tool still returns a value.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Base URL and path did not form a valid absolute URL.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Connection, DNS, TLS or other transport-level failure.
    #[error("failed to reach the protocols.io API: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("protocols.io API returned HTTP {status}{detail}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body excerpt, prefixed with ": " when present.
        detail: String,
    },

    /// The response body was not valid JSON.
    #[error("response body is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors raised by tool handlers before any request is made.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments did not match the tool's input schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    /// A single argument had an unacceptable value.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// No tool is registered under this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid setting".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid setting"));
    }

    #[test]
    fn status_error_folds_detail() {
        let error = BridgeError::Status {
            status: StatusCode::NOT_FOUND,
            detail: ": protocol does not exist".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "protocols.io API returned HTTP 404 Not Found: protocol does not exist"
        );
    }

    #[test]
    fn timeout_error_mentions_duration() {
        assert_eq!(
            BridgeError::Timeout(30).to_string(),
            "request timed out after 30 seconds"
        );
    }

    #[test]
    fn invalid_argument_display() {
        let error = ToolError::InvalidArgument {
            name: "count",
            reason: "must not exceed 1000".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid argument 'count': must not exceed 1000"
        );
    }
}
