//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk, layering the
//! environment on top of it, and validating the result.
//!
//! # Configuration Sources
//!
//! Sources are applied in the following order (later wins):
//!
//! 1. Built-in defaults
//! 2. Configuration file:
//!    - Path specified on the command line, which must exist, or
//!    - Default location, used only if present:
//!      - **Linux/macOS:** `~/.protocols-io-mcp/config.json`
//!      - **Windows:** `%USERPROFILE%\.protocols-io-mcp\config.json`
//! 3. Environment variables [`API_URL_ENV`] and [`ACCESS_TOKEN_ENV`]
//!    (a `.env` file is loaded into the environment by `main`)
//!
//! # Example Configuration
//!
//! See `config/example-config.json` for a complete example.

mod settings;

pub use settings::{
    ApiConfig, Config, LoggingConfig, ServerConfig, TransportKind, DEFAULT_API_URL,
    DEFAULT_TIMEOUT_SECS,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "PROTOCOLS_IO_API_URL";

/// Environment variable overriding `api.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "PROTOCOLS_IO_CLIENT_ACCESS_TOKEN";

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.protocols-io-mcp/`
/// - **Windows:** `%USERPROFILE%\.protocols-io-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".protocols-io-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration using the process environment for overrides.
///
/// If `path` is `None`, the default location is tried and silently skipped
/// when no file exists there.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Required fields are missing or invalid after applying the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with(path, default_config_path(), |name| std::env::var(name).ok())
}

/// Loads the configuration with an explicit default path and environment lookup.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with<F>(
    path: Option<&Path>,
    default_path: Option<PathBuf>,
    lookup: F,
) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            Some(p.to_path_buf())
        }
        None => default_path.filter(|p| p.exists()),
    };

    let mut config = match file {
        Some(config_path) => read_config_file(&config_path)?,
        None => Config::default(),
    };

    config.apply_env(lookup);

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

fn read_config_file(config_path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn token_env(name: &str) -> Option<String> {
        (name == ACCESS_TOKEN_ENV).then(|| "env-token".to_string())
    }

    #[test]
    fn default_config_path_exists() {
        let path = default_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("config.json"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = load_config_with(Some(&missing), None, token_env).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn missing_default_file_falls_back_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            load_config_with(None, Some(dir.path().join("config.json")), token_env).unwrap();
        assert_eq!(config.api.access_token, "env-token");
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn file_values_are_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api": {{"base_url": "http://127.0.0.1:1/api", "access_token": "file-token"}}}}"#
        )
        .unwrap();

        let config = load_config_with(Some(file.path()), None, |_| None).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:1/api");
        assert_eq!(config.api.access_token, "file-token");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = load_config_with(Some(file.path()), None, token_env).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_token_fails_validation() {
        let err = load_config_with(None, None, |_| None).unwrap_err();
        assert!(err.to_string().contains(ACCESS_TOKEN_ENV));
    }
}
