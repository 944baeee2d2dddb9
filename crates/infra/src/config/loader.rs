//! Configuration loader
//!
//! Loads the client configuration and credentials from environment variables
//! or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment, if one exists
//! 2. Attempts to load from environment variables
//! 3. If `REDKITE_USER_AGENT` is missing, falls back to loading from file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `REDKITE_USER_AGENT`: User agent sent with every request (required)
//! - `REDKITE_CLIENT_ID` / `REDKITE_CLIENT_SECRET`: App credentials
//! - `REDKITE_USERNAME` / `REDKITE_PASSWORD`: Script-app login
//! - `REDKITE_REFRESH_TOKEN`: Refresh token from a permanent grant
//! - `REDKITE_ACCESS_TOKEN`: Pre-obtained access token
//! - `REDKITE_ENDPOINT_DOMAIN`: Domain to talk to (default `reddit.com`)
//! - `REDKITE_REQUEST_DELAY_MS`: Minimum spacing between requests
//! - `REDKITE_REQUEST_TIMEOUT_MS`: Per-request timeout
//! - `REDKITE_CONTINUE_AFTER_RATELIMIT_ERROR`: Wait out rate limits (true/false)
//! - `REDKITE_RETRY_ERROR_CODES`: Comma-separated retryable statuses
//! - `REDKITE_MAX_RETRY_ATTEMPTS`: Attempt ceiling for retryable statuses
//! - `REDKITE_WARNINGS` / `REDKITE_DEBUG`: Log toggles (true/false)
//!
//! ## File Format
//! A `[client]` table holding [`ClientConfig`] options and a
//! `[credentials]` table holding [`Credentials`]. Unknown keys are rejected.
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./redkite.json` or `./redkite.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../redkite.json` or `../redkite.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use redkite_domain::{ClientConfig, Credentials, RedkiteError, Result};
use serde::Deserialize;

use crate::errors::InfraError;

/// Everything needed to build an [`ApiClient`](crate::api::ApiClient)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadedConfig {
    pub client: ClientConfig,
    pub credentials: Credentials,
}

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `RedkiteError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded options fail validation
pub fn load() -> Result<LoadedConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `REDKITE_USER_AGENT` is required; every other option keeps its
/// default when unset.
///
/// # Errors
/// Returns `RedkiteError::Config` if the user agent is missing or a value
/// cannot be parsed.
pub fn load_from_env() -> Result<LoadedConfig> {
    let defaults = ClientConfig::default();

    let credentials = Credentials {
        user_agent: env_var("REDKITE_USER_AGENT")?,
        client_id: env_opt("REDKITE_CLIENT_ID"),
        client_secret: env_opt("REDKITE_CLIENT_SECRET"),
        username: env_opt("REDKITE_USERNAME"),
        password: env_opt("REDKITE_PASSWORD"),
        refresh_token: env_opt("REDKITE_REFRESH_TOKEN"),
        access_token: env_opt("REDKITE_ACCESS_TOKEN"),
    };

    let retry_error_codes = match env_opt("REDKITE_RETRY_ERROR_CODES") {
        Some(raw) => parse_status_list(&raw)?,
        None => defaults.retry_error_codes.clone(),
    };

    let client = ClientConfig {
        endpoint_domain: env_opt("REDKITE_ENDPOINT_DOMAIN").unwrap_or(defaults.endpoint_domain),
        request_delay_ms: env_parse("REDKITE_REQUEST_DELAY_MS", defaults.request_delay_ms)?,
        request_timeout_ms: env_parse("REDKITE_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
        continue_after_ratelimit_error: env_bool(
            "REDKITE_CONTINUE_AFTER_RATELIMIT_ERROR",
            defaults.continue_after_ratelimit_error,
        ),
        retry_error_codes,
        max_retry_attempts: env_parse("REDKITE_MAX_RETRY_ATTEMPTS", defaults.max_retry_attempts)?,
        warnings: env_bool("REDKITE_WARNINGS", defaults.warnings),
        debug: env_bool("REDKITE_DEBUG", defaults.debug),
    };
    client.validate()?;

    Ok(LoadedConfig { client, credentials })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches several locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `RedkiteError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or contains unknown keys
pub fn load_from_file(path: Option<PathBuf>) -> Result<LoadedConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RedkiteError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            RedkiteError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;
    let config = parse_config(&contents, &config_path)?;
    config.client.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<LoadedConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents).map_err(InfraError::from)?),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RedkiteError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RedkiteError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_path() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["redkite.json", "redkite.toml", "config.json", "config.toml"];

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
        candidates.push(cwd.join("../redkite.json"));
        candidates.push(cwd.join("../redkite.toml"));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn parse_status_list(raw: &str) -> Result<Vec<u16>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u16>().map_err(|e| {
                RedkiteError::Config(format!("Invalid status code '{part}' in retry list: {e}"))
            })
        })
        .collect()
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| RedkiteError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| RedkiteError::Config(format!("Invalid value for {key}: {e}"))),
        None => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 15] = [
        "REDKITE_USER_AGENT",
        "REDKITE_CLIENT_ID",
        "REDKITE_CLIENT_SECRET",
        "REDKITE_USERNAME",
        "REDKITE_PASSWORD",
        "REDKITE_REFRESH_TOKEN",
        "REDKITE_ACCESS_TOKEN",
        "REDKITE_ENDPOINT_DOMAIN",
        "REDKITE_REQUEST_DELAY_MS",
        "REDKITE_REQUEST_TIMEOUT_MS",
        "REDKITE_CONTINUE_AFTER_RATELIMIT_ERROR",
        "REDKITE_RETRY_ERROR_CODES",
        "REDKITE_MAX_RETRY_ATTEMPTS",
        "REDKITE_WARNINGS",
        "REDKITE_DEBUG",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn temp_with_extension(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("REDKITE_TEST_BOOL_YES", "YES");
        std::env::set_var("REDKITE_TEST_BOOL_OFF", "off");
        assert!(env_bool("REDKITE_TEST_BOOL_YES", false));
        assert!(!env_bool("REDKITE_TEST_BOOL_OFF", true));

        std::env::remove_var("REDKITE_TEST_BOOL_MISSING");
        assert!(env_bool("REDKITE_TEST_BOOL_MISSING", true));

        std::env::remove_var("REDKITE_TEST_BOOL_YES");
        std::env::remove_var("REDKITE_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("REDKITE_USER_AGENT", "redkite-tests/1.0");
        std::env::set_var("REDKITE_CLIENT_ID", "cid");
        std::env::set_var("REDKITE_CLIENT_SECRET", "secret");
        std::env::set_var("REDKITE_REFRESH_TOKEN", "rt");
        std::env::set_var("REDKITE_ENDPOINT_DOMAIN", "example.com");
        std::env::set_var("REDKITE_REQUEST_DELAY_MS", "1500");
        std::env::set_var("REDKITE_CONTINUE_AFTER_RATELIMIT_ERROR", "true");
        std::env::set_var("REDKITE_RETRY_ERROR_CODES", "500, 503");
        std::env::set_var("REDKITE_MAX_RETRY_ATTEMPTS", "5");
        std::env::set_var("REDKITE_WARNINGS", "false");

        let result = load_from_env();
        clear_env();
        let config = result.unwrap();

        assert_eq!(config.credentials.user_agent, "redkite-tests/1.0");
        assert_eq!(config.credentials.client_id.as_deref(), Some("cid"));
        assert_eq!(config.credentials.refresh_token.as_deref(), Some("rt"));
        assert!(config.credentials.username.is_none());
        assert_eq!(config.client.endpoint_domain, "example.com");
        assert_eq!(config.client.request_delay_ms, 1500);
        assert_eq!(config.client.request_timeout_ms, 30_000);
        assert!(config.client.continue_after_ratelimit_error);
        assert_eq!(config.client.retry_error_codes, vec![500, 503]);
        assert_eq!(config.client.max_retry_attempts, 5);
        assert!(!config.client.warnings);
    }

    #[test]
    fn test_load_from_env_missing_user_agent() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, RedkiteError::Config(msg) if msg.contains("REDKITE_USER_AGENT")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("REDKITE_USER_AGENT", "ua");
        std::env::set_var("REDKITE_MAX_RETRY_ATTEMPTS", "many");
        let result = load_from_env();
        std::env::set_var("REDKITE_MAX_RETRY_ATTEMPTS", "0");
        let zero = load_from_env();
        clear_env();

        assert!(matches!(result, Err(RedkiteError::Config(_))));
        assert!(matches!(zero, Err(RedkiteError::Config(_))), "zero attempts fails validation");
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = temp_with_extension(
            r#"
[client]
request_delay_ms = 1000
retry_error_codes = [503]

[credentials]
user_agent = "redkite-tests"
access_token = "at"
"#,
            "toml",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();
        let config = result.unwrap();

        assert_eq!(config.client.request_delay_ms, 1000);
        assert_eq!(config.client.retry_error_codes, vec![503]);
        assert_eq!(config.client.max_retry_attempts, 3);
        assert_eq!(config.credentials.access_token.as_deref(), Some("at"));
    }

    #[test]
    fn test_load_from_file_json() {
        let path = temp_with_extension(
            r#"{"client": {"debug": true}, "credentials": {"user_agent": "ua", "username": "u", "password": "p"}}"#,
            "json",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();
        let config = result.unwrap();
        assert!(config.client.debug);
        assert!(config.credentials.can_refresh());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let path = temp_with_extension("[client]\nrequestDelay = 5\n", "toml");
        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();
        assert!(matches!(result, Err(RedkiteError::Config(msg)) if msg.starts_with("Invalid TOML")));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/redkite.toml")));
        assert!(matches!(result, Err(RedkiteError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("user_agent: x", Path::new("redkite.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_parse_status_list() {
        assert_eq!(parse_status_list("502,503, 504,").unwrap(), vec![502, 503, 504]);
        assert!(parse_status_list("502,abc").is_err());
    }
}
