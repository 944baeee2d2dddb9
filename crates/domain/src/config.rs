//! Client configuration structures
//!
//! [`ClientConfig`] is passed explicitly to the pipeline's constructor. The
//! option set is fixed: unknown keys are rejected when a config is built, not
//! when it is used.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_ENDPOINT_DOMAIN;
use crate::errors::{RedkiteError, Result};

/// Tunables consumed by the request pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Domain the client talks to; requests go to `oauth.<domain>` and
    /// `www.<domain>`
    pub endpoint_domain: String,
    /// Minimum spacing between two dispatched requests
    pub request_delay_ms: u64,
    /// Per-request timeout handed to the transport
    pub request_timeout_ms: u64,
    /// Sleep until the rate-limit window resets instead of failing
    pub continue_after_ratelimit_error: bool,
    /// Statuses that are retried on idempotent verbs
    pub retry_error_codes: Vec<u16>,
    /// Total attempts (initial try + retries) for retryable statuses
    pub max_retry_attempts: u32,
    /// Emit warnings (retries, unknown kinds)
    pub warnings: bool,
    /// Emit request/response debug output
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_domain: DEFAULT_ENDPOINT_DOMAIN.to_string(),
            request_delay_ms: 0,
            request_timeout_ms: 30_000,
            continue_after_ratelimit_error: false,
            retry_error_codes: vec![502, 503, 504, 522],
            max_retry_attempts: 3,
            warnings: true,
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Spacing enforced by the pacing gate
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Timeout applied to every transport call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whether `status` is in the configured retryable set
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_error_codes.contains(&status)
    }

    /// Base URL for bearer-authenticated calls
    pub fn oauth_base_url(&self) -> String {
        format!("https://oauth.{}", self.endpoint_domain)
    }

    /// Base URL for credentialed and unauthenticated calls
    pub fn www_base_url(&self) -> String {
        format!("https://www.{}", self.endpoint_domain)
    }

    /// Check invariants that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::Config`] for an empty domain or a zero attempt
    /// ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_domain.trim().is_empty() {
            return Err(RedkiteError::Config("endpoint_domain must not be empty".into()));
        }
        if self.max_retry_attempts == 0 {
            return Err(RedkiteError::Config("max_retry_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Apply a partial set of options given as a JSON object
    ///
    /// Keys that are not part of the option set are rejected before anything
    /// is applied.
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::InvalidArgument`] for a non-object patch, an
    /// unknown key or a value of the wrong type.
    pub fn merge_json(&self, patch: &Value) -> Result<Self> {
        let Value::Object(entries) = patch else {
            return Err(RedkiteError::InvalidArgument(
                "config options must be given as an object".into(),
            ));
        };

        let mut current = serde_json::to_value(self)
            .map_err(|e| RedkiteError::Config(format!("failed to serialize config: {e}")))?;
        let Some(fields) = current.as_object_mut() else {
            return Err(RedkiteError::Config("config did not serialize to an object".into()));
        };

        if let Some(invalid) = entries.keys().find(|key| !fields.contains_key(*key)) {
            return Err(RedkiteError::InvalidArgument(format!(
                "Invalid config option '{invalid}'"
            )));
        }
        for (key, value) in entries {
            fields.insert(key.clone(), value.clone());
        }

        let merged: Self = serde_json::from_value(current)
            .map_err(|e| RedkiteError::InvalidArgument(format!("invalid config value: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}

/// Credentials a client may hold
///
/// Which grant the pipeline uses follows from which fields are present: a
/// refresh token wins over a username/password pair.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    pub user_agent: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
}

impl Credentials {
    /// Credentials with only a user agent set
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into(), ..Self::default() }
    }

    /// Whether a fresh access token can be obtained without user interaction
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() || (self.username.is_some() && self.password.is_some())
    }
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<none>"
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_agent", &self.user_agent)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}
