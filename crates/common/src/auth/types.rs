//! OAuth 2.0 token types
//!
//! Defines the token set held by the pipeline, the token endpoint's success
//! and error envelopes, and the grant variants the endpoint accepts.

use std::fmt;
use std::time::Duration;

use redkite_domain::constants::{DEFAULT_DEVICE_ID, INSTALLED_CLIENT_GRANT};
use redkite_domain::{RedkiteError, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

/// Access token plus the metadata the pipeline needs to decide when to
/// refresh it
///
/// Expiry is tracked on the tokio clock so paused-time tests can advance it.
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Bearer token attached to authenticated requests
    pub access_token: String,

    /// Long-lived token for obtaining new access tokens
    pub refresh_token: Option<String>,

    /// Token type (always "bearer" for this API)
    pub token_type: String,

    /// Access token lifetime in seconds, as reported by the endpoint
    pub expires_in: u64,

    /// Absolute expiration instant, computed when the set is created
    pub expires_at: Instant,

    /// Granted scopes
    pub scope: Vec<String>,
}

impl TokenSet {
    /// Create a new `TokenSet` expiring `expires_in` seconds from now
    ///
    /// `scope` is the space-separated list returned by the token endpoint.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: u64,
        scope: Option<&str>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in,
            expires_at: Instant::now() + Duration::from_secs(expires_in),
            scope: split_scope(scope),
        }
    }

    /// Whether the token is expired or will expire within `threshold`
    #[must_use]
    pub fn is_expired(&self, threshold: Duration) -> bool {
        Instant::now() + threshold >= self.expires_at
    }

    /// Time left before expiry, zero once expired
    #[must_use]
    pub fn remaining_validity(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

fn split_scope(scope: Option<&str>) -> Vec<String> {
    scope
        .map(|s| s.split(' ').filter(|part| !part.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Successful token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        let mut tokens = Self::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            response.scope.as_deref(),
        );
        if let Some(token_type) = response.token_type {
            tokens.token_type = token_type;
        }
        tokens
    }
}

/// Error envelope the token endpoint returns, sometimes with a 200 status
#[derive(Debug, Deserialize)]
pub struct GrantErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for GrantErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error == "invalid_grant" {
            return write!(
                f,
                "\"Invalid grant\" error returned from reddit. (You might have incorrect credentials.)"
            );
        }
        match &self.error_description {
            Some(desc) => write!(f, "Reddit returned an error: {}: {}", self.error, desc),
            None => write!(f, "Reddit returned an error: {}", self.error),
        }
    }
}

impl From<GrantErrorResponse> for RedkiteError {
    fn from(err: GrantErrorResponse) -> Self {
        Self::AuthGrant(err.to_string())
    }
}

/// Interpret a token endpoint body
///
/// # Errors
///
/// Returns [`RedkiteError::AuthGrant`] when the body is an error envelope and
/// [`RedkiteError::Decode`] when it is neither shape.
pub fn parse_token_response(body: Value) -> Result<TokenSet> {
    if body.get("error").is_some_and(|e| !e.is_null()) {
        let error_text = match &body["error"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let envelope = GrantErrorResponse {
            error: error_text,
            error_description: body
                .get("error_description")
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        return Err(envelope.into());
    }
    let response: TokenResponse = serde_json::from_value(body)
        .map_err(|e| RedkiteError::Decode(format!("unexpected token response: {e}")))?;
    Ok(response.into())
}

/// Grant exchanged at the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: String },
    Password { username: String, password: String },
    ClientCredentials { permanent: bool },
    InstalledClient { device_id: String, permanent: bool },
}

impl GrantType {
    /// Installed-client grant with the untracked device id and a permanent
    /// duration
    pub fn installed_client() -> Self {
        Self::InstalledClient { device_id: DEFAULT_DEVICE_ID.to_string(), permanent: true }
    }

    /// Value of the `grant_type` form field
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
            Self::Password { .. } => "password",
            Self::ClientCredentials { .. } => "client_credentials",
            Self::InstalledClient { .. } => INSTALLED_CLIENT_GRANT,
        }
    }

    /// Form body for the token endpoint
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("grant_type".to_string(), self.name().to_string())];
        match self {
            Self::AuthorizationCode { code, redirect_uri } => {
                pairs.push(("code".into(), code.clone()));
                pairs.push(("redirect_uri".into(), redirect_uri.clone()));
            }
            Self::RefreshToken { refresh_token } => {
                pairs.push(("refresh_token".into(), refresh_token.clone()));
            }
            Self::Password { username, password } => {
                pairs.push(("username".into(), username.clone()));
                pairs.push(("password".into(), password.clone()));
            }
            Self::ClientCredentials { permanent } => {
                pairs.push(("duration".into(), duration_name(*permanent).into()));
            }
            Self::InstalledClient { device_id, permanent } => {
                pairs.push(("device_id".into(), device_id.clone()));
                pairs.push(("duration".into(), duration_name(*permanent).into()));
            }
        }
        pairs
    }
}

/// `duration` value for a permanent or one-hour grant
pub fn duration_name(permanent: bool) -> &'static str {
    if permanent {
        "permanent"
    } else {
        "temporary"
    }
}

impl fmt::Debug for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets stay out of logs
        f.debug_struct("GrantType").field("grant_type", &self.name()).finish()
    }
}
