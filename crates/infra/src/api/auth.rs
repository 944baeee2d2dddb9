//! Token endpoint access and authorization URLs
//!
//! Every call here goes to `https://www.<domain>` rather than the OAuth host:
//! grant exchanges and revocations carry the app's client id and secret as
//! HTTP basic credentials, and unauthenticated calls carry nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redkite_common::auth::{duration_name, parse_token_response, GrantType, TokenSet};
use redkite_core::ApiRequest;
use redkite_domain::constants::{ACCESS_TOKEN_PATH, AUTHORIZE_PATH, REVOKE_TOKEN_PATH};
use redkite_domain::{ClientConfig, RedkiteError, Result};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::token_manager::TokenSource;
use crate::errors::InfraError;
use crate::http::{Transport, TransportRequest, TransportResponse};

/// Client for the `www` host
#[derive(Clone)]
pub struct TokenEndpoint {
    transport: Arc<dyn Transport>,
    base_url: String,
    user_agent: String,
    client_id: Option<String>,
    client_secret: String,
    timeout: Duration,
}

impl TokenEndpoint {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            client_id: None,
            client_secret: String::new(),
            timeout,
        }
    }

    /// Set the app credentials; installed apps have an empty secret
    pub fn with_client(mut self, client_id: Option<String>, client_secret: Option<String>) -> Self {
        self.client_id = client_id;
        self.client_secret = client_secret.unwrap_or_default();
        self
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    fn wire_request(&self, request: ApiRequest) -> TransportRequest {
        let mut wire = TransportRequest::new(
            request.method,
            format!("{}/{}", self.base_url, request.uri),
            self.timeout,
        )
        .header("User-Agent", self.user_agent.clone());
        wire.query = request.query;
        wire.body = request.body;
        wire
    }

    async fn send_credentialed(&self, request: ApiRequest) -> Result<TransportResponse> {
        let client_id = self.client_id.clone().ok_or_else(|| {
            RedkiteError::InvalidArgument(
                "a client id is required for requests made with app credentials".into(),
            )
        })?;
        let mut wire = self.wire_request(request);
        wire.basic_auth = Some((client_id, self.client_secret.clone()));
        self.transport.send(wire).await
    }

    /// Send a request authenticated with the app's client id and secret
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::Http`] for a non-2xx status and
    /// [`RedkiteError::Decode`] for a body that is not JSON.
    #[instrument(skip(self, request), fields(uri = %request.uri))]
    pub async fn credentialed(&self, request: ApiRequest) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, request.uri);
        let response = self.send_credentialed(request).await?;
        into_json(response, &url)
    }

    /// Send a request with no authentication at all
    ///
    /// # Errors
    ///
    /// Same as [`Self::credentialed`].
    #[instrument(skip(self, request), fields(uri = %request.uri))]
    pub async fn unauthenticated(&self, request: ApiRequest) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, request.uri);
        let response = self.transport.send(self.wire_request(request)).await?;
        into_json(response, &url)
    }

    /// Revoke an access or refresh token
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let request = ApiRequest::post(REVOKE_TOKEN_PATH).form_field("token", token);
        self.credentialed(request).await?;
        debug!("token revoked");
        Ok(())
    }
}

fn into_json(response: TransportResponse, url: &str) -> Result<Value> {
    if !response.is_success() {
        return Err(RedkiteError::Http {
            status: response.status,
            url: url.to_string(),
            body: response.body,
        });
    }
    response.json()
}

#[async_trait]
impl TokenSource for TokenEndpoint {
    #[instrument(skip(self, grant), fields(grant = grant.name()))]
    async fn exchange(&self, grant: GrantType) -> Result<TokenSet> {
        let mut request = ApiRequest::post(ACCESS_TOKEN_PATH);
        for (key, value) in grant.form_pairs() {
            request = request.form_field(key, value);
        }
        let url = format!("{}/{}", self.base_url, ACCESS_TOKEN_PATH);
        let response = self.send_credentialed(request).await?;

        // The endpoint reports bad grants with an error envelope, sometimes
        // alongside a 4xx status
        match response.json() {
            Ok(body) if response.is_success() || body.get("error").is_some() => {
                parse_token_response(body)
            }
            _ => Err(RedkiteError::Http {
                status: response.status,
                url,
                body: response.body,
            }),
        }
    }
}

/// Parameters of the authorization page URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUrlOptions {
    pub client_id: String,
    pub scope: Vec<String>,
    pub redirect_uri: String,
    /// Request a refresh token along with the access token
    pub permanent: bool,
    /// Echoed back to the redirect URI
    pub state: String,
    /// Use the mobile-friendly authorization page
    pub compact: bool,
}

impl AuthUrlOptions {
    pub fn new(
        client_id: impl Into<String>,
        scope: Vec<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            scope,
            redirect_uri: redirect_uri.into(),
            permanent: true,
            state: "_".into(),
            compact: false,
        }
    }
}

/// URL of the page where a user authorizes the app
///
/// # Errors
///
/// Returns [`RedkiteError::InvalidArgument`] for an empty scope list or
/// client id.
pub fn auth_url(config: &ClientConfig, options: &AuthUrlOptions) -> Result<String> {
    if options.scope.is_empty() {
        return Err(RedkiteError::InvalidArgument(
            "Missing `scope` argument; a non-empty list of scopes is required".into(),
        ));
    }
    if options.client_id.is_empty() {
        return Err(RedkiteError::InvalidArgument("Missing `client_id` argument".into()));
    }

    let suffix = if options.compact { ".compact" } else { "" };
    let base = format!("{}/{AUTHORIZE_PATH}{suffix}", config.www_base_url());
    let mut url = Url::parse(&base).map_err(|e| RedkiteError::from(InfraError::from(e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &options.client_id)
        .append_pair("response_type", "code")
        .append_pair("state", &options.state)
        .append_pair("redirect_uri", &options.redirect_uri)
        .append_pair("duration", duration_name(options.permanent))
        .append_pair("scope", &options.scope.join(" "));
    Ok(url.into())
}
