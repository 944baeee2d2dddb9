//! Authenticated request pipeline
//!
//! Every OAuth call passes the same gates in order before it is dispatched:
//! the rate-limit quota, the retry backoff, token validity and finally the
//! pacing watermark, whose slot is the dispatch instant. Responses are
//! materialized before they are returned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redkite_common::auth::{GrantType, TokenSet};
use redkite_common::Backoff;
use redkite_core::{
    ApiRequest, Listing, Materialized, Materializer, ObjectFactory, RequestBody, Requester,
};
use redkite_domain::constants::{LISTING_COUNT, MAX_LISTING_ITEMS, MAX_TOKEN_LATENCY};
use redkite_domain::{ClientConfig, Credentials, RedkiteError, Result};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::auth::TokenEndpoint;
use super::token_manager::{TokenManager, TokenSource};
use crate::http::{HttpTransport, Transport, TransportRequest, TransportResponse};
use crate::rate_limit::RateLimiter;

struct ClientInner {
    config: ClientConfig,
    user_agent: String,
    oauth_base: String,
    transport: Arc<dyn Transport>,
    endpoint: TokenEndpoint,
    tokens: TokenManager,
    limiter: RateLimiter,
    backoff: Backoff,
    materializer: Materializer,
}

/// Handle to one authenticated pipeline
///
/// Cloning is cheap; clones share tokens, quota and pacing state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

enum Outcome {
    Done(Materialized),
    Retry,
    RetryWithFreshToken,
}

impl ApiClient {
    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Exchange an authorization code and return a ready client
    ///
    /// # Errors
    ///
    /// Fails when the builder is incomplete or the code is rejected.
    pub async fn from_auth_code(
        builder: ApiClientBuilder,
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        let grant =
            GrantType::AuthorizationCode { code: code.into(), redirect_uri: redirect_uri.into() };
        Self::from_grant(builder, grant).await
    }

    /// Obtain an app-only token and return a ready client
    ///
    /// Only the `client_credentials` and installed-client grants act on
    /// behalf of the app rather than a user.
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::InvalidArgument`] for any other grant, and
    /// fails like [`Self::from_auth_code`] otherwise.
    pub async fn from_application_only_auth(
        builder: ApiClientBuilder,
        grant: GrantType,
    ) -> Result<Self> {
        if !matches!(grant, GrantType::ClientCredentials { .. } | GrantType::InstalledClient { .. })
        {
            return Err(RedkiteError::InvalidArgument(format!(
                "'{}' is not an application-only grant",
                grant.name()
            )));
        }
        Self::from_grant(builder, grant).await
    }

    async fn from_grant(builder: ApiClientBuilder, grant: GrantType) -> Result<Self> {
        let client = builder.build_unchecked()?;
        let tokens = client.inner.endpoint.exchange(grant).await?;
        client.inner.tokens.store(tokens).await;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Current token set, if any
    pub async fn tokens(&self) -> Option<TokenSet> {
        self.inner.tokens.current().await
    }

    /// Scopes granted to the current token
    pub async fn scope(&self) -> Vec<String> {
        self.inner.tokens.scope().await
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.tokens.refresh_token()
    }

    /// Send `request` to the OAuth host through every gate
    ///
    /// # Errors
    ///
    /// - [`RedkiteError::RateLimited`] when the quota is spent and waiting is
    ///   disabled
    /// - [`RedkiteError::RetryableStatus`] once the attempt ceiling is hit
    /// - [`RedkiteError::TokenExpiredMidFlight`] when a fresh token is
    ///   rejected too
    /// - [`RedkiteError::RemoteApi`] for a `{json: {errors}}` envelope
    /// - [`RedkiteError::Http`] for any other failing status
    #[instrument(skip(self, request), fields(method = %request.method, uri = %request.uri))]
    pub async fn oauth_request(&self, request: ApiRequest) -> Result<Materialized> {
        let inner = &self.inner;
        let mut attempt: u32 = 1;
        let mut token_retried = false;

        loop {
            inner.limiter.check_quota().await?;
            let wait = inner.backoff.delay_for(attempt);
            if !wait.is_zero() {
                debug!(attempt, wait_ms = wait.as_millis() as u64, "backing off before retry");
                tokio::time::sleep(wait).await;
            }
            let token = inner.tokens.access_token().await?;
            // The slot is taken last so nothing else can delay the dispatch
            inner.limiter.pace().await;

            let mut wire = self.wire_request(&request);
            wire.bearer_token = Some(token.value.clone());
            let response = inner.transport.send(wire).await?;
            inner.limiter.record(&response);

            match self.classify(&request, response, attempt, token.remaining, token_retried)? {
                Outcome::Done(materialized) => return Ok(materialized),
                Outcome::Retry => attempt += 1,
                Outcome::RetryWithFreshToken => {
                    token_retried = true;
                    inner.tokens.invalidate_if(&token.value).await;
                }
            }
        }
    }

    fn wire_request(&self, request: &ApiRequest) -> TransportRequest {
        let inner = &self.inner;
        let mut wire = TransportRequest::new(
            request.method,
            format!("{}/{}", inner.oauth_base, request.uri),
            inner.config.request_timeout(),
        )
        .header("User-Agent", inner.user_agent.clone());
        wire.query = request.query.clone();
        wire.query.push(("raw_json".into(), "1".into()));
        wire.body = request.body.clone();
        wire
    }

    fn classify(
        &self,
        request: &ApiRequest,
        response: TransportResponse,
        attempt: u32,
        token_remaining: Duration,
        token_retried: bool,
    ) -> Result<Outcome> {
        let config = &self.inner.config;
        let url = format!("{}/{}", self.inner.oauth_base, request.uri);
        let status = response.status;

        if response.is_success() {
            if config.debug {
                debug!(status, url = %url, "request succeeded");
            }
            let raw = response.json()?;
            let mut materialized = self.inner.materializer.populate(raw);
            if let Some(errors) = materialized.remote_errors() {
                return Err(RedkiteError::RemoteApi(errors));
            }
            materialized.set_listing_uri(&request.uri);
            return Ok(Outcome::Done(materialized));
        }

        let retryable = config.is_retryable_status(status) && request.method.is_idempotent();
        if retryable && attempt < config.max_retry_attempts {
            if config.warnings {
                warn!(
                    "Received status code {status} from reddit. Retrying request (attempt {}/{})...",
                    attempt + 1,
                    config.max_retry_attempts
                );
            }
            return Ok(Outcome::Retry);
        }

        if status == 401 && token_retried {
            return Err(RedkiteError::TokenExpiredMidFlight { url });
        }
        if status == 401 && token_remaining < MAX_TOKEN_LATENCY {
            debug!(url = %url, "token expired in flight; refreshing");
            return Ok(Outcome::RetryWithFreshToken);
        }

        if retryable {
            return Err(RedkiteError::RetryableStatus { status, url, attempts: attempt });
        }
        Err(map_status_error(status, url, response.body))
    }

    pub async fn get(&self, uri: impl Into<String>) -> Result<Materialized> {
        self.oauth_request(ApiRequest::get(uri)).await
    }

    pub async fn head(&self, uri: impl Into<String>) -> Result<Materialized> {
        self.oauth_request(ApiRequest::head(uri)).await
    }

    pub async fn delete(&self, uri: impl Into<String>) -> Result<Materialized> {
        self.oauth_request(ApiRequest::delete(uri)).await
    }

    pub async fn post(&self, uri: impl Into<String>, body: RequestBody) -> Result<Materialized> {
        self.oauth_request(ApiRequest::post(uri).with_body(body)).await
    }

    pub async fn put(&self, uri: impl Into<String>, body: RequestBody) -> Result<Materialized> {
        self.oauth_request(ApiRequest::put(uri).with_body(body)).await
    }

    pub async fn patch(&self, uri: impl Into<String>, body: RequestBody) -> Result<Materialized> {
        self.oauth_request(ApiRequest::patch(uri).with_body(body)).await
    }

    /// First page of the listing at `uri`
    ///
    /// The amount defaults to the per-request maximum unless `query` carries
    /// a `limit`. A large `count` is sent unless the caller set one, so the
    /// service reports a `before` cursor.
    ///
    /// # Errors
    ///
    /// Propagates pipeline errors; a response that is not a listing is a
    /// [`RedkiteError::Decode`] error.
    pub async fn get_listing(
        &self,
        uri: impl Into<String>,
        query: BTreeMap<String, String>,
    ) -> Result<Listing> {
        let mut query = query;
        query.entry("limit".into()).or_insert_with(|| MAX_LISTING_ITEMS.to_string());
        query.entry("count".into()).or_insert_with(|| LISTING_COUNT.to_string());
        Listing::open(self, uri, query).await
    }

    /// Call the `www` host with the app's client credentials
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn credentialed_request(&self, request: ApiRequest) -> Result<Value> {
        self.inner.endpoint.credentialed(request).await
    }

    /// Call the `www` host without authentication
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn unauthenticated_request(&self, request: ApiRequest) -> Result<Value> {
        self.inner.endpoint.unauthenticated(request).await
    }

    /// Revoke the current access token and forget it
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::InvalidArgument`] when there is no access
    /// token, or the revocation failure.
    pub async fn revoke_access_token(&self) -> Result<()> {
        let current = self.inner.tokens.current().await.ok_or_else(|| {
            RedkiteError::InvalidArgument("there is no access token to revoke".into())
        })?;
        self.inner.endpoint.revoke(&current.access_token).await?;
        self.inner.tokens.clear_access().await;
        Ok(())
    }

    /// Revoke the refresh token; the access token goes with it
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::InvalidArgument`] when there is no refresh
    /// token, or the revocation failure.
    pub async fn revoke_refresh_token(&self) -> Result<()> {
        let refresh = self.inner.tokens.refresh_token().ok_or_else(|| {
            RedkiteError::InvalidArgument("there is no refresh token to revoke".into())
        })?;
        self.inner.endpoint.revoke(&refresh).await?;
        self.inner.tokens.clear_all().await;
        Ok(())
    }
}

#[async_trait]
impl Requester for ApiClient {
    async fn request(&self, request: ApiRequest) -> Result<Materialized> {
        self.oauth_request(request).await
    }
}

fn map_status_error(status: u16, url: String, body: String) -> RedkiteError {
    RedkiteError::Http { status, url, body }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    credentials: Option<Credentials>,
    transport: Option<Arc<dyn Transport>>,
    backoff: Option<Backoff>,
    factory: Option<Arc<ObjectFactory>>,
    oauth_base: Option<String>,
    www_base: Option<String>,
}

impl ApiClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Use a factory with extra kind constructors
    pub fn factory(mut self, factory: Arc<ObjectFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Point the client at other hosts than the configured domain's
    pub fn base_urls(mut self, oauth: impl Into<String>, www: impl Into<String>) -> Self {
        self.oauth_base = Some(oauth.into());
        self.www_base = Some(www.into());
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::Config`] for an invalid config, a missing user
    /// agent, or credentials that cannot produce an access token.
    pub fn build(self) -> Result<ApiClient> {
        if let Some(credentials) = &self.credentials {
            let has_app = credentials.client_id.is_some();
            let usable = credentials.access_token.is_some()
                || (has_app && credentials.can_refresh());
            if !usable {
                return Err(RedkiteError::Config(
                    "Missing credentials: supply either (a) client_id, client_secret and \
                     refresh_token, (b) access_token, or (c) client_id, client_secret, \
                     username and password"
                        .into(),
                ));
            }
        }
        self.build_unchecked()
    }

    fn build_unchecked(self) -> Result<ApiClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let credentials = self.credentials.unwrap_or_default();
        if credentials.user_agent.trim().is_empty() {
            return Err(RedkiteError::Config(
                "a user agent identifying the application is required".into(),
            ));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let oauth_base = self
            .oauth_base
            .unwrap_or_else(|| config.oauth_base_url())
            .trim_end_matches('/')
            .to_string();
        let www_base = self.www_base.unwrap_or_else(|| config.www_base_url());

        let endpoint = TokenEndpoint::new(
            Arc::clone(&transport),
            www_base,
            credentials.user_agent.clone(),
            config.request_timeout(),
        )
        .with_client(credentials.client_id.clone(), credentials.client_secret.clone());
        let source: Arc<dyn TokenSource> = Arc::new(endpoint.clone());
        let tokens = TokenManager::from_credentials(source, &credentials);

        let limiter = RateLimiter::new(config.request_delay(), config.continue_after_ratelimit_error)
            .with_warnings(config.warnings);
        let materializer = self
            .factory
            .map(Materializer::new)
            .unwrap_or_default()
            .with_warnings(config.warnings);

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                user_agent: credentials.user_agent,
                oauth_base,
                transport,
                endpoint,
                tokens,
                limiter,
                backoff: self.backoff.unwrap_or_default(),
                materializer,
                config,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;
    use redkite_common::testing::fixtures;
    use serde_json::json;

    use super::*;

    /// Answers token requests itself and replays scripted API responses
    struct Scripted {
        api: Mutex<VecDeque<TransportResponse>>,
        sent: Mutex<Vec<TransportRequest>>,
    }

    impl Scripted {
        fn new(api: Vec<TransportResponse>) -> Arc<Self> {
            Arc::new(Self { api: Mutex::new(api.into()), sent: Mutex::new(Vec::new()) })
        }

        fn api_calls(&self) -> Vec<TransportRequest> {
            self.sent.lock().iter().filter(|r| !r.url.contains("access_token")).cloned().collect()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
            let is_token = request.url.ends_with("api/v1/access_token");
            self.sent.lock().push(request);
            if is_token {
                return Ok(TransportResponse::new(
                    200,
                    fixtures::token_response("fresh", 3600).to_string(),
                ));
            }
            Ok(self.api.lock().pop_front().unwrap_or_else(|| TransportResponse::new(200, "{}")))
        }
    }

    fn client(transport: Arc<Scripted>) -> ApiClient {
        let credentials = Credentials {
            client_id: Some("cid".into()),
            client_secret: Some("secret".into()),
            refresh_token: Some("rt".into()),
            ..Credentials::new("redkite-tests")
        };
        ApiClient::builder()
            .credentials(credentials)
            .transport(transport)
            .backoff(Backoff::new().with_jitter_factor(0.0))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn attaches_bearer_user_agent_and_raw_json() {
        let transport = Scripted::new(vec![TransportResponse::new(200, r#"{"ok":true}"#)]);
        let client = client(transport.clone());

        client.get("/api/v1/me").await.unwrap();

        let sent = transport.api_calls();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://oauth.reddit.com/api/v1/me");
        assert_eq!(sent[0].bearer_token.as_deref(), Some("fresh"));
        assert_eq!(sent[0].query_value("raw_json"), Some("1"));
        assert!(sent[0].headers.contains(&("User-Agent".into(), "redkite-tests".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_idempotent_verbs_then_gives_up() {
        let transport = Scripted::new(vec![
            TransportResponse::new(503, ""),
            TransportResponse::new(503, ""),
            TransportResponse::new(503, ""),
            TransportResponse::new(200, "{}"),
        ]);
        let client = client(transport.clone());

        let err = client.get("r/rust/about").await.unwrap_err();
        assert!(matches!(err, RedkiteError::RetryableStatus { status: 503, attempts: 3, .. }));
        assert_eq!(transport.api_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn post_is_never_retried() {
        let transport = Scripted::new(vec![TransportResponse::new(502, "bad gateway")]);
        let client = client(transport.clone());

        let err = client.post("api/comment", RequestBody::Empty).await.unwrap_err();
        assert!(matches!(err, RedkiteError::Http { status: 502, .. }));
        assert_eq!(transport.api_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_envelope_fails() {
        let body = json!({"json": {"errors": [["SUBREDDIT_NOEXIST", "that subreddit doesn't exist", "sr"]]}});
        let transport = Scripted::new(vec![TransportResponse::new(200, body.to_string())]);
        let client = client(transport);

        let err = client.post("api/submit", RequestBody::Empty).await.unwrap_err();
        match err {
            RedkiteError::RemoteApi(entries) => {
                assert_eq!(entries, vec!["SUBREDDIT_NOEXIST: that subreddit doesn't exist: sr"]);
            }
            other => panic!("expected remote api error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn listing_responses_carry_their_uri() {
        let page = fixtures::listing(fixtures::posts(0, 3), None, None);
        let transport = Scripted::new(vec![TransportResponse::new(200, page.to_string())]);
        let client = client(transport.clone());

        let listing = client.get_listing("r/rust/new", BTreeMap::new()).await.unwrap();
        assert_eq!(listing.len(), 3);
        assert_eq!(listing.uri(), Some("r/rust/new"));
        assert!(listing.is_finished());
        assert_eq!(transport.api_calls()[0].query_value("limit"), Some("100"));
        assert_eq!(transport.api_calls()[0].query_value("count"), Some("9999"));
    }

    #[tokio::test(start_paused = true)]
    async fn caller_count_is_kept() {
        let page = fixtures::listing(fixtures::posts(0, 1), None, None);
        let transport = Scripted::new(vec![TransportResponse::new(200, page.to_string())]);
        let client = client(transport.clone());

        let query = BTreeMap::from([("count".to_string(), "25".to_string())]);
        client.get_listing("r/rust/new", query).await.unwrap();
        assert_eq!(transport.api_calls()[0].query_value("count"), Some("25"));
    }

    #[tokio::test(start_paused = true)]
    async fn other_statuses_propagate() {
        let transport = Scripted::new(vec![TransportResponse::new(404, "not found")]);
        let client = client(transport);
        let err = client.get("r/missing/about").await.unwrap_err();
        assert!(matches!(err, RedkiteError::Http { status: 404, ref body, .. } if body == "not found"));
    }

    #[test]
    fn build_requires_usable_credentials() {
        let result = ApiClient::builder()
            .credentials(Credentials { client_id: Some("cid".into()), ..Credentials::new("ua") })
            .transport(Scripted::new(Vec::new()))
            .build();
        assert!(matches!(result, Err(RedkiteError::Config(_))));
    }

    #[test]
    fn build_requires_user_agent() {
        let result = ApiClient::builder()
            .credentials(Credentials { access_token: Some("at".into()), ..Credentials::default() })
            .transport(Scripted::new(Vec::new()))
            .build();
        assert!(matches!(result, Err(RedkiteError::Config(msg)) if msg.contains("user agent")));
    }

    #[tokio::test]
    async fn application_only_auth_rejects_user_grants() {
        let builder = ApiClient::builder()
            .credentials(Credentials { client_id: Some("cid".into()), ..Credentials::new("ua") })
            .transport(Scripted::new(Vec::new()));
        let result = ApiClient::from_application_only_auth(
            builder,
            GrantType::Password { username: "u".into(), password: "p".into() },
        )
        .await;
        assert!(matches!(result, Err(RedkiteError::InvalidArgument(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_between_attempts() {
        let transport = Scripted::new(vec![
            TransportResponse::new(504, ""),
            TransportResponse::new(504, ""),
            TransportResponse::new(200, "{}"),
        ]);
        let client = client(transport);
        let started = tokio::time::Instant::now();
        client.get("api/v1/me").await.unwrap();
        // 1s before attempt 2, 2s before attempt 3
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
