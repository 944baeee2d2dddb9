//! Shared helpers for `redkite-infra` integration tests.
//!
//! [`ScriptedTransport`] answers token-endpoint calls itself and serves API
//! calls from a queue or a handler, recording every dispatch with the tokio
//! instant it happened at so paused-clock tests can assert on spacing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redkite_common::testing::fixtures;
use redkite_common::Backoff;
use redkite_domain::constants::ACCESS_TOKEN_PATH;
use redkite_domain::{ClientConfig, Credentials, Result};
use redkite_infra::{ApiClient, Transport, TransportRequest, TransportResponse};
use tokio::time::Instant;

type Handler = Box<dyn Fn(&TransportRequest) -> TransportResponse + Send + Sync>;

pub struct ScriptedTransport {
    queue: Mutex<VecDeque<TransportResponse>>,
    handler: Option<Handler>,
    api_calls: Mutex<Vec<(Instant, TransportRequest)>>,
    token_calls: AtomicUsize,
    token_lifetime: u64,
    token_delay: Duration,
    api_delays: Vec<Duration>,
}

impl ScriptedTransport {
    /// Serve API calls from `responses` in order, then `{}`
    pub fn new(responses: Vec<TransportResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            handler: None,
            api_calls: Mutex::new(Vec::new()),
            token_calls: AtomicUsize::new(0),
            token_lifetime: 3600,
            token_delay: Duration::ZERO,
            api_delays: Vec::new(),
        }
    }

    /// Serve API calls by calling `handler`
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&TransportRequest) -> TransportResponse + Send + Sync + 'static,
    {
        Self { handler: Some(Box::new(handler)), ..Self::new(Vec::new()) }
    }

    /// Lifetime in seconds of every issued token
    pub fn with_token_lifetime(mut self, secs: u64) -> Self {
        self.token_lifetime = secs;
        self
    }

    /// Time the token endpoint takes to answer
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Time the n-th API call takes to answer; later calls answer at once
    pub fn with_api_delays(mut self, delays: Vec<Duration>) -> Self {
        self.api_delays = delays;
        self
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn api_calls(&self) -> Vec<TransportRequest> {
        self.api_calls.lock().iter().map(|(_, request)| request.clone()).collect()
    }

    pub fn dispatch_times(&self) -> Vec<Instant> {
        self.api_calls.lock().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        if request.url.ends_with(ACCESS_TOKEN_PATH) {
            let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.token_delay.is_zero() {
                tokio::time::sleep(self.token_delay).await;
            }
            let body = fixtures::token_response(&format!("token-{n}"), self.token_lifetime);
            return Ok(TransportResponse::new(200, body.to_string()));
        }

        let index = {
            let mut calls = self.api_calls.lock();
            calls.push((Instant::now(), request.clone()));
            calls.len() - 1
        };
        let response = match &self.handler {
            Some(handler) => handler(&request),
            None => self.queue.lock().pop_front().unwrap_or_else(|| TransportResponse::new(200, "{}")),
        };
        if let Some(delay) = self.api_delays.get(index).filter(|d| !d.is_zero()) {
            tokio::time::sleep(*delay).await;
        }
        Ok(response)
    }
}

/// Credentials that refresh through the `refresh_token` grant
pub fn refreshable_credentials() -> Credentials {
    Credentials {
        client_id: Some("client".into()),
        client_secret: Some("secret".into()),
        refresh_token: Some("refresh".into()),
        ..Credentials::new("redkite-integration-tests/0.1")
    }
}

/// Client over `transport` with deterministic backoff
pub fn client_with(transport: Arc<ScriptedTransport>, config: ClientConfig) -> ApiClient {
    ApiClient::builder()
        .config(config)
        .credentials(refreshable_credentials())
        .transport(transport)
        .backoff(Backoff::new().with_jitter_factor(0.0))
        .build()
        .expect("client should build")
}

pub fn ok_json(body: serde_json::Value) -> TransportResponse {
    TransportResponse::new(200, body.to_string())
}

pub fn with_quota(response: TransportResponse, remaining: &str, reset_secs: &str) -> TransportResponse {
    response
        .with_header("x-ratelimit-remaining", remaining)
        .with_header("x-ratelimit-reset", reset_secs)
}
