//! Transport boundary
//!
//! The pipeline hands fully resolved requests to a [`Transport`] and gets
//! back status, headers and body. [`HttpTransport`] is the reqwest-backed
//! implementation; tests plug in scripted transports.

mod client;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redkite_core::{HttpMethod, RequestBody};
use redkite_domain::{RedkiteError, Result};
use serde_json::Value;

pub use client::{HttpTransport, HttpTransportBuilder};

/// A request ready for the wire
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Absolute URL without query string
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
    /// HTTP basic credentials (user, password)
    pub basic_auth: Option<(String, String)>,
    pub bearer_token: Option<String>,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout,
            basic_auth: None,
            bearer_token: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first query parameter named `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// What came back over the wire
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, headers: HashMap::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON; an empty body is `null`
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::Decode`] when the body is not valid JSON.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| {
            RedkiteError::Decode(format!("response body is not valid JSON: {e}"))
        })
    }
}

/// Sends requests over the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange; non-2xx statuses are responses, not errors
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}
