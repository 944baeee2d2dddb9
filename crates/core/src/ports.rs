//! Port interfaces for re-entering the request pipeline
//!
//! Listings and object stubs never talk to the network directly. They
//! describe what they need as an [`ApiRequest`] and hand it to a
//! [`Requester`], which the infra crate implements with the authenticated
//! pipeline.

use std::fmt;

use async_trait::async_trait;
use redkite_domain::Result;
use serde_json::Value;

use crate::materializer::Materialized;

/// HTTP verb of an API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    /// Verbs that may be re-sent after a retryable failure
    pub fn is_idempotent(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Put | Self::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `multipart/form-data` text parts
    Multipart(Vec<(String, String)>),
    Json(Value),
}

/// A single API call relative to the pipeline's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the base URL, without a leading slash
    pub uri: String,
    /// Query pairs in the order they are sent
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            method,
            uri: uri.trim_start_matches('/').to_string(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, uri)
    }

    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, uri)
    }

    pub fn patch(uri: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, uri)
    }

    pub fn head(uri: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, uri)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append every pair of `params`
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add or append a form field, switching the body to a form
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let pair = (key.into(), value.into());
        match &mut self.body {
            RequestBody::Form(fields) => fields.push(pair),
            _ => self.body = RequestBody::Form(vec![pair]),
        }
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Value of the first query parameter named `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// Performs an authenticated call and materializes the response
#[async_trait]
pub trait Requester: Send + Sync {
    /// Send `request` through the pipeline
    async fn request(&self, request: ApiRequest) -> Result<Materialized>;
}
