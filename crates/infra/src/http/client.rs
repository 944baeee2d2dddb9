use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redkite_core::{HttpMethod, RequestBody};
use redkite_domain::{RedkiteError, Result};
use reqwest::multipart::Form;
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;

use super::{Transport, TransportRequest, TransportResponse};
use crate::errors::InfraError;

/// reqwest-backed [`Transport`]
///
/// Sends each request exactly once; retries belong to the pipeline.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let TransportRequest { method, url, query, headers, body, timeout, basic_auth, bearer_token } =
            request;

        let mut builder = self.client.request(to_method(method), &url).timeout(timeout);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((user, password)) = basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }
        if let Some(token) = bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(parts) => {
                let form = parts.into_iter().fold(Form::new(), |form, (k, v)| form.text(k, v));
                builder.multipart(form)
            }
            RequestBody::Json(value) => builder.json(&value),
        };

        debug!(%method, %url, "sending HTTP request");
        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                RedkiteError::Timeout(timeout)
            } else {
                RedkiteError::from(InfraError::from(err))
            }
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|err| RedkiteError::from(InfraError::from(err)))?;
        debug!(%method, %url, status, "received HTTP response");

        Ok(TransportResponse { status, headers, body })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    connect_timeout: Duration,
    user_agent: Option<String>,
    accept_invalid_certs: bool,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10), user_agent: None, accept_invalid_certs: false }
    }
}

impl HttpTransportBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = ReqwestClient::builder().connect_timeout(self.connect_timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|err| RedkiteError::from(InfraError::from(err)))?;
        Ok(HttpTransport { client })
    }
}
