//! Shared test helpers for `redkite-core` integration tests.
//!
//! Two in-memory requesters stand in for the network pipeline: a paged
//! source that answers cursor requests like a real listing endpoint, and a
//! scripted one that replays canned bodies in order.

#![allow(dead_code)]

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use redkite_common::testing::fixtures;
use redkite_core::{ApiRequest, Materialized, Materializer, Requester};
use redkite_domain::{RedkiteError, Result};
use serde_json::Value;

fn materialize(raw: Value, request: &ApiRequest) -> Materialized {
    let mut out = Materializer::default().with_warnings(false).populate(raw);
    out.set_listing_uri(&request.uri);
    out
}

/// Listing endpoint over posts `p0..p{total-1}`
///
/// Honors `limit` and `after=t3_p{i}` like the real service.
pub struct PagedSource {
    total: usize,
    requests: Mutex<Vec<ApiRequest>>,
}

impl PagedSource {
    pub fn new(total: usize) -> Self {
        Self { total, requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Requester for PagedSource {
    async fn request(&self, request: ApiRequest) -> Result<Materialized> {
        self.requests.lock().push(request.clone());

        let limit = request.query_value("limit").and_then(|l| l.parse().ok()).unwrap_or(25);
        let start = request
            .query_value("after")
            .and_then(|cursor| cursor.strip_prefix("t3_p"))
            .and_then(|i| i.parse::<usize>().ok())
            .map_or(0, |i| i + 1)
            .min(self.total);
        let end = (start + limit).min(self.total);
        let after = (end < self.total).then(|| format!("t3_p{}", end - 1));

        let raw = fixtures::listing(fixtures::posts(start, end - start), after.as_deref(), None);
        Ok(materialize(raw, &request))
    }
}

/// Replays canned response bodies in order
pub struct ScriptedRequester {
    responses: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedRequester {
    pub fn new(responses: Vec<Value>) -> Self {
        Self { responses: Mutex::new(responses.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Requester for ScriptedRequester {
    async fn request(&self, request: ApiRequest) -> Result<Materialized> {
        self.requests.lock().push(request.clone());
        let raw = self
            .responses
            .lock()
            .pop_front()
            .ok_or_else(|| RedkiteError::Network(format!("no scripted response for {request}")))?;
        Ok(materialize(raw, &request))
    }
}
