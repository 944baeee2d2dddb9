//! Rate-limit and pacing gates
//!
//! The quota gate trusts the `x-ratelimit-*` headers of the most recent
//! response. The pacing gate hands out dispatch slots from a watermark that
//! every caller advances, so two dispatches are never closer together than
//! the configured delay.

use std::time::Duration;

use parking_lot::Mutex;
use redkite_domain::constants::{RATELIMIT_REMAINING_HEADER, RATELIMIT_RESET_HEADER};
use redkite_domain::{RedkiteError, Result};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::http::TransportResponse;

/// Quota as last reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuotaSnapshot {
    /// Requests left in the current window
    pub remaining: Option<f64>,
    /// When the current window ends
    pub reset_at: Option<Instant>,
}

impl QuotaSnapshot {
    fn exhausted_for(&self, now: Instant) -> Option<Duration> {
        let remaining = self.remaining?;
        let reset_at = self.reset_at?;
        (remaining < 1.0 && now < reset_at).then(|| reset_at - now)
    }
}

#[derive(Debug)]
struct GateState {
    quota: QuotaSnapshot,
    next_dispatch: Instant,
}

/// Shared gate state for one pipeline
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<GateState>,
    request_delay: Duration,
    wait_on_limit: bool,
    warnings: bool,
}

impl RateLimiter {
    pub fn new(request_delay: Duration, wait_on_limit: bool) -> Self {
        Self {
            state: Mutex::new(GateState {
                quota: QuotaSnapshot::default(),
                next_dispatch: Instant::now(),
            }),
            request_delay,
            wait_on_limit,
            warnings: true,
        }
    }

    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.warnings = enabled;
        self
    }

    /// Fail or wait while the quota is exhausted
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::RateLimited`] when the quota is spent, the
    /// window is still open and waiting is disabled.
    pub async fn check_quota(&self) -> Result<()> {
        let exhausted = {
            let state = self.state.lock();
            state.quota.exhausted_for(Instant::now())
        };
        let Some(reset_in) = exhausted else {
            return Ok(());
        };

        if !self.wait_on_limit {
            return Err(RedkiteError::RateLimited { reset_in });
        }
        if self.warnings {
            warn!(
                wait_ms = reset_in.as_millis() as u64,
                "Rate limit exhausted; waiting for the window to reset"
            );
        }
        tokio::time::sleep(reset_in).await;
        Ok(())
    }

    /// Wait for this caller's dispatch slot
    pub async fn pace(&self) {
        if self.request_delay.is_zero() {
            return;
        }
        let slot = {
            let mut state = self.state.lock();
            let slot = state.next_dispatch.max(Instant::now());
            state.next_dispatch = slot + self.request_delay;
            slot
        };
        if slot > Instant::now() {
            debug!(delay_ms = (slot - Instant::now()).as_millis() as u64, "pacing request");
            sleep_until(slot).await;
        }
    }

    /// Update the quota from response headers
    ///
    /// Responses without the headers leave the previous snapshot untouched.
    pub fn record(&self, response: &TransportResponse) {
        let remaining = response
            .header(RATELIMIT_REMAINING_HEADER)
            .and_then(|value| value.trim().parse::<f64>().ok());
        let reset_secs = response
            .header(RATELIMIT_RESET_HEADER)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0);

        if remaining.is_none() && reset_secs.is_none() {
            return;
        }
        let mut state = self.state.lock();
        if remaining.is_some() {
            state.quota.remaining = remaining;
        }
        if let Some(secs) = reset_secs {
            state.quota.reset_at = Some(Instant::now() + Duration::from_secs_f64(secs));
        }
        debug!(remaining = ?state.quota.remaining, "rate limit updated");
    }

    pub fn quota(&self) -> QuotaSnapshot {
        self.state.lock().quota
    }

    /// Requests left in the current window, if known
    pub fn remaining(&self) -> Option<f64> {
        self.quota().remaining
    }

    /// Time until the current window resets, if known
    pub fn reset_in(&self) -> Option<Duration> {
        self.quota().reset_at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}
