//! Foundation utilities shared across redkite crates.
//!
//! # Modules
//!
//! - `auth`: OAuth token set, token endpoint envelopes and grant variants
//! - `retry`: exponential backoff schedule with jitter
//! - `testing`: JSON fixture builders (enable the `test-utils` feature)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod retry;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types for convenience
// ------------------------
pub use auth::{GrantType, TokenSet};
pub use retry::Backoff;
