//! # Redkite Infrastructure
//!
//! Adapters that put the core object model on the network.
//!
//! This crate contains:
//! - The authenticated request pipeline (`ApiClient`)
//! - Token lifecycle management and grant exchanges
//! - Rate-limit and pacing gates
//! - The reqwest-backed HTTP transport
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements the `Requester` port defined in `redkite-core`
//! - Depends on `redkite-common`, `redkite-domain` and `redkite-core`
//! - Contains all "impure" code (network, environment, files)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod rate_limit;

// Re-export commonly used items
pub use api::{auth_url, ApiClient, ApiClientBuilder, AuthUrlOptions, TokenManager};
pub use config::LoadedConfig;
pub use errors::InfraError;
pub use http::{HttpTransport, Transport, TransportRequest, TransportResponse};
pub use logging::init_tracing;
pub use rate_limit::RateLimiter;
