//! Authenticated API access
//!
//! This module provides the request pipeline for the remote API. It handles
//! grant exchanges, token refresh, rate limiting, pacing and retries, and
//! materializes every response before handing it back.
//!
//! # Architecture
//!
//! - All network I/O goes through the [`Transport`](crate::http::Transport)
//!   port
//! - One [`TokenManager`] per client; concurrent refreshes collapse into one
//! - `ApiClient` implements the core `Requester` port, so listings and stubs
//!   fetch through the same gates

pub mod auth;
pub mod client;
pub mod token_manager;

pub use auth::{auth_url, AuthUrlOptions, TokenEndpoint};
pub use client::{ApiClient, ApiClientBuilder};
pub use token_manager::{BearerToken, TokenManager, TokenSource, UNMANAGED_TOKEN_LIFETIME};
