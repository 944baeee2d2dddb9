//! OAuth 2.0 token and grant types
//!
//! The token lifecycle itself (single-flight refresh, invalidation) lives in
//! the infra crate's `TokenManager`; this module only holds the data it
//! trades in.

pub mod types;

pub use types::{
    duration_name, parse_token_response, GrantErrorResponse, GrantType, TokenResponse, TokenSet,
};
