//! # Redkite Core
//!
//! Response materialization and lazy listings - no transport code.
//!
//! This crate contains:
//! - The object model ([`Thing`], [`Content`], comment arenas)
//! - The kind-tag driven [`Materializer`] and its [`ObjectFactory`]
//! - [`Listing`] pagination and deferred-subtree expansion
//! - The [`Requester`] port the network pipeline plugs into
//!
//! ## Architecture Principles
//! - Only depends on `redkite-domain`
//! - No HTTP, clock or credential handling
//! - Every network round-trip goes through [`Requester`]

pub mod factory;
pub mod listing;
pub mod materializer;
pub mod model;
pub mod ports;

pub use factory::{Constructor, ObjectFactory};
pub use listing::{Amount, FetchOptions, Listing};
pub use materializer::{Materialized, Materializer};
pub use model::{
    Comment, CommentArena, CommentKey, Content, DeferredSubtree, Fields, ObjectKind, Thing,
};
pub use ports::{ApiRequest, HttpMethod, RequestBody, Requester};
