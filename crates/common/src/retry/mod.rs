//! Retry timing primitives
//!
//! Only the delay schedule lives here. Deciding *whether* to retry belongs to
//! the request pipeline, which knows about verbs and status codes.

pub mod backoff;
pub mod constants;

pub use backoff::Backoff;
