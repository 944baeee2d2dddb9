//! # Redkite Domain
//!
//! Plain data shared by every other redkite crate.
//!
//! This crate contains:
//! - The error taxonomy and `Result` alias
//! - Client configuration and credentials
//! - Wire constants and the kind-tag registry
//!
//! ## Architecture
//! - No dependencies on other redkite crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod kinds;

// Re-export commonly used items
pub use config::{ClientConfig, Credentials};
pub use errors::{ErrorCategory, RedkiteError, Result};
