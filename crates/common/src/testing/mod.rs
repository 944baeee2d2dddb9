//! Testing utilities and helpers
//!
//! - **[`fixtures`]**: raw API payload builders
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "test-utils")]
//! # {
//! use redkite_common::testing::fixtures;
//!
//! let page = fixtures::listing(fixtures::posts(0, 3), Some("t3_p2"), None);
//! assert_eq!(page["data"]["children"].as_array().map(Vec::len), Some(3));
//! # }
//! ```

pub mod fixtures;
