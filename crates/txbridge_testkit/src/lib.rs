//! # txbridge Testkit
//!
//! Test utilities for txbridge.
//!
//! This crate provides:
//! - A simulated native commit loop that drives the trampoline
//! - Test fixtures and CBOR document helpers
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use txbridge_testkit::prelude::*;
//!
//! with_test_bridge(field_document_bytes("A"), |bridge| {
//!     let outcome = bridge.run(set_field("B")).unwrap();
//!     assert!(outcome.is_committed());
//!     assert_eq!(bridge.committed_field(), "B");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod native;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::native::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use native::*;
pub use stress::*;
