//! # realmkit Testkit
//!
//! Test utilities for realmkit.
//!
//! This crate provides:
//! - Fixtures: a Person/Dog schema and realms on a fresh in-memory engine
//! - Property-based test generators using proptest
//! - Golden snapshot helpers for marshaled metadata
//!
//! ## Usage
//!
//! ```rust
//! use realmkit_testkit::prelude::*;
//!
//! let test = TestRealm::sample();
//! test.begin_write().unwrap();
//! test.rollback().unwrap();
//! assert_eq!(test.transaction_calls().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod golden;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::golden::*;
}

pub use fixtures::*;
pub use generators::*;
pub use golden::*;
