//!
//! This crate defines general utility functions.
//!
//! This crate does not use unsafe code.

#![forbid(unsafe_code)]

pub mod random_test;
pub mod timing;

pub use random_test::*;
pub use timing::*;
