//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides configuration file management and the crate-wide error type.

pub mod config;
pub mod error;
