//! Stage Common Utilities
//!
//! Shared infrastructure for all Stage crates:
//! - Error types and result aliases
//! - Timing utilities for per-stage export measurements
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timing;

pub use config::*;
pub use error::*;
pub use timing::*;
