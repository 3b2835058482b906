//! Tracing subscriber setup
//!
//! Diagnostics always go to stderr; stdout is reserved for rendered results.

pub mod init;

pub use init::{build_env_filter, init_logging, init_simple_tracing};
