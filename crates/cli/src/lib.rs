//! Command implementations for the `fwinspect` binary.
//!
//! Kept in a library so the commands can be exercised directly from tests.

pub mod commands;

pub use commands::{absolutize, format_size, init_tracing, verbosity_filter};
