//! fwinspect-core
//!
//! Core library for inspecting flashed firmware images.
//!
//! Given a raw image (and optionally the ELF it was built from) this crate
//! reports section usage, the Cortex-M vector table, keyword-matched strings,
//! MD5/SHA-256 digests and flash utilisation. Frontends only render the
//! resulting [`model::AnalysisReport`].

pub mod config;
pub mod model;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
