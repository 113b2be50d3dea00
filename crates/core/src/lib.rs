//! panic-sites-core
//!
//! Core library for recovering Rust `core::panic::Location` records from
//! binaries without debug info, and tagging every instruction that references one.
//!
//! This crate defines the data model, the SQLite-backed analysis database, the
//! recovery pipeline and the binary image loader. The CLI is a thin frontend over
//! it; all substantive logic lives here so it is fully testable.

pub mod db;
pub mod model;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
