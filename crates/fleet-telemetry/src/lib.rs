//! Logging setup shared by the fleet binaries.
//!
//! Everything logs through `tracing`. This crate only decides where those
//! events go: human-readable lines for a terminal, or JSON for a collector.

pub mod logging;
