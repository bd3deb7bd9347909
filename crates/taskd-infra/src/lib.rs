//! taskd infrastructure: process-level concerns shared by binaries.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
