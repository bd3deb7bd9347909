//! Tracing initialization
//!
//! Installs a `tracing-subscriber` registry filtered by `RUST_LOG`, writing either
//! human-readable or JSON lines depending on `TASKD_LOG_FORMAT`.

mod init;

pub use init::{init_telemetry, shutdown_telemetry, LogFormat};
