//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON log files with rotation (tracing-appender)
//! - JSON or pretty console output
//! - Secret scrubbing for collaborator error text

pub mod config;
pub mod logger;
pub mod secret_scrubbing;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use secret_scrubbing::SecretScrubber;
