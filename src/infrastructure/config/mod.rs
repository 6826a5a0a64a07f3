//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading from `.tactician/`
//! - `TACTICIAN_*` environment variable overrides
//! - Validation of every tunable before an agent is built

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
