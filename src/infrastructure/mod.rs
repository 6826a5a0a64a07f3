//! Infrastructure layer module
//!
//! This module contains the adapters and ambient services around the engine:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Messages API client and the decision / variant-generation adapters
//! - Collaborator output validation
//! - Hashed-feature state embeddings
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod llm;
pub mod logging;
pub mod validators;
pub mod vector;
