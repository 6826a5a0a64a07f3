//! Validation of collaborator output.

pub mod output_validator;

pub use output_validator::{
    ActionOutputValidator, ContentGuard, ParsedDecision, ValidationError, MAX_REPLY_CHARS,
};
