//! # DBOS Config
//!
//! Configuration management for the DBOS workflow scheduler: the TOML schema,
//! a loader with environment substitution, executor identity and validation.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
