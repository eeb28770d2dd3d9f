//! Configuration System
//!
//! Layered configuration for embedders: logging setup plus the capability
//! list contexts are created with by default. Supports a base file, an
//! environment-specific file and environment variable overrides.

use crate::capability::BUILTINS;
use crate::error::ContextError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Context creation settings
    #[serde(default)]
    pub context: ContextConfig,
}

/// Context creation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Capabilities every configured context joins
    #[serde(default)]
    pub default_capabilities: Vec<String>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyCapability(usize),
    DuplicateCapability(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyCapability(index) => {
                write!(f, "Capability #{} has an empty name", index)
            }
            ValidationError::DuplicateCapability(name) => {
                write!(f, "Capability '{}' is listed more than once", name)
            }
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ContextConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for (index, name) in self.default_capabilities.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(ValidationError::EmptyCapability(index));
            } else if !seen.insert(name.as_str()) {
                errors.push(ValidationError::DuplicateCapability(name.clone()));
            }
        }
        errors
    }

    /// Configured names that no built-in capability answers to. Embedders
    /// registering their own capabilities may legitimately have some.
    pub fn unknown_to_builtins(&self) -> Vec<&str> {
        self.default_capabilities
            .iter()
            .map(String::as_str)
            .filter(|name| !BUILTINS.iter().any(|builtin| builtin == name))
            .collect()
    }
}

impl ZoneConfig {
    /// Render as TOML in the layout `ConfigLoader` reads back.
    pub fn to_toml(&self) -> Result<String, ContextError> {
        toml::to_string_pretty(self)
            .map_err(|e| ContextError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.context.validate();

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "Invalid format '{}'",
                self.logging.format
            )));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr" | "file") {
            errors.push(ValidationError::Logging(format!(
                "Invalid output '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
