//! Error types for the inline suggestion engine

use thiserror::Error;

/// Errors raised by the inline suggestion engine
#[derive(Debug, Error)]
pub enum InlineError {
    /// A caller broke an invariant of the model (for example accepting
    /// through an editor that does not own the model's buffer).
    #[error("Bug: {0}")]
    BugIndicating(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration validation error
    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    /// Provider error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Ghost text could not be constructed
    #[error("Invalid ghost text: {0}")]
    InvalidGhostText(String),

    /// A range or position does not exist in the buffer
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Word definition could not be compiled
    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl InlineError {
    /// Create a bug-indicating error
    pub fn bug(message: impl Into<String>) -> Self {
        InlineError::BugIndicating(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        InlineError::ConfigError(message.into())
    }

    /// Create a configuration validation error
    pub fn config_validation_error(message: impl Into<String>) -> Self {
        InlineError::ConfigValidationError(message.into())
    }

    /// Create a provider error
    pub fn provider_error(message: impl Into<String>) -> Self {
        InlineError::ProviderError(message.into())
    }

    /// Create an invalid ghost text error
    pub fn invalid_ghost_text(message: impl Into<String>) -> Self {
        InlineError::InvalidGhostText(message.into())
    }

    /// Create an invalid range error
    pub fn invalid_range(message: impl Into<String>) -> Self {
        InlineError::InvalidRange(message.into())
    }

    /// Whether this error signals a programming mistake rather than a
    /// recoverable condition
    pub fn is_bug(&self) -> bool {
        matches!(self, InlineError::BugIndicating(_))
    }
}

/// Result type for inline suggestion operations
pub type InlineResult<T> = Result<T, InlineError>;
