use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid ID format: {message}")]
    InvalidId { message: String },

    /// No active key matches the presented secret
    #[error("Invalid API key: {message}")]
    InvalidKey { message: String },

    /// The key exists but targets a different model
    #[error("API key mismatch: {message}")]
    KeyMismatch { message: String },

    /// Storage did not answer in time or the connection failed; safe to retry
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    pub fn key_mismatch(message: impl Into<String>) -> Self {
        Self::KeyMismatch {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// The bare message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::Forbidden { message }
            | Self::Unauthenticated { message }
            | Self::InvalidState { message }
            | Self::Conflict { message }
            | Self::Validation { message }
            | Self::InvalidId { message }
            | Self::InvalidKey { message }
            | Self::KeyMismatch { message }
            | Self::Unavailable { message }
            | Self::Storage { message }
            | Self::Configuration { message }
            | Self::Internal { message } => message,
        }
    }
}
