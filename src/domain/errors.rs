use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorCategory {
    Configuration,
    Resource,
    Provider,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("configuration error: {message}")]
    Config { message: String },
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("missing resource: {message}")]
    MissingResource { message: String },
    #[error("provider authentication failed")]
    Auth,
    #[error("provider rate limit reached")]
    RateLimited,
    #[error("provider request timed out")]
    Timeout,
    #[error("provider returned an invalid response: {message}")]
    InvalidResponse { message: String },
    #[error("provider transport failed: {message}")]
    Transport { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RunError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn missing_resource(message: impl Into<String>) -> Self {
        Self::MissingResource {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> RunErrorCategory {
        match self {
            Self::Config { .. } | Self::Validation { .. } => RunErrorCategory::Configuration,
            Self::MissingResource { .. } => RunErrorCategory::Resource,
            Self::Auth
            | Self::RateLimited
            | Self::Timeout
            | Self::InvalidResponse { .. }
            | Self::Transport { .. } => RunErrorCategory::Provider,
            Self::Internal { .. } => RunErrorCategory::Internal,
        }
    }

    /// Whether a batch retry pass may re-attempt a task that failed with this
    /// error. Configuration and missing-file failures are deterministic, so
    /// only failures that crossed the network qualify.
    pub fn is_retryable(&self) -> bool {
        self.category() == RunErrorCategory::Provider
    }
}
