use thiserror::Error;

/// Local validation failures raised by the adaptive core.
///
/// None of these are retryable: the caller has to fix the input and resubmit.
/// When one is returned, no part of the update has been applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdaptiveError {
    #[error("invalid interaction: {0}")]
    InvalidInteraction(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid student state: {0}")]
    InvalidState(String),
}

impl AdaptiveError {
    pub fn interaction(msg: impl Into<String>) -> Self {
        Self::InvalidInteraction(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

pub type AdaptiveResult<T> = Result<T, AdaptiveError>;
