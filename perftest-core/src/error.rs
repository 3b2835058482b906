//! Result model error types

use thiserror::Error;

/// Result model result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Result model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A constructor argument was missing or not acceptable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A severity name or value outside the four defined levels
    #[error("Unknown result level '{0}'")]
    UnknownLevel(String),
}

impl CoreError {
    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
