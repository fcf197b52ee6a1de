//! Error types for TideDB

use thiserror::Error;

/// Result type alias for TideDB operations
pub type Result<T> = std::result::Result<T, TideError>;

/// TideDB error types
#[derive(Error, Debug)]
pub enum TideError {
    /// Caller-supplied value is out of contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A table property blob failed to decode
    #[error("Corrupt mapping blob: {0}")]
    CorruptBlob(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TideError {
    /// Check if error indicates corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, TideError::CorruptBlob(_))
    }
}
