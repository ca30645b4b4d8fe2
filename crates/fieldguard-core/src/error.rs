//! Domain-level error types.

use thiserror::Error;

/// Policy validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Key prefix must not be empty")]
    EmptyPrefix,

    #[error("Key prefix must not contain ':' (got {0:?})")]
    InvalidPrefix(String),

    #[error("Quota must admit at least one request")]
    ZeroQuota,

    #[error("Window duration must be at least one millisecond")]
    ZeroWindow,

    #[error("Window duration {0:?} exceeds the longest supported window")]
    WindowTooLong(std::time::Duration),
}
