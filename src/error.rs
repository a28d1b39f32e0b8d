//! Error types for Bramble.

use thiserror::Error;

/// Resolution error type.
///
/// `InvalidConfiguration` and `WeightNotFound` are user-correctable and carry
/// the conflicting values (and valid alternatives, where known) in their
/// message. `Internal` indicates a resolver invariant was violated and is
/// never expected to reach an end user.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration is inconsistent, incomplete, or unsatisfiable
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A weight file could not be located locally or remotely
    #[error("weight file not found: {0}")]
    WeightNotFound(String),

    /// A resolver invariant was violated
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Bramble operations.
pub type Result<T> = std::result::Result<T, Error>;
