//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration sources could not be read or deserialized.
    #[display("unable to load configuration")]
    Load,
    /// No default configuration location exists on this platform.
    #[display("no configuration directory available")]
    NoConfigDirectory,
    /// A field required by the selected backend is absent or empty.
    #[display("missing required configuration field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// A field is present but its value cannot be used.
    #[display("invalid configuration value for field: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Reloading only helps if someone fixed the file in the meantime.
        matches!(self, Self::Load)
    }
}
