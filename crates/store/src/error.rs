//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Driver, configuration and timer
//! errors are kept as children of the kind they were raised into.

use crate::cache::EntityKind;
use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend configuration could not be obtained or is unusable.
    #[display("invalid store configuration")]
    Config,
    /// Opening the store or the liveness check failed.
    #[display("unable to connect to store")]
    Connection,
    /// A query failed to execute or its rows could not be decoded.
    #[display("query failed")]
    Query,
    /// A round-trip to the store exceeded the configured timeout.
    #[display("store operation timed out")]
    Timeout,
    /// A filter referenced a name that does not exist in the store.
    #[display("unknown {_0}: {_1}")]
    UnknownEntity(#[error(not(source))] EntityKind, #[error(not(source))] String),
    /// A rank row referenced an identifier that is not in the entity cache.
    #[display("rank references missing {_0} with id {_1}")]
    MissingReference(#[error(not(source))] EntityKind, #[error(not(source))] i32),
    /// The store changed under the cache (an identifier now has another
    /// name). Reloading that kind in bulk resolves it.
    #[display("{_0} {_1} conflicts with a cached entry")]
    Conflict(#[error(not(source))] EntityKind, #[error(not(source))] String),
    /// A value read from the store is out of range for the domain type.
    #[display("invalid store data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}
