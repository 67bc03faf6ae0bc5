//! Key store error types and result alias.
//!
//! Every key store backend maps its internal failures onto [`StorageError`].
//! A missing key is *not* an error: [`KeyReader::get_key`] reports it as
//! `Ok(None)`.
//!
//! # Error Types
//!
//! - [`StorageError::Conflict`] - The key ID is already registered
//! - [`StorageError::Connection`] - The backing store could not be reached
//! - [`StorageError::Serialization`] - A record could not be encoded or decoded
//! - [`StorageError::Internal`] - Backend-specific internal errors
//! - [`StorageError::Timeout`] - The backend did not answer in time
//!
//! # Example
//!
//! ```
//! use keygrant_storage::{KeyId, StorageError, StorageResult};
//!
//! fn register(key_id: &KeyId) -> StorageResult<()> {
//!     Err(StorageError::conflict(key_id.as_str()))
//! }
//! ```
//!
//! [`KeyReader::get_key`]: crate::keys::KeyReader::get_key

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for key store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during key store operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, so the
/// original backend failure stays visible to structured logging.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A record with this key ID already exists.
    ///
    /// Key IDs are derived from the public key, so a conflict means two
    /// registrations produced the same key material. Callers must not retry
    /// with the same record.
    #[error("Key already registered: {key_id}")]
    Conflict {
        /// The key ID that is already present.
        key_id: String,
    },

    /// Connection or network error.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal backend error.
    ///
    /// Catch-all for backend failures that don't fit other categories, such
    /// as an exhausted identity allocator.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a new `Conflict` error for the given key ID.
    #[must_use]
    pub fn conflict(key_id: impl Into<String>) -> Self {
        Self::Conflict { key_id: key_id.into() }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` if this error reports an already-registered key ID.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
