//! Authentication error types.
//!
//! Callers at the protocol boundary only ever see the coarse [`AuthError`]
//! classes. The precise reason a token or assertion was refused is carried as
//! a [`Rejection`] inside [`AuthError::NotAuthorized`]. It is reachable through
//! [`std::error::Error::source`] for logging, but never rendered by
//! `AuthError`'s `Display`.

use std::sync::Arc;

use keygrant_storage::StorageError;
use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors returned by credential issuance, the grant endpoint and the token
/// verifier.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The request itself is malformed (wrong grant type, missing assertion,
    /// unparseable credential bundle).
    #[error("Invalid request: {0}")]
    Parse(String),

    /// Authentication failed.
    ///
    /// The display text is fixed. The cause is only available
    /// through the error source.
    #[error("Not authorized")]
    NotAuthorized(#[source] Rejection),

    /// The assertion asked for a token lifetime above the configured maximum.
    #[error("Requested duration of {requested}s exceeds the maximum of {maximum}s")]
    DurationExceeded {
        /// Lifetime requested by the client, in seconds.
        requested: i64,
        /// Configured ceiling, in seconds.
        maximum: i64,
    },

    /// The generated key ID is already registered.
    #[error("Key already registered: {key_id}")]
    Conflict {
        /// The colliding key ID.
        key_id: String,
    },

    /// Server-side failure: storage, serialization, signing, or a verified
    /// token that does not carry a tenant scope.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

/// Why a token or assertion was refused.
///
/// Wrapped by [`AuthError::NotAuthorized`]. Intended for logs and tests only.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Rejection {
    /// Authorization header absent or empty.
    #[error("Missing authorization header")]
    MissingHeader,

    /// Authorization header does not use the bearer scheme.
    #[error("Invalid authorization scheme")]
    InvalidScheme,

    /// Malformed JWT, cannot be decoded.
    #[error("Invalid token format: {0}")]
    InvalidTokenFormat(String),

    /// Algorithm not in the accepted list.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// JWT header has no `kid`.
    #[error("JWT header missing 'kid'")]
    MissingKeyId,

    /// No key is registered under the presented `kid`.
    #[error("Unknown key: {kid}")]
    UnknownKey {
        /// Key ID from the JWT header.
        kid: String,
    },

    /// Public key material could not be used for verification.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// A required claim is absent.
    #[error("Missing claim: {0}")]
    MissingClaim(&'static str),

    /// `iss` does not match.
    #[error("Invalid issuer: {0}")]
    InvalidIssuer(String),

    /// `aud` does not contain the expected audience.
    #[error("Invalid audience: {0}")]
    InvalidAudience(String),

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token not yet valid (`nbf` in the future).
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// `iat` is in the future.
    #[error("Token issued in the future")]
    IssuedInFuture,
}

impl AuthError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
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

    /// Returns the rejection cause if this is a `NotAuthorized` error.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::NotAuthorized(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Returns `true` if this is a `NotAuthorized` error.
    #[must_use]
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized(_))
    }
}

impl From<Rejection> for AuthError {
    fn from(rejection: Rejection) -> Self {
        AuthError::NotAuthorized(rejection)
    }
}

impl From<jsonwebtoken::errors::Error> for Rejection {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => Rejection::InvalidTokenFormat("Invalid JWT structure".into()),
            ErrorKind::InvalidSignature => Rejection::InvalidSignature,
            ErrorKind::ExpiredSignature => Rejection::TokenExpired,
            ErrorKind::ImmatureSignature => Rejection::TokenNotYetValid,
            ErrorKind::InvalidAudience => {
                Rejection::InvalidAudience("Audience validation failed".into())
            },
            ErrorKind::InvalidIssuer => Rejection::InvalidIssuer("Issuer validation failed".into()),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Rejection::UnsupportedAlgorithm("Algorithm not supported".into())
            },
            ErrorKind::InvalidKeyFormat => {
                Rejection::InvalidPublicKey("Key rejected by verifier".into())
            },
            _ => Rejection::InvalidTokenFormat(format!("JWT error: {err}")),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { key_id } => AuthError::Conflict { key_id },
            other => AuthError::internal_with_source("key store failure", other),
        }
    }
}

/// Invalid authentication configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required string field is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A value is below its allowed minimum.
    #[error("{field} = {value} is below the minimum of {min}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The smallest accepted value.
        min: String,
    },

    /// The default grant duration is longer than the maximum.
    #[error("default_grant_duration ({default}) exceeds max_grant_duration ({maximum})")]
    DefaultExceedsMaximum {
        /// Configured default.
        default: String,
        /// Configured maximum.
        maximum: String,
    },
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
