//! Shared test utilities for authentication testing.
//!
//! This module provides a [`Harness`] wiring an in-memory key store to an
//! issuer, a grant authority and a verifier, plus helpers for crafting
//! grant bodies and arbitrary (including hostile) JWTs. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keygrant-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keygrant_authn::testutil::{Harness, jwt_bearer_form};
//! ```

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use keygrant_storage::{MemoryKeyStore, testutil::tenant_descriptor};
use url::form_urlencoded;

use crate::{
    config::AuthConfig,
    credential::{CredentialIssuer, Ed25519Generator, IssuedCredential},
    grant::{GrantAuthority, JWT_BEARER_GRANT_TYPE},
    jwt,
    service_key::ServiceSigningKey,
    verify::TokenVerifier,
};

/// Builds a form-encoded JWT-bearer grant body for `assertion`.
pub fn jwt_bearer_form(assertion: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", JWT_BEARER_GRANT_TYPE)
        .append_pair("assertion", assertion)
        .finish()
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Signs arbitrary JSON claims with an EdDSA key given as a raw 32-byte
/// secret, optionally setting `kid`.
///
/// # Panics
///
/// Panics if encoding fails.
pub fn sign_claims(claims: &serde_json::Value, kid: Option<&str>, secret: &[u8; 32]) -> String {
    jwt::encode(claims, kid, &jwt::to_encoding_key(secret)).expect("Failed to encode test JWT")
}

/// In-memory wiring of every component.
#[derive(Debug, Clone)]
pub struct Harness {
    /// Shared key store.
    pub store: Arc<MemoryKeyStore>,
    /// Issuer writing to `store`.
    pub issuer: CredentialIssuer,
    /// Authority reading from `store`.
    pub authority: GrantAuthority,
    /// Verifier for tokens signed by `service_key`.
    pub verifier: TokenVerifier,
    /// The service key pair.
    pub service_key: ServiceSigningKey,
}

impl Harness {
    /// Builds a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(AuthConfig::default())
    }

    /// Builds a harness with `config` and a fresh service key.
    pub fn with_config(config: AuthConfig) -> Self {
        let store = Arc::new(MemoryKeyStore::new());
        let service_key = ServiceSigningKey::generate();
        let verifier = TokenVerifier::new(service_key.verifying_key(), &config);

        Self {
            issuer: CredentialIssuer::new(store.clone()),
            authority: GrantAuthority::new(store.clone(), service_key.clone(), config),
            verifier,
            store,
            service_key,
        }
    }

    /// Issues a credential for `tenant_id` with a random key.
    ///
    /// # Panics
    ///
    /// Panics if issuance fails.
    pub async fn issue(&self, tenant_id: &str) -> IssuedCredential {
        self.issuer
            .issue(tenant_descriptor(tenant_id), &Ed25519Generator)
            .await
            .expect("credential issuance")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Asserts that a [`Result<T, AuthError>`] is an `Err` matching the given [`AuthError`] variant.
///
/// Works with any `AuthError` variant. On failure, prints the expected variant
/// and the actual result for debugging.
///
/// [`AuthError`]: crate::error::AuthError
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keygrant_authn::assert_auth_error;
/// use keygrant_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::parse("bad grant"));
/// assert_auth_error!(result, Parse);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}

/// Asserts that a [`Result<T, AuthError>`] is `Err(AuthError::NotAuthorized)`
/// with the given [`Rejection`] variant as its cause.
///
/// [`Rejection`]: crate::error::Rejection
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keygrant_authn::assert_rejection;
/// use keygrant_authn::error::{AuthError, Rejection};
///
/// let result: Result<(), AuthError> = Err(Rejection::TokenExpired.into());
/// assert_rejection!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_rejection {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!(
                $result,
                Err($crate::error::AuthError::NotAuthorized($crate::error::Rejection::$variant { .. }))
            ),
            "expected NotAuthorized({}), got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!(
                $result,
                Err($crate::error::AuthError::NotAuthorized($crate::error::Rejection::$variant { .. }))
            ),
            "{}: expected NotAuthorized({}), got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
