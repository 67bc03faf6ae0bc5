//! # keygrant authentication
//!
//! Credential issuance, the RFC 7523 JWT-bearer grant and tenant-scoped
//! access token verification.
//!
//! This crate provides:
//! - **Credential issuance**: Ed25519 key pairs registered under their RFC 7638 thumbprint,
//!   exported as a JWK bundle carrying the store-assigned identity
//! - **Grant authority**: exchanges a signed bearer assertion for a service-signed access token
//!   scoped to the credential's tenant
//! - **Token verification**: checks an `Authorization: Bearer` header and returns the tenant
//!
//! ## Flow
//!
//! ```text
//!  admin                     client                      resource server
//!    │ CredentialIssuer.issue   │                              │
//!    │──────► KeyStore.add_key  │                              │
//!    │ bundle ─────────────────►│                              │
//!    │                          │ sign_assertion               │
//!    │                          │──► GrantAuthority.exchange   │
//!    │                          │    (KeyReader.get_key)       │
//!    │                          │◄── access_token              │
//!    │                          │ Authorization: Bearer ──────►│ TokenVerifier
//!    │                          │                              │ → tenant id
//! ```
//!
//! ## Security
//!
//! - Only EdDSA is accepted; `none` and symmetric algorithms are rejected
//! - The tenant in an access token always comes from the key store record
//! - Rejections surface as a single `Not authorized` error; the cause is only
//!   available through [`std::error::Error::source`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use keygrant_authn::{
//!     AuthConfig, Credential, CredentialIssuer, Ed25519Generator, GrantAuthority,
//!     ServiceSigningKey, TokenVerifier,
//! };
//! use keygrant_storage::{MemoryKeyStore, TenantDescriptor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryKeyStore::new());
//! let service_key = ServiceSigningKey::generate();
//! let config = AuthConfig::default();
//!
//! let issuer = CredentialIssuer::new(store.clone());
//! let authority = GrantAuthority::new(store, service_key.clone(), config.clone());
//! let verifier = TokenVerifier::new(service_key.verifying_key(), &config);
//!
//! let tenant = TenantDescriptor::builder()
//!     .tenant_id("fake-tenant")
//!     .tenant_name("name")
//!     .application_name("application")
//!     .created_by("darren")
//!     .build();
//! let issued = issuer.issue(tenant, &Ed25519Generator).await?;
//!
//! // Client side
//! let credential = Credential::from_bundle(&issued.bundle)?;
//! let assertion = credential.sign_assertion().audience(config.audience()).call()?;
//! let body = format!(
//!     "grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer&assertion={assertion}"
//! );
//! let response = authority.exchange(body.as_bytes()).await?;
//!
//! // Resource server side
//! let header = format!("Bearer {}", response.access_token);
//! let tenant_id = verifier.verify_header(Some(&header))?;
//! assert_eq!(tenant_id.as_str(), "fake-tenant");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// JWT claim sets.
pub mod claims;
/// Service configuration.
pub mod config;
/// Credential issuance.
pub mod credential;
/// Authentication error types.
pub mod error;
/// JWT-bearer grant.
pub mod grant;
/// JWT encoding, decoding and key conversion.
pub mod jwt;
/// Service key pair.
pub mod service_key;
/// Shared test helpers.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Algorithm and claim validation.
pub mod validation;
/// Access token verification.
pub mod verify;

// Re-export key types for convenience
pub use claims::{TENANT_SCOPE_PREFIX, TokenResponse};
pub use config::AuthConfig;
pub use credential::{
    Credential, CredentialIssuer, Ed25519Generator, IssuedCredential, KeyGenerator, PrivateKey,
    SeededGenerator, thumbprint,
};
pub use error::{AuthError, ConfigError, Rejection, Result};
pub use grant::{Authorization, GrantAuthority, GrantRequest, JWT_BEARER_GRANT_TYPE};
pub use service_key::{ServiceSigningKey, ServiceVerifyingKey};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
pub use verify::{TokenVerifier, bearer_token};
