//! Key store abstraction for keygrant credentials.
//!
//! This crate defines the persistence contract behind credential issuance and
//! the JWT-bearer grant: a table from canonical key ID to the public half of a
//! credential, the tenant that owns it, and a store-assigned identity.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  keygrant-authn                             │
//! │     CredentialIssuer (KeyStore)  GrantAuthority (KeyReader) │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  keygrant-storage                           │
//! │          KeyReader / KeyStore traits, KeyRecord             │
//! ├─────────────────────────────┬───────────────────────────────┤
//! │       MemoryKeyStore        │   external backends           │
//! │  (tests, single process)    │   (implement KeyStore)        │
//! └─────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use keygrant_storage::keys::{KeyReader, KeyStore, MemoryKeyStore, NewKey, TenantDescriptor};
//! use keygrant_storage::KeyId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryKeyStore::new();
//!     let tenant = TenantDescriptor::builder()
//!         .tenant_id("fake-tenant")
//!         .tenant_name("name")
//!         .application_name("application")
//!         .created_by("darren")
//!         .build();
//!     let key = NewKey::builder()
//!         .tenant(tenant)
//!         .public_key("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo")
//!         .algorithm("EdDSA")
//!         .build();
//!
//!     let kid = KeyId::from("kid-1");
//!     let identity = store.add_key(&kid, key).await?;
//!
//!     let record = store.get_key(&kid).await?;
//!     assert_eq!(record.map(|r| r.identity_id), Some(identity));
//!
//!     store.delete_key(&kid).await?;
//!     assert!(store.get_key(&kid).await?.is_none());
//!     Ok(())
//! }
//! ```
//!
//! # Implementing a Backend
//!
//! 1. Implement [`KeyReader`](keys::KeyReader) and [`KeyStore`](keys::KeyStore)
//! 2. Map backend-specific errors to [`StorageError`]
//! 3. Run the [`conformance`] suite against it
//!
//! See the [`keys`] module source for the in-memory reference implementation.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (record builders, assertion macros) and the
//!   `conformance` suite. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Conformance suite for key store backends.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
/// Key store error types.
pub mod error;
/// Key records and key store traits.
pub mod keys;
/// Shared test helpers.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Identifier newtypes.
pub mod types;

// Re-export primary types at crate root for convenience
pub use error::{BoxError, StorageError, StorageResult};
pub use keys::{KeyReader, KeyRecord, KeyStore, MemoryKeyStore, NewKey, TenantDescriptor};
pub use types::{IdentityId, KeyId, TenantId};
