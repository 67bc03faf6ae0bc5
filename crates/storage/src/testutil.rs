//! Shared test utilities for key store testing.
//!
//! This module provides helpers for building key registrations and asserting
//! on [`StorageResult`] values. It is feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keygrant-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use keygrant_storage::testutil::{make_key_id, make_new_key, tenant_descriptor};
//! ```

use crate::{
    KeyId,
    error::{StorageError, StorageResult},
    keys::{MemoryKeyStore, NewKey, TenantDescriptor},
};

/// Builds a [`TenantDescriptor`] for `tenant_id` with fixed name, application
/// and creator fields.
#[must_use]
pub fn tenant_descriptor(tenant_id: &str) -> TenantDescriptor {
    TenantDescriptor::builder()
        .tenant_id(tenant_id)
        .tenant_name("name")
        .application_name("application")
        .created_by("darren")
        .build()
}

/// Create a deterministic key ID from a prefix and index.
///
/// Produces IDs like `"prefix-000042"`.
#[must_use]
pub fn make_key_id(prefix: &str, idx: usize) -> KeyId {
    KeyId::from(format!("{prefix}-{idx:06}"))
}

/// Builds a [`NewKey`] for `tenant_id` with a placeholder public key.
///
/// The public key is not a valid curve point; use this only where the store
/// contract, not signature verification, is under test.
#[must_use]
pub fn make_new_key(tenant_id: &str, public_key: &str) -> NewKey {
    NewKey::builder()
        .tenant(tenant_descriptor(tenant_id))
        .public_key(public_key)
        .algorithm("EdDSA")
        .build()
}

/// Create a [`MemoryKeyStore`] pre-populated with `count` keys.
///
/// Key IDs are produced by [`make_key_id`] with the given prefix, all owned
/// by `tenant_id`.
///
/// # Panics
///
/// Panics if any `add_key` operation fails (should not happen with fresh IDs).
pub async fn populated_store(prefix: &str, count: usize, tenant_id: &str) -> MemoryKeyStore {
    use crate::keys::KeyStore;

    let store = MemoryKeyStore::new();
    for i in 0..count {
        let key = make_new_key(tenant_id, &format!("pk-{i}"));
        store.add_key(&make_key_id(prefix, i), key).await.expect("populate add_key failed");
    }
    store
}

/// Asserts that a [`StorageResult`] is an `Err` matching the given
/// [`StorageError`] variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use keygrant_storage::assert_storage_error;
/// use keygrant_storage::error::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::conflict("kid"));
/// assert_storage_error!(result, Conflict);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "expected StorageError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::$variant { .. })),
            "{}: expected StorageError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Returns `true` if the result is a [`StorageError::Conflict`].
pub fn is_conflict<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Conflict { .. }))
}
