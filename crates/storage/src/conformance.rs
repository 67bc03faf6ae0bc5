//! Conformance test suite for [`KeyStore`] implementations.
//!
//! Each function checks one aspect of the key store contract. Any backend,
//! in-memory or networked, can run the same suite to show it honours the
//! atomic-add and consistent-read guarantees the grant flow relies on.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each conformance function with a
//! fresh store instance:
//!
//! ```no_run
//! use keygrant_storage::conformance;
//! use keygrant_storage::keys::MemoryKeyStore;
//!
//! #[tokio::test]
//! async fn get_returns_none_for_missing_key() {
//!     conformance::get_returns_none_for_missing_key(&MemoryKeyStore::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Functions | Contract aspect |
//! |----------|-----------|-----------------|
//! | Lookup | 2 tests | `get_key` absent/present semantics |
//! | Add | 3 tests | Conflict on duplicates, unique identities |
//! | Delete | 3 tests | Revocation and idempotence |
//! | Concurrent | 2 tests | Exactly one winner, no identity reuse |

use std::{collections::HashSet, sync::Arc};

use crate::{
    assert_storage_error,
    error::StorageError,
    keys::KeyStore,
    testutil::{make_key_id, make_new_key},
    types::KeyId,
};

// ============================================================================
// Lookup
// ============================================================================

/// `get_key` on an unregistered key returns `Ok(None)`.
pub async fn get_returns_none_for_missing_key<S: KeyStore>(store: &S) {
    let result = store.get_key(&KeyId::from("nonexistent")).await;
    assert!(result.is_ok(), "get_key should not error on missing key: {result:?}");
    assert!(result.expect("checked above").is_none(), "missing key should return None");
}

/// `add_key` then `get_key` returns every stored field.
pub async fn add_then_get_returns_record<S: KeyStore>(store: &S) {
    let kid = KeyId::from("conf-roundtrip");
    let identity = store
        .add_key(&kid, make_new_key("fake-tenant", "pk-roundtrip"))
        .await
        .expect("add_key should succeed");

    let record =
        store.get_key(&kid).await.expect("get_key should succeed").expect("key should exist");
    assert_eq!(record.key_id, kid);
    assert_eq!(record.identity_id, identity);
    assert_eq!(record.tenant.tenant_id.as_str(), "fake-tenant");
    assert_eq!(record.tenant.tenant_name, "name");
    assert_eq!(record.tenant.application_name, "application");
    assert_eq!(record.tenant.created_by, "darren");
    assert_eq!(record.public_key, "pk-roundtrip");
    assert_eq!(record.algorithm, "EdDSA");
}

// ============================================================================
// Add
// ============================================================================

/// A second `add_key` for the same key ID is a `Conflict` and leaves the
/// first record untouched.
pub async fn add_duplicate_conflicts<S: KeyStore>(store: &S) {
    let kid = KeyId::from("conf-dup");
    let identity =
        store.add_key(&kid, make_new_key("tenant-a", "pk-a")).await.expect("first add");

    let result = store.add_key(&kid, make_new_key("tenant-b", "pk-b")).await;
    assert_storage_error!(result, Conflict, "duplicate add must conflict");

    let record = store.get_key(&kid).await.expect("get").expect("original must remain");
    assert_eq!(record.identity_id, identity, "identity must be unchanged");
    assert_eq!(record.tenant.tenant_id.as_str(), "tenant-a", "tenant must be unchanged");
    assert_eq!(record.public_key, "pk-a", "public key must be unchanged");
}

/// Every successful `add_key` allocates a distinct identity.
pub async fn add_allocates_unique_identities<S: KeyStore>(store: &S) {
    let mut seen = HashSet::new();
    for i in 0..20 {
        let identity = store
            .add_key(&make_key_id("conf-unique", i), make_new_key("t", &format!("pk-{i}")))
            .await
            .expect("add_key");
        assert!(seen.insert(identity.clone()), "identity {identity} allocated twice");
    }
}

/// Conflict errors name the offending key ID.
pub async fn conflict_reports_key_id<S: KeyStore>(store: &S) {
    let kid = KeyId::from("conf-named");
    store.add_key(&kid, make_new_key("t", "pk")).await.expect("first add");

    match store.add_key(&kid, make_new_key("t", "pk")).await {
        Err(StorageError::Conflict { key_id }) => assert_eq!(key_id, kid.as_str()),
        other => panic!("expected Conflict, got: {other:?}"),
    }
}

// ============================================================================
// Delete
// ============================================================================

/// `delete_key` removes a registered key.
pub async fn delete_removes_key<S: KeyStore>(store: &S) {
    let kid = KeyId::from("conf-delete");
    store.add_key(&kid, make_new_key("t", "pk")).await.expect("add");
    store.delete_key(&kid).await.expect("delete");
    let record = store.get_key(&kid).await.expect("get after delete");
    assert!(record.is_none(), "key should be gone after delete");
}

/// `delete_key` on an unregistered key is a silent no-op.
pub async fn delete_missing_is_noop<S: KeyStore>(store: &S) {
    let result = store.delete_key(&KeyId::from("ghost")).await;
    assert!(result.is_ok(), "delete of missing key should not error: {result:?}");
}

/// A deleted key ID can be registered again and receives a fresh identity.
pub async fn readd_after_delete_gets_new_identity<S: KeyStore>(store: &S) {
    let kid = KeyId::from("conf-readd");
    let first = store.add_key(&kid, make_new_key("t", "pk")).await.expect("first add");
    store.delete_key(&kid).await.expect("delete");

    let second = store.add_key(&kid, make_new_key("t", "pk")).await.expect("re-add");
    assert_ne!(first, second, "identities must never be reused");
}

// ============================================================================
// Concurrent
// ============================================================================

/// Concurrent `add_key` calls for one key ID: exactly one wins.
pub async fn concurrent_add_exactly_one_winner<S: KeyStore + 'static>(store: Arc<S>) {
    let kid = KeyId::from("conf-race");

    let mut handles = Vec::new();
    for i in 0u32..16 {
        let store = Arc::clone(&store);
        let kid = kid.clone();
        handles.push(tokio::spawn(async move {
            store.add_key(&kid, make_new_key(&format!("tenant-{i}"), "pk")).await
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0u32;
    for handle in handles {
        match handle.await.expect("task join") {
            Ok(identity) => winners.push(identity),
            Err(StorageError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one add should succeed");
    assert_eq!(conflicts, 15, "all other adds should conflict");

    let record = store.get_key(&kid).await.expect("get").expect("winner must be stored");
    assert_eq!(record.identity_id, winners[0]);
}

/// Concurrent adds of distinct keys never share an identity.
pub async fn concurrent_adds_get_distinct_identities<S: KeyStore + 'static>(store: Arc<S>) {
    let mut handles = Vec::new();
    for i in 0..50 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .add_key(&make_key_id("conf-par", i), make_new_key("t", &format!("pk-{i}")))
                .await
                .expect("concurrent add")
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let identity = handle.await.expect("task join");
        assert!(seen.insert(identity.clone()), "identity {identity} allocated twice");
    }
    assert_eq!(seen.len(), 50);
}
