//! Key store capabilities and the in-memory reference backend.
//!
//! Access is split into two capability traits:
//!
//! - [`KeyReader`]: lookup only. This is all the grant endpoint needs.
//! - [`KeyStore`]: lookup plus registration and revocation. Only credential
//!   issuance needs it.
//!
//! A grant-side deployment handed an `Arc<dyn KeyReader>` has no way to
//! change key state.
//!
//! # Consistency Requirements
//!
//! Every backend must guarantee:
//!
//! - **Atomic add**: concurrent [`add_key`](KeyStore::add_key) calls for the same key ID resolve to
//!   exactly one success. All others observe [`StorageError::Conflict`].
//! - **Consistent read**: once `add_key` has returned, [`get_key`](KeyReader::get_key) for that key
//!   ID never reports it absent (until it is deleted).
//!
//! # Usage
//!
//! ```
//! use keygrant_storage::keys::{KeyReader, KeyStore, MemoryKeyStore, NewKey, TenantDescriptor};
//! use keygrant_storage::KeyId;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = MemoryKeyStore::new();
//! let key = NewKey::builder()
//!     .tenant(
//!         TenantDescriptor::builder()
//!             .tenant_id("fake-tenant")
//!             .tenant_name("name")
//!             .application_name("application")
//!             .created_by("darren")
//!             .build(),
//!     )
//!     .public_key("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo")
//!     .algorithm("EdDSA")
//!     .build();
//!
//! let kid = KeyId::from("kid-1");
//! let identity = store.add_key(&kid, key).await.unwrap();
//!
//! let record = store.get_key(&kid).await.unwrap().unwrap();
//! assert_eq!(record.identity_id, identity);
//! # });
//! ```

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::{
    error::{StorageError, StorageResult},
    keys::{KeyRecord, NewKey},
    types::{IdentityId, KeyId},
};

/// Read-only access to registered keys.
#[async_trait]
pub trait KeyReader: Send + Sync {
    /// Looks up a key record by its canonical key ID.
    ///
    /// # Arguments
    ///
    /// * `key_id` - The key identifier to look up
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` if the key is registered
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` if the backend could not answer
    async fn get_key(&self, key_id: &KeyId) -> StorageResult<Option<KeyRecord>>;
}

/// Full key lifecycle access: registration, lookup and revocation.
#[async_trait]
pub trait KeyStore: KeyReader {
    /// Registers a new key and allocates its identity.
    ///
    /// Existing records are never overwritten. The existence check, identity
    /// allocation and write happen as one atomic step.
    ///
    /// # Arguments
    ///
    /// * `key_id` - Canonical key ID of `key`
    /// * `key` - Public key and tenant metadata to persist
    ///
    /// # Returns
    ///
    /// The store-assigned [`IdentityId`], unique across all keys ever added.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A record with the same `key_id` already exists ([`StorageError::Conflict`])
    /// - The storage backend is unavailable
    async fn add_key(&self, key_id: &KeyId, key: NewKey) -> StorageResult<IdentityId>;

    /// Removes a key, revoking the credential.
    ///
    /// Deleting a key that is not registered succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage backend fails.
    async fn delete_key(&self, key_id: &KeyId) -> StorageResult<()>;
}

#[async_trait]
impl<T: KeyReader + ?Sized> KeyReader for Arc<T> {
    async fn get_key(&self, key_id: &KeyId) -> StorageResult<Option<KeyRecord>> {
        (**self).get_key(key_id).await
    }
}

#[async_trait]
impl<T: KeyStore + ?Sized> KeyStore for Arc<T> {
    async fn add_key(&self, key_id: &KeyId, key: NewKey) -> StorageResult<IdentityId> {
        (**self).add_key(key_id, key).await
    }

    async fn delete_key(&self, key_id: &KeyId) -> StorageResult<()> {
        (**self).delete_key(key_id).await
    }
}

/// In-memory implementation of [`KeyStore`].
///
/// Keys live in a hash map behind a [`parking_lot::RwLock`]; identities come
/// from a counter guarded by the same lock, so identities are decimal strings
/// starting at `"1"`. Nothing is persisted between restarts.
///
/// Clones share the same underlying table.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    keys: HashMap<KeyId, KeyRecord>,
    /// Last identity handed out; 0 means none yet.
    last_identity: u64,
}

impl MemoryKeyStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().keys.len()
    }

    /// Returns `true` if no keys are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().keys.is_empty()
    }
}

#[async_trait]
impl KeyReader for MemoryKeyStore {
    #[tracing::instrument(skip(self, key_id), fields(key_id = %key_id))]
    async fn get_key(&self, key_id: &KeyId) -> StorageResult<Option<KeyRecord>> {
        Ok(self.state.read().keys.get(key_id).cloned())
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    #[tracing::instrument(skip(self, key_id, key), fields(key_id = %key_id, tenant_id = %key.tenant.tenant_id))]
    async fn add_key(&self, key_id: &KeyId, key: NewKey) -> StorageResult<IdentityId> {
        let mut state = self.state.write();

        if state.keys.contains_key(key_id) {
            return Err(StorageError::conflict(key_id.as_str()));
        }

        let next = state
            .last_identity
            .checked_add(1)
            .ok_or_else(|| StorageError::internal("identity counter exhausted"))?;
        let identity_id = IdentityId::from(next.to_string());

        let record = KeyRecord::new(key_id.clone(), identity_id.clone(), key, Utc::now());
        state.keys.insert(key_id.clone(), record);
        state.last_identity = next;

        tracing::debug!(identity_id = %identity_id, "Registered key");
        Ok(identity_id)
    }

    #[tracing::instrument(skip(self, key_id), fields(key_id = %key_id))]
    async fn delete_key(&self, key_id: &KeyId) -> StorageResult<()> {
        if self.state.write().keys.remove(key_id).is_none() {
            tracing::debug!("Delete of unregistered key ignored");
        }
        Ok(())
    }
}
