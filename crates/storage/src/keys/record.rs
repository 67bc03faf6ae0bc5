//! Stored key records and the tenant metadata attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{IdentityId, KeyId, TenantId};

/// Ownership metadata recorded with every credential.
///
/// # Example
///
/// ```
/// use keygrant_storage::keys::TenantDescriptor;
///
/// let tenant = TenantDescriptor::builder()
///     .tenant_id("fake-tenant")
///     .tenant_name("name")
///     .application_name("application")
///     .created_by("darren")
///     .build();
///
/// assert_eq!(tenant.tenant_id.as_str(), "fake-tenant");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct TenantDescriptor {
    /// Tenant the credential is scoped to.
    #[builder(into)]
    pub tenant_id: TenantId,

    /// Human-readable tenant name.
    #[builder(into)]
    pub tenant_name: String,

    /// Application the credential was issued for.
    #[builder(into)]
    pub application_name: String,

    /// Operator or automation that requested the credential.
    #[builder(into)]
    pub created_by: String,
}

/// A key registration request, before the store has assigned an identity.
///
/// Only public key material is ever handed to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct NewKey {
    /// Owner of the key.
    pub tenant: TenantDescriptor,

    /// Public key, base64url-encoded without padding.
    ///
    /// For Ed25519 this is the raw 32-byte point, which encodes to 43
    /// characters.
    #[builder(into)]
    pub public_key: String,

    /// JWS algorithm the key signs with (e.g. `EdDSA`).
    #[builder(into)]
    pub algorithm: String,
}

/// A registered credential as persisted by a key store.
///
/// Records are immutable once written. The only lifecycle transition is
/// deletion, which revokes the credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyRecord {
    /// Canonical key ID (the public key's RFC 7638 thumbprint).
    pub key_id: KeyId,

    /// Identity assigned by the store when the key was added.
    pub identity_id: IdentityId,

    /// Owner of the key.
    pub tenant: TenantDescriptor,

    /// Public key, base64url-encoded without padding.
    pub public_key: String,

    /// JWS algorithm the key signs with.
    pub algorithm: String,

    /// When the key was registered.
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Builds the stored record for a registration that has been assigned
    /// `identity_id`.
    #[must_use]
    pub fn new(
        key_id: KeyId,
        identity_id: IdentityId,
        key: NewKey,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key_id,
            identity_id,
            tenant: key.tenant,
            public_key: key.public_key,
            algorithm: key.algorithm,
            created_at,
        }
    }

    /// Returns the tenant that owns this key.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant.tenant_id
    }
}
