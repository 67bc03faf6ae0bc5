//! Identifier newtypes shared by the key store and its consumers.
//!
//! Key IDs, identity IDs and tenant IDs are all strings on the wire. Wrapping
//! each in its own type makes passing a [`KeyId`] where an [`IdentityId`] is
//! expected a compile-time error.

/// Macro to define a newtype wrapper around `String` with standard trait
/// implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `String`
/// - Derives `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<String>`, `From<&str>` and `Into<String>`
/// - Implements `Display` and `AsRef<str>` over the inner value
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(
    /// Canonical key identifier.
    ///
    /// The base64url (no padding) encoding of the RFC 7638 SHA-256 thumbprint
    /// of a credential's public key. It is the primary key of the key store
    /// and the `kid` header of every bearer assertion signed with that key.
    ///
    /// # Examples
    ///
    /// ```
    /// use keygrant_storage::KeyId;
    ///
    /// let kid = KeyId::from("kPrK_qmxVWaYVA9wwBF6Iuo3vVzz7TxHCTwXBygrS4k");
    /// assert_eq!(kid.as_str().len(), 43);
    /// ```
    KeyId
);

define_id!(
    /// Store-assigned identity of a registered credential.
    ///
    /// Allocated by the key store on a successful add and never reused. A
    /// bearer assertion must carry it as its `iss` claim.
    ///
    /// # Examples
    ///
    /// ```
    /// use keygrant_storage::IdentityId;
    ///
    /// let identity = IdentityId::from("17");
    /// assert_eq!(identity.to_string(), "17");
    /// ```
    IdentityId
);

define_id!(
    /// Tenant that owns a credential.
    ///
    /// Access tokens are scoped to exactly one tenant, always taken from the
    /// stored key record.
    TenantId
);
