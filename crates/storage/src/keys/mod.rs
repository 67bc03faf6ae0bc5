//! Credential key records and the stores that hold them.
//!
//! The store maps a canonical key ID to the public half of a credential plus
//! the tenant that owns it. Private key material never reaches this layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   add / delete   ┌─────────────┐   get    ┌─────────────────┐
//! │ Credential      │─────────────────►│  Key Store  │◄─────────│ Grant Authority │
//! │ Issuer          │                  │             │          │                 │
//! │ (KeyStore)      │                  │             │          │ (KeyReader)     │
//! └─────────────────┘                  └─────────────┘          └─────────────────┘
//! ```
//!
//! Use [`MemoryKeyStore`] for tests and single-process deployments.

mod record;
mod store;

pub use record::{KeyRecord, NewKey, TenantDescriptor};
pub use store::{KeyReader, KeyStore, MemoryKeyStore};
