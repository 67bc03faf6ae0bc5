//! Client credential issuance.
//!
//! A credential is an Ed25519 key pair whose public half is registered in the
//! key store under its RFC 7638 thumbprint. The private half is handed to the
//! client once, as a JSON Web Key carrying one extension member with the
//! store-assigned identity:
//!
//! ```json
//! {
//!   "kty": "OKP",
//!   "crv": "Ed25519",
//!   "x": "<base64url public key>",
//!   "d": "<base64url private key>",
//!   "kid": "<thumbprint>",
//!   "alg": "EdDSA",
//!   "keygrant/identity-id": "<identity id>"
//! }
//! ```
//!
//! The client later signs bearer assertions with it (see
//! [`Credential::sign_assertion`]) and exchanges them at the
//! [`GrantAuthority`](crate::grant::GrantAuthority).

use std::{fmt, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use ed25519_dalek::{SECRET_KEY_LENGTH, SigningKey, VerifyingKey};
use jsonwebtoken::EncodingKey;
use keygrant_storage::{IdentityId, KeyId, KeyStore, NewKey, TenantDescriptor};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{
    claims::{AssertionClaims, Audience, RegisteredClaims},
    error::{AuthError, Result},
    jwt,
};

/// JWK member carrying the identity ID in a credential bundle.
pub const IDENTITY_EXTENSION: &str = "keygrant/identity-id";

/// JWS algorithm of every credential.
pub const ED25519_ALGORITHM: &str = "EdDSA";

/// Lifetime of assertions built by [`Credential::sign_assertion`] unless
/// overridden.
pub const DEFAULT_ASSERTION_LIFETIME: Duration = Duration::from_secs(5 * 60);

const OKP_KEY_TYPE: &str = "OKP";
const ED25519_CURVE: &str = "Ed25519";

/// Computes the RFC 7638 thumbprint of an Ed25519 public key.
///
/// The hash input is `{"crv":"Ed25519","kty":"OKP","x":"<x>"}` with members in
/// lexicographic order and no whitespace (RFC 8037 §2). The result is the
/// base64url encoding of the SHA-256 digest, without padding.
#[must_use]
pub fn thumbprint(public_key: &VerifyingKey) -> KeyId {
    let x = URL_SAFE_NO_PAD.encode(public_key.as_bytes());
    let canonical = format!(r#"{{"crv":"{ED25519_CURVE}","kty":"{OKP_KEY_TYPE}","x":"{x}"}}"#);
    KeyId::from(URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes())))
}

/// An Ed25519 private key.
#[derive(Clone)]
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    /// Builds a key from a raw 32-byte secret.
    #[must_use]
    pub fn from_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self { signing_key: SigningKey::from_bytes(secret) }
    }

    /// Returns the public half.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the RFC 7638 thumbprint of the public half.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        thumbprint(&self.verifying_key())
    }

    /// Returns the public key as unpadded base64url (the JWK `x` member).
    #[must_use]
    pub fn public_key_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.verifying_key().as_bytes())
    }

    fn secret_b64(&self) -> Zeroizing<String> {
        let secret = Zeroizing::new(self.signing_key.to_bytes());
        Zeroizing::new(URL_SAFE_NO_PAD.encode(secret.as_slice()))
    }

    fn encoding_key(&self) -> EncodingKey {
        let secret = Zeroizing::new(self.signing_key.to_bytes());
        jwt::to_encoding_key(&secret)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("key_id", &self.key_id()).finish_non_exhaustive()
    }
}

/// Key generation strategy used by the [`CredentialIssuer`].
pub trait KeyGenerator: Send + Sync {
    /// Produces a new private key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if key generation fails.
    fn generate(&self) -> Result<PrivateKey>;

    /// JWS algorithm name of the generated keys.
    fn algorithm(&self) -> &'static str;
}

/// Production generator backed by OS randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Generator;

impl KeyGenerator for Ed25519Generator {
    fn generate(&self) -> Result<PrivateKey> {
        Ok(PrivateKey { signing_key: SigningKey::generate(&mut OsRng) })
    }

    fn algorithm(&self) -> &'static str {
        ED25519_ALGORITHM
    }
}

/// Deterministic generator for tests.
///
/// Every call returns the key derived from `seed`, so two issuances with the
/// same generator produce the same key ID.
#[derive(Clone)]
pub struct SeededGenerator {
    seed: Zeroizing<[u8; SECRET_KEY_LENGTH]>,
}

impl SeededGenerator {
    /// Creates a generator that always yields the key for `seed`.
    #[must_use]
    pub fn new(seed: [u8; SECRET_KEY_LENGTH]) -> Self {
        Self { seed: Zeroizing::new(seed) }
    }
}

impl KeyGenerator for SeededGenerator {
    fn generate(&self) -> Result<PrivateKey> {
        Ok(PrivateKey::from_bytes(&self.seed))
    }

    fn algorithm(&self) -> &'static str {
        ED25519_ALGORITHM
    }
}

impl fmt::Debug for SeededGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededGenerator").finish_non_exhaustive()
    }
}

/// Serialized form of a credential.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    /// Key type, always `"OKP"`.
    pub kty: String,
    /// Curve, always `"Ed25519"`.
    pub crv: String,
    /// Public key, base64url.
    pub x: String,
    /// Private key, base64url.
    pub d: Zeroizing<String>,
    /// Key ID (thumbprint of `x`).
    pub kid: String,
    /// JWS algorithm, always `"EdDSA"`.
    pub alg: String,
    /// Store-assigned identity.
    #[serde(rename = "keygrant/identity-id")]
    pub identity_id: IdentityId,
}

impl CredentialEnvelope {
    fn new(key: &PrivateKey, key_id: &KeyId, identity_id: &IdentityId) -> Self {
        Self {
            kty: OKP_KEY_TYPE.to_owned(),
            crv: ED25519_CURVE.to_owned(),
            x: key.public_key_b64(),
            d: key.secret_b64(),
            kid: key_id.to_string(),
            alg: ED25519_ALGORITHM.to_owned(),
            identity_id: identity_id.clone(),
        }
    }

    /// Checks the envelope and recovers the private key.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found: wrong key type,
    /// curve or algorithm, an invalid public key, a private key that does not
    /// derive `x`, or a `kid` that is not the thumbprint of `x`.
    fn validate(&self) -> std::result::Result<PrivateKey, String> {
        if self.kty != OKP_KEY_TYPE || self.crv != ED25519_CURVE {
            return Err(format!("unsupported key type {}/{}", self.kty, self.crv));
        }
        if self.alg != ED25519_ALGORITHM {
            return Err(format!("unsupported algorithm {}", self.alg));
        }
        if self.identity_id.is_empty() {
            return Err(format!("missing {IDENTITY_EXTENSION}"));
        }

        let public_key = jwt::parse_public_key(&self.x).map_err(|e| e.to_string())?;
        let key = private_key_from_b64(&self.d)?;
        if key.verifying_key() != public_key {
            return Err("private key does not match public key".to_owned());
        }
        if thumbprint(&public_key).as_str() != self.kid {
            return Err("kid is not the thumbprint of the public key".to_owned());
        }

        Ok(key)
    }
}

impl fmt::Debug for CredentialEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEnvelope")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("identity_id", &self.identity_id)
            .finish_non_exhaustive()
    }
}

fn private_key_from_b64(d: &str) -> std::result::Result<PrivateKey, String> {
    let bytes = Zeroizing::new(
        URL_SAFE_NO_PAD.decode(d.as_bytes()).map_err(|e| format!("private key base64: {e}"))?,
    );
    let secret: Zeroizing<[u8; SECRET_KEY_LENGTH]> =
        Zeroizing::new(bytes.as_slice().try_into().map_err(|_| {
            format!("private key must be {SECRET_KEY_LENGTH} bytes, got {}", bytes.len())
        })?);
    Ok(PrivateKey::from_bytes(&secret))
}

/// A client credential: key ID, identity and private key.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Thumbprint of the public key; the `kid` of signed assertions.
    pub key_id: KeyId,
    /// Store-assigned identity; the `iss` of signed assertions.
    pub identity_id: IdentityId,
    /// The private key.
    pub key: PrivateKey,
}

#[bon::bon]
impl Credential {
    /// Parses an exported credential bundle.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Parse`] if the bundle is not valid JSON, lacks the
    /// identity extension, or its key material is inconsistent.
    pub fn from_bundle(bundle: &str) -> Result<Self> {
        let envelope: CredentialEnvelope = serde_json::from_str(bundle)
            .map_err(|e| AuthError::parse(format!("credential bundle: {e}")))?;
        let key = envelope
            .validate()
            .map_err(|reason| AuthError::parse(format!("credential bundle: {reason}")))?;

        Ok(Self { key_id: KeyId::from(envelope.kid), identity_id: envelope.identity_id, key })
    }

    /// Serializes the credential as a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if serialization fails.
    pub fn to_bundle(&self) -> Result<Zeroizing<String>> {
        let envelope = CredentialEnvelope::new(&self.key, &self.key_id, &self.identity_id);
        serde_json::to_string(&envelope)
            .map(Zeroizing::new)
            .map_err(|e| AuthError::internal_with_source("serializing credential bundle", e))
    }

    /// Signs an RFC 7523 bearer assertion.
    ///
    /// The assertion carries `kid` = key ID in its header and `iss` =
    /// identity ID, `aud` = `[audience]`, `iat` = `now`, `exp` = `now +
    /// lifetime` and the optional `request_duration` in its claims.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn example(credential: keygrant_authn::Credential) -> keygrant_authn::Result<()> {
    /// let assertion = credential
    ///     .sign_assertion()
    ///     .audience("keygrant")
    ///     .request_duration(600)
    ///     .call()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if signing fails.
    #[builder]
    pub fn sign_assertion(
        &self,
        #[builder(into)] audience: String,
        #[builder(default = DEFAULT_ASSERTION_LIFETIME)] lifetime: Duration,
        request_duration: Option<i64>,
        #[builder(default = Utc::now())] now: DateTime<Utc>,
    ) -> Result<String> {
        let issued_at = now.timestamp();
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);

        let claims = AssertionClaims {
            registered: RegisteredClaims {
                iss: Some(self.identity_id.to_string()),
                aud: Some(Audience::from(audience.as_str())),
                iat: Some(issued_at),
                exp: Some(issued_at.saturating_add(lifetime)),
                ..Default::default()
            },
            request_duration,
        };

        jwt::encode(&claims, Some(self.key_id.as_str()), &self.key.encoding_key())
    }
}

/// Result of a successful issuance.
#[derive(Clone)]
pub struct IssuedCredential {
    /// The credential as an in-memory handle.
    pub credential: Credential,
    /// The serialized bundle to hand to the client.
    pub bundle: Zeroizing<String>,
}

impl IssuedCredential {
    /// Returns the registered key ID.
    #[must_use]
    pub fn key_id(&self) -> &KeyId {
        &self.credential.key_id
    }

    /// Returns the assigned identity.
    #[must_use]
    pub fn identity_id(&self) -> &IdentityId {
        &self.credential.identity_id
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

/// Mints credentials and registers their public keys.
#[derive(Clone)]
pub struct CredentialIssuer {
    store: Arc<dyn KeyStore>,
}

impl CredentialIssuer {
    /// Creates an issuer over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Generates a key pair, registers it for `tenant` and returns the bundle.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Conflict`] if the generated key ID is already
    ///   registered. The issuer does not retry: a collision means the key
    ///   generator is not producing unique keys.
    /// - [`AuthError::Internal`] if generation fails, the key pair fails
    ///   validation, the store fails or the bundle cannot be serialized.
    #[tracing::instrument(
        skip(self, tenant, generator),
        fields(tenant_id = %tenant.tenant_id, algorithm = generator.algorithm())
    )]
    pub async fn issue(
        &self,
        tenant: TenantDescriptor,
        generator: &dyn KeyGenerator,
    ) -> Result<IssuedCredential> {
        let key = generator.generate()?;
        let key_id = key.key_id();

        // The private half must round-trip through its JWK form before the
        // public half is registered.
        let probe = CredentialEnvelope::new(&key, &key_id, &IdentityId::from("pending"));
        probe.validate().map_err(|reason| {
            AuthError::internal(format!("generated key failed validation: {reason}"))
        })?;

        let new_key = NewKey::builder()
            .tenant(tenant)
            .public_key(key.public_key_b64())
            .algorithm(generator.algorithm())
            .build();

        let identity_id = self.store.add_key(&key_id, new_key).await.inspect_err(|e| {
            tracing::warn!(key_id = %key_id, error = %e, "Failed to register credential");
        })?;

        let credential = Credential { key_id, identity_id, key };
        let bundle = credential.to_bundle()?;

        tracing::info!(
            key_id = %credential.key_id,
            identity_id = %credential.identity_id,
            "Issued credential"
        );

        Ok(IssuedCredential { credential, bundle })
    }
}

impl fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIssuer").finish_non_exhaustive()
    }
}
