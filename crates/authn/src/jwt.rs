//! JWT encoding, decoding and Ed25519 key conversion.
//!
//! This module only deals with signatures and key material. Claim checks
//! (issuer, audience, time) live in [`crate::validation`] so they can run
//! against an explicit clock.
//!
//! # Example
//!
//! ```no_run
//! // Requires a token signed by a registered credential.
//! use keygrant_authn::jwt::decode_jwt_header;
//!
//! # fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let header = decode_jwt_header(token)?;
//!
//! println!("Algorithm: {:?}", header.alg);
//! println!("Key ID: {:?}", header.kid);
//! # Ok(())
//! # }
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, VerifyingKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header};
use serde::{Serialize, de::DeserializeOwned};
use zeroize::Zeroizing;

use crate::error::{AuthError, Rejection};

/// PKCS#8 v1 prefix for a bare Ed25519 private key (RFC 8410).
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, // SEQUENCE, 46 bytes
    0x02, 0x01, 0x00, // INTEGER version 0
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
    0x04, 0x22, // OCTET STRING, 34 bytes
    0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
];

/// Decode JWT header without verification.
///
/// Tokens whose `alg` is not a known algorithm (including `none`) fail here.
///
/// # Errors
///
/// Returns [`Rejection::InvalidTokenFormat`] if the header cannot be decoded.
pub fn decode_jwt_header(token: &str) -> Result<Header, Rejection> {
    decode_header(token)
        .map_err(|e| Rejection::InvalidTokenFormat(format!("Failed to decode JWT header: {e}")))
}

/// Decodes a base64url Ed25519 public key and checks that it is a valid
/// curve point.
///
/// # Errors
///
/// Returns [`Rejection::InvalidPublicKey`] if the key is not base64url, not
/// 32 bytes, or not a valid Ed25519 point.
pub fn parse_public_key(public_key_b64: &str) -> Result<VerifyingKey, Rejection> {
    let public_key_bytes = URL_SAFE_NO_PAD
        .decode(public_key_b64.as_bytes())
        .map_err(|e| Rejection::InvalidPublicKey(format!("base64 decode: {e}")))?;

    let key_bytes: [u8; PUBLIC_KEY_LENGTH] =
        public_key_bytes.as_slice().try_into().map_err(|_| {
            Rejection::InvalidPublicKey(format!(
                "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
                public_key_bytes.len()
            ))
        })?;

    VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| Rejection::InvalidPublicKey(format!("invalid Ed25519 key: {e}")))
}

/// Converts a base64url Ed25519 public key to a jsonwebtoken [`DecodingKey`].
///
/// # Errors
///
/// Returns [`Rejection::InvalidPublicKey`] if the key is malformed.
pub fn to_decoding_key(public_key_b64: &str) -> Result<DecodingKey, Rejection> {
    parse_public_key(public_key_b64)?;

    DecodingKey::from_ed_components(public_key_b64)
        .map_err(|e| Rejection::InvalidPublicKey(e.to_string()))
}

/// Converts a 32-byte Ed25519 secret to a jsonwebtoken [`EncodingKey`].
#[must_use]
pub fn to_encoding_key(secret: &[u8; SECRET_KEY_LENGTH]) -> EncodingKey {
    EncodingKey::from_ed_der(&ed25519_pkcs8_der(secret))
}

/// Wraps a 32-byte Ed25519 secret in PKCS#8 v1 DER.
///
/// The result is wrapped in [`Zeroizing`] so the key material is scrubbed
/// on drop.
#[must_use]
pub fn ed25519_pkcs8_der(secret: &[u8; SECRET_KEY_LENGTH]) -> Zeroizing<Vec<u8>> {
    let mut der = Zeroizing::new(Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + secret.len()));
    der.extend_from_slice(&ED25519_PKCS8_PREFIX);
    der.extend_from_slice(secret);
    der
}

/// Verify an EdDSA signature and deserialize the payload.
///
/// Only the signature is checked. The caller validates claims.
///
/// # Errors
///
/// Returns a [`Rejection`] if the signature does not verify or the payload
/// does not deserialize into `T`.
pub fn verify_signature<T: DeserializeOwned>(
    token: &str,
    key: &DecodingKey,
) -> Result<T, Rejection> {
    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<T>(token, key, &validation)?;

    Ok(token_data.claims)
}

/// Sign `claims` with EdDSA, optionally setting the `kid` header.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] if encoding fails.
pub fn encode<T: Serialize>(
    claims: &T,
    kid: Option<&str>,
    key: &EncodingKey,
) -> Result<String, AuthError> {
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = kid.map(str::to_owned);

    jsonwebtoken::encode(&header, claims, key)
        .map_err(|e| AuthError::internal_with_source("signing JWT", e))
}
