//! Security-focused authentication tests.
//!
//! These tests verify the grant endpoint's and the verifier's resistance to
//! common JWT attack vectors: algorithm substitution, algorithm confusion,
//! forged or tampered signatures, expired and future tokens, tenant spoofing
//! and lifetime inflation. They also pin which failures surface as
//! `NotAuthorized` and which as internal errors.
#![allow(clippy::expect_used, clippy::panic)]

use std::{
    error::Error,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use keygrant_authn::{
    AuthConfig, AuthError, GrantAuthority, IssuedCredential, SeededGenerator, ServiceSigningKey,
    TokenVerifier, assert_auth_error, assert_rejection,
    testutil::{Harness, craft_raw_jwt, jwt_bearer_form, sign_claims},
};
use keygrant_storage::{
    KeyId, KeyReader, KeyRecord, KeyStore, MemoryKeyStore, StorageError, StorageResult,
    testutil::{make_new_key, tenant_descriptor},
};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const NOW: i64 = 1_700_000_000;
const CLIENT_SEED: [u8; 32] = [21; 32];
const SERVICE_SEED: [u8; 32] = [42; 32];

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}

/// Issues a credential whose private key is `CLIENT_SEED`, so tests can sign
/// arbitrary claims with it.
async fn issue_known(harness: &Harness, tenant_id: &str) -> IssuedCredential {
    harness
        .issuer
        .issue(tenant_descriptor(tenant_id), &SeededGenerator::new(CLIENT_SEED))
        .await
        .expect("issuance")
}

/// Valid assertion claims for `issued`, as of `NOW`.
fn assertion_claims(issued: &IssuedCredential) -> Value {
    json!({
        "iss": issued.identity_id().as_str(),
        "aud": ["keygrant"],
        "iat": NOW,
        "exp": NOW + 300,
    })
}

async fn exchange(harness: &Harness, assertion: &str) -> keygrant_authn::Result<String> {
    harness
        .authority
        .exchange_at(jwt_bearer_form(assertion).as_bytes(), at(NOW))
        .await
        .map(|response| response.access_token)
}

/// Service-side fixtures with a known service key, for forging access tokens.
fn known_service_verifier() -> TokenVerifier {
    TokenVerifier::new(
        ServiceSigningKey::from_bytes(&SERVICE_SEED).verifying_key(),
        &AuthConfig::default(),
    )
}

fn access_claims(scope: Value) -> Value {
    json!({
        "iss": "keygrant",
        "aud": ["keygrant"],
        "iat": NOW,
        "exp": NOW + 3600,
        "nbf": 0,
        "scope": scope,
    })
}

// ===========================================================================
// Algorithm substitution
// ===========================================================================

#[tokio::test]
async fn test_algorithm_none_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    let token = craft_raw_jwt(
        &json!({"alg": "none", "typ": "JWT", "kid": issued.key_id().as_str()}),
        &assertion_claims(&issued),
    );
    let result = exchange(&harness, &token).await;
    assert_rejection!(result, InvalidTokenFormat);
}

#[tokio::test]
async fn test_algorithm_confusion_hs256_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    // Sign with HMAC keyed by the public key, the classic confusion attack.
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(issued.key_id().to_string());
    let public_key = issued.credential.key.public_key_b64();
    let token = jsonwebtoken::encode(
        &header,
        &assertion_claims(&issued),
        &EncodingKey::from_secret(public_key.as_bytes()),
    )
    .expect("encode");

    let result = exchange(&harness, &token).await;
    assert_rejection!(result, UnsupportedAlgorithm);
}

#[tokio::test]
async fn test_unaccepted_asymmetric_algorithm_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    let token = craft_raw_jwt(
        &json!({"alg": "ES256", "kid": issued.key_id().as_str()}),
        &assertion_claims(&issued),
    );
    let result = exchange(&harness, &token).await;
    assert_rejection!(result, UnsupportedAlgorithm);
}

#[tokio::test]
async fn test_missing_kid_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    let token = sign_claims(&assertion_claims(&issued), None, &CLIENT_SEED);
    let result = exchange(&harness, &token).await;
    assert_rejection!(result, MissingKeyId);
}

// ===========================================================================
// Signatures
// ===========================================================================

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;
    let token =
        sign_claims(&assertion_claims(&issued), Some(issued.key_id().as_str()), &CLIENT_SEED);

    let mut claims = assertion_claims(&issued);
    claims["request_duration"] = json!(1);
    let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("json"));

    let parts: Vec<&str> = token.split('.').collect();
    let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

    let result = exchange(&harness, &tampered).await;
    assert_rejection!(result, InvalidSignature);
}

#[tokio::test]
async fn test_assertion_signed_by_other_key_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    // Right kid, wrong private key.
    let token =
        sign_claims(&assertion_claims(&issued), Some(issued.key_id().as_str()), &[99; 32]);
    let result = exchange(&harness, &token).await;
    assert_rejection!(result, InvalidSignature);
}

#[tokio::test]
async fn test_malformed_assertions_rejected() {
    let harness = Harness::new();
    for token in ["a", "a.b", "a.b.c.d", "not-a-jwt", "...."] {
        let result = exchange(&harness, token).await;
        assert!(
            matches!(result, Err(AuthError::NotAuthorized(_))),
            "{token:?} should be NotAuthorized, got {result:?}"
        );
    }
}

// ===========================================================================
// Claims (zero leeway on the grant endpoint)
// ===========================================================================

#[tokio::test]
async fn test_identity_must_match_issuer() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    let mut claims = assertion_claims(&issued);
    claims["iss"] = json!("someone-else");
    let token = sign_claims(&claims, Some(issued.key_id().as_str()), &CLIENT_SEED);

    let result = exchange(&harness, &token).await;
    assert_rejection!(result, InvalidIssuer);
}

#[tokio::test]
async fn test_audience_may_be_a_string() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    let mut claims = assertion_claims(&issued);
    claims["aud"] = json!("keygrant");
    let token = sign_claims(&claims, Some(issued.key_id().as_str()), &CLIENT_SEED);

    assert!(exchange(&harness, &token).await.is_ok());
}

#[tokio::test]
async fn test_expiry_boundary_has_no_leeway() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;
    let kid = issued.key_id().to_string();

    let mut claims = assertion_claims(&issued);
    claims["exp"] = json!(NOW);
    let token = sign_claims(&claims, Some(&kid), &CLIENT_SEED);
    assert!(exchange(&harness, &token).await.is_ok(), "exp == now is still valid");

    claims["exp"] = json!(NOW - 1);
    let token = sign_claims(&claims, Some(&kid), &CLIENT_SEED);
    assert_rejection!(exchange(&harness, &token).await, TokenExpired);
}

#[tokio::test]
async fn test_missing_exp_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;

    let mut claims = assertion_claims(&issued);
    claims.as_object_mut().expect("object").remove("exp");
    let token = sign_claims(&claims, Some(issued.key_id().as_str()), &CLIENT_SEED);

    assert_rejection!(exchange(&harness, &token).await, MissingClaim);
}

#[tokio::test]
async fn test_future_nbf_and_iat_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;
    let kid = issued.key_id().to_string();

    let mut claims = assertion_claims(&issued);
    claims["nbf"] = json!(NOW + 1);
    let token = sign_claims(&claims, Some(&kid), &CLIENT_SEED);
    assert_rejection!(exchange(&harness, &token).await, TokenNotYetValid);

    let mut claims = assertion_claims(&issued);
    claims["iat"] = json!(NOW + 1);
    let token = sign_claims(&claims, Some(&kid), &CLIENT_SEED);
    assert_rejection!(exchange(&harness, &token).await, IssuedInFuture);
}

// ===========================================================================
// Tenant isolation and lifetime
// ===========================================================================

#[tokio::test]
async fn test_spoofed_tenant_claims_ignored() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "real-tenant").await;

    let mut claims = assertion_claims(&issued);
    claims["scope"] = json!(["tenant:victim"]);
    claims["tenant_id"] = json!("victim");
    let token = sign_claims(&claims, Some(issued.key_id().as_str()), &CLIENT_SEED);

    let access_token = exchange(&harness, &token).await.expect("exchange");
    let tenant_id = harness.verifier.verify_at(&access_token, at(NOW)).expect("verify");
    assert_eq!(tenant_id.as_str(), "real-tenant");
}

#[tokio::test]
async fn test_duration_above_maximum_rejected() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;
    let kid = issued.key_id().to_string();

    let mut claims = assertion_claims(&issued);
    claims["request_duration"] = json!(3601);
    let token = sign_claims(&claims, Some(&kid), &CLIENT_SEED);
    let result = exchange(&harness, &token).await;
    assert!(
        matches!(result, Err(AuthError::DurationExceeded { requested: 3601, maximum: 3600 })),
        "got {result:?}"
    );

    claims["request_duration"] = json!(3600);
    let token = sign_claims(&claims, Some(&kid), &CLIENT_SEED);
    assert!(exchange(&harness, &token).await.is_ok(), "the maximum itself is allowed");
}

// ===========================================================================
// Verifier
// ===========================================================================

#[tokio::test]
async fn test_verifier_rejects_tampered_access_token() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;
    let assertion =
        sign_claims(&assertion_claims(&issued), Some(issued.key_id().as_str()), &CLIENT_SEED);
    let token = exchange(&harness, &assertion).await.expect("exchange");
    assert!(harness.verifier.verify_at(&token, at(NOW)).is_ok());

    let payload_start = token.find('.').expect("header separator") + 1;
    let signature_start = token.rfind('.').expect("signature separator") + 1;

    // Every character of the payload and the signature segments.
    for (i, c) in token.char_indices().skip(payload_start) {
        if i == signature_start - 1 {
            continue;
        }
        let replacement = if c == 'A' { 'B' } else { 'A' };
        let mut tampered = token.clone();
        tampered.replace_range(i..=i, &replacement.to_string());

        let result = harness.verifier.verify_at(&tampered, at(NOW));
        assert!(
            matches!(result, Err(AuthError::NotAuthorized(_))),
            "tampered byte {i} was accepted: {result:?}"
        );
    }
}

#[test]
fn test_verifier_rejects_token_from_other_service_key() {
    let verifier = known_service_verifier();
    let token = sign_claims(&access_claims(json!(["tenant:t"])), None, &[7; 32]);
    assert_rejection!(verifier.verify_at(&token, at(NOW)), InvalidSignature);
}

#[test]
fn test_verifier_rejects_wrong_issuer_and_audience() {
    let verifier = known_service_verifier();

    let mut claims = access_claims(json!(["tenant:t"]));
    claims["iss"] = json!("other-service");
    let token = sign_claims(&claims, None, &SERVICE_SEED);
    assert_rejection!(verifier.verify_at(&token, at(NOW)), InvalidIssuer);

    let mut claims = access_claims(json!(["tenant:t"]));
    claims["aud"] = json!(["other-api"]);
    let token = sign_claims(&claims, None, &SERVICE_SEED);
    assert_rejection!(verifier.verify_at(&token, at(NOW)), InvalidAudience);
}

#[test]
fn test_verifier_leeway_boundary() {
    let verifier = known_service_verifier().with_leeway(Duration::from_secs(30));
    let mut claims = access_claims(json!(["tenant:t"]));
    claims["exp"] = json!(NOW + 60);
    let token = sign_claims(&claims, None, &SERVICE_SEED);

    assert!(verifier.verify_at(&token, at(NOW + 90)).is_ok(), "within leeway");
    assert_rejection!(verifier.verify_at(&token, at(NOW + 91)), TokenExpired);
}

#[test]
fn test_verifier_default_leeway_is_sixty_seconds() {
    let verifier = known_service_verifier();
    let mut claims = access_claims(json!(["tenant:t"]));
    claims["iat"] = json!(NOW + 60);
    let token = sign_claims(&claims, None, &SERVICE_SEED);

    assert!(verifier.verify_at(&token, at(NOW)).is_ok());
    assert_rejection!(verifier.verify_at(&token, at(NOW - 1)), IssuedInFuture);
}

#[test]
fn test_verifier_malformed_scope_is_internal() {
    let verifier = known_service_verifier();
    for scope in [json!([]), json!(["org:1"]), json!("tenant:t"), json!(null), json!([1])] {
        let token = sign_claims(&access_claims(scope.clone()), None, &SERVICE_SEED);
        let result = verifier.verify_at(&token, at(NOW));
        assert!(
            matches!(result, Err(AuthError::Internal { .. })),
            "scope {scope} should be internal, got {result:?}"
        );
    }
}

#[test]
fn test_verifier_rejects_client_assertion_as_access_token() {
    // An assertion is signed by a client key, never the service key.
    let verifier = known_service_verifier();
    let token = sign_claims(&access_claims(json!(["tenant:t"])), Some("kid"), &CLIENT_SEED);
    assert_rejection!(verifier.verify_at(&token, at(NOW)), InvalidSignature);
}

#[test]
fn test_verify_header_rejections() {
    let verifier = known_service_verifier();
    assert_rejection!(verifier.verify_header(None), MissingHeader);
    assert_rejection!(verifier.verify_header(Some("")), MissingHeader);
    assert_rejection!(verifier.verify_header(Some("Basic abc")), InvalidScheme);
    assert_rejection!(verifier.verify_header(Some("Bearer ")), InvalidTokenFormat);
}

// ===========================================================================
// Error classes
// ===========================================================================

#[tokio::test]
async fn test_not_authorized_hides_cause() {
    let harness = Harness::new();
    let issued = issue_known(&harness, "fake-tenant").await;
    let mut claims = assertion_claims(&issued);
    claims["exp"] = json!(NOW - 10);
    let token = sign_claims(&claims, Some(issued.key_id().as_str()), &CLIENT_SEED);

    let err = exchange(&harness, &token).await.expect_err("expired");
    assert_eq!(err.to_string(), "Not authorized");
    assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("Token expired"));
}

/// Key reader that counts lookups.
#[derive(Default)]
struct CountingReader {
    inner: MemoryKeyStore,
    lookups: AtomicUsize,
}

#[async_trait]
impl KeyReader for CountingReader {
    async fn get_key(&self, key_id: &KeyId) -> StorageResult<Option<KeyRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_key(key_id).await
    }
}

#[tokio::test]
async fn test_bad_grant_type_rejected_before_key_lookup() {
    let reader = Arc::new(CountingReader::default());
    let authority =
        GrantAuthority::new(reader.clone(), ServiceSigningKey::generate(), AuthConfig::default());

    let result = authority.exchange(b"grant_type=client_credentials&assertion=a.b.c").await;
    assert_auth_error!(result, Parse);

    let result = authority
        .exchange(b"grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer&assertion=")
        .await;
    assert_auth_error!(result, Parse);

    assert_eq!(reader.lookups.load(Ordering::SeqCst), 0);
}

/// Key reader whose backend is unreachable.
struct UnreachableReader;

#[async_trait]
impl KeyReader for UnreachableReader {
    async fn get_key(&self, _key_id: &KeyId) -> StorageResult<Option<KeyRecord>> {
        Err(StorageError::connection("backend unreachable"))
    }
}

#[tokio::test]
async fn test_store_failure_is_internal() {
    let authority = GrantAuthority::new(
        Arc::new(UnreachableReader),
        ServiceSigningKey::generate(),
        AuthConfig::default(),
    );
    let token = sign_claims(&json!({"iss": "1", "exp": NOW + 60}), Some("kid"), &CLIENT_SEED);

    let result = authority.exchange_at(jwt_bearer_form(&token).as_bytes(), at(NOW)).await;
    assert_auth_error!(result, Internal);
}

#[tokio::test]
async fn test_corrupt_stored_public_key_is_internal() {
    let store = Arc::new(MemoryKeyStore::new());
    let kid = KeyId::from("corrupt");
    store.add_key(&kid, make_new_key("fake-tenant", "not-a-key")).await.expect("add");

    let authority =
        GrantAuthority::new(store, ServiceSigningKey::generate(), AuthConfig::default());
    let token = sign_claims(&json!({"iss": "1", "exp": NOW + 60}), Some("corrupt"), &CLIENT_SEED);

    let result = authority.exchange_at(jwt_bearer_form(&token).as_bytes(), at(NOW)).await;
    assert_auth_error!(result, Internal);
}
