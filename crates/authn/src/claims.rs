//! JWT claim sets used by the grant flow.
//!
//! Two tokens exist:
//!
//! - **Bearer assertion**: signed by a client credential and presented to the
//!   grant endpoint. Decoded as [`AssertionClaims`].
//! - **Access token**: signed by the service and presented to resource
//!   servers. Written as [`AccessTokenClaims`], read back as [`ScopedClaims`].
//!
//! ```json
//! {
//!   "iss": "keygrant",
//!   "aud": ["keygrant"],
//!   "iat": 1700000000,
//!   "exp": 1700003600,
//!   "nbf": 0,
//!   "scope": ["tenant:<tenant_id>"]
//! }
//! ```

use keygrant_storage::TenantId;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Prefix of the single scope entry carried by access tokens.
pub const TENANT_SCOPE_PREFIX: &str = "tenant:";

/// The `aud` claim, which may be a single string or an array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "x"`
    Single(String),
    /// `"aud": ["x", "y"]`
    Multiple(Vec<String>),
}

impl Audience {
    /// Returns `true` if `audience` is one of the listed audiences.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl From<&str> for Audience {
    fn from(audience: &str) -> Self {
        Audience::Multiple(vec![audience.to_owned()])
    }
}

/// Registered claims (RFC 7519 §4.1) checked by [`validate_claims`].
///
/// Every field is optional at the parsing layer; which ones are required is
/// decided during validation.
///
/// [`validate_claims`]: crate::validation::validate_claims
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiration time (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not before (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issued at (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// JWT ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Claims of an RFC 7523 bearer assertion.
///
/// Unknown claims are ignored. In particular an assertion cannot influence
/// the tenant of the issued token by carrying a `scope` or tenant claim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Standard claims; `iss` must be the credential's identity ID.
    #[serde(flatten)]
    pub registered: RegisteredClaims,

    /// Requested access token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_duration: Option<i64>,
}

/// Claims written into a service-issued access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Service issuer name.
    pub iss: String,
    /// Service audience.
    pub aud: Vec<String>,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Not before; always the epoch.
    pub nbf: i64,
    /// Single-entry scope `["tenant:<tenant_id>"]`.
    pub scope: Vec<String>,
}

impl AccessTokenClaims {
    /// Builds the claims for a token scoped to `tenant_id`.
    #[must_use]
    pub fn for_tenant(
        issuer: &str,
        audience: &str,
        tenant_id: &TenantId,
        issued_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            iss: issuer.to_owned(),
            aud: vec![audience.to_owned()],
            iat: issued_at,
            exp: expires_at,
            nbf: 0,
            scope: vec![format!("{TENANT_SCOPE_PREFIX}{tenant_id}")],
        }
    }
}

/// Access token claims as read back by the verifier.
///
/// `scope` is kept as raw JSON so a token whose signature verifies but whose
/// scope is malformed can be told apart from a forged token.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ScopedClaims {
    /// Standard claims.
    #[serde(flatten)]
    pub registered: RegisteredClaims,

    /// Raw `scope` claim.
    #[serde(default)]
    pub scope: Option<serde_json::Value>,
}

impl ScopedClaims {
    /// Extracts the tenant from the first scope entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if `scope` is missing, not an array of
    /// strings, empty, or its first entry lacks the `tenant:` prefix.
    pub fn tenant_id(&self) -> Result<TenantId> {
        let scopes = self
            .scope
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| AuthError::internal("access token has no scope array"))?;

        let first = scopes
            .first()
            .ok_or_else(|| AuthError::internal("access token scope is empty"))?
            .as_str()
            .ok_or_else(|| AuthError::internal("access token scope entry is not a string"))?;

        first
            .strip_prefix(TENANT_SCOPE_PREFIX)
            .map(TenantId::from)
            .ok_or_else(|| AuthError::internal("access token scope is not a tenant scope"))
    }
}

/// Successful grant response (RFC 6749 §5.1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed access token.
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

impl TokenResponse {
    /// Renders the response body.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| AuthError::internal_with_source("serializing token response", e))
    }
}
