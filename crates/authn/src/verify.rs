//! Access token verification for resource servers.
//!
//! ```no_run
//! use keygrant_authn::{AuthConfig, ServiceVerifyingKey, TokenVerifier};
//!
//! # fn example(pem: &str, header: Option<&str>) -> keygrant_authn::Result<()> {
//! let verifier = TokenVerifier::new(
//!     ServiceVerifyingKey::from_public_key_pem(pem)?,
//!     &AuthConfig::default(),
//! );
//! let tenant_id = verifier.verify_header(header)?;
//! println!("request for tenant {tenant_id}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use keygrant_storage::TenantId;

use crate::{
    claims::ScopedClaims,
    config::AuthConfig,
    error::{Rejection, Result},
    jwt,
    service_key::ServiceVerifyingKey,
    validation::{ClaimExpectations, validate_algorithm, validate_claims},
};

/// Authorization scheme prefix, matched case-insensitively.
const BEARER_PREFIX: &str = "bearer ";

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme keyword is case-insensitive and must be followed by exactly
/// one space. The rest of the header is returned as-is.
///
/// # Errors
///
/// Returns [`AuthError::NotAuthorized`] if the header is empty, does not use
/// the bearer scheme, or carries no token.
///
/// [`AuthError::NotAuthorized`]: crate::error::AuthError::NotAuthorized
///
/// # Examples
///
/// ```
/// use keygrant_authn::bearer_token;
///
/// assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
/// assert!(bearer_token("Basic dXNlcjpwYXNz").is_err());
/// ```
pub fn bearer_token(header: &str) -> Result<&str> {
    if header.is_empty() {
        return Err(Rejection::MissingHeader.into());
    }

    match header.split_at_checked(BEARER_PREFIX.len()) {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => {
            if token.is_empty() {
                Err(Rejection::InvalidTokenFormat("empty bearer token".into()).into())
            } else {
                Ok(token)
            }
        },
        _ => Err(Rejection::InvalidScheme.into()),
    }
}

/// Verifies service-issued access tokens and extracts their tenant.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: ServiceVerifyingKey,
    issuer: String,
    audience: String,
    leeway: Duration,
}

impl TokenVerifier {
    /// Creates a verifier using the issuer, audience and leeway from
    /// `config`.
    #[must_use]
    pub fn new(key: ServiceVerifyingKey, config: &AuthConfig) -> Self {
        Self {
            key,
            issuer: config.issuer().to_owned(),
            audience: config.audience().to_owned(),
            leeway: config.verifier_leeway(),
        }
    }

    /// Overrides the clock-skew leeway.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Returns the clock-skew leeway.
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Verifies the `Authorization` header value of a request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthorized`] if the header is missing or
    /// malformed, and otherwise the errors of [`verify`](Self::verify).
    ///
    /// [`AuthError::NotAuthorized`]: crate::error::AuthError::NotAuthorized
    pub fn verify_header(&self, header: Option<&str>) -> Result<TenantId> {
        let header = header.ok_or(Rejection::MissingHeader)?;
        self.verify(bearer_token(header)?)
    }

    /// Verifies a token at the current time.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, token: &str) -> Result<TenantId> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies a token as of `now` and returns its tenant.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthorized`] if the signature, issuer, audience or
    ///   time claims do not check out
    /// - [`AuthError::Internal`] if the token verifies but carries no tenant
    ///   scope
    ///
    /// [`AuthError::NotAuthorized`]: crate::error::AuthError::NotAuthorized
    /// [`AuthError::Internal`]: crate::error::AuthError::Internal
    #[tracing::instrument(skip(self, token, now))]
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TenantId> {
        let claims = self.verify_claims(token, now).inspect_err(|rejection| {
            tracing::debug!(reason = %rejection, "Access token rejected");
        })?;

        claims.tenant_id().inspect_err(|e| {
            tracing::warn!(error = %e, "Verified access token has no tenant scope");
        })
    }

    fn verify_claims(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<ScopedClaims, Rejection> {
        let header = jwt::decode_jwt_header(token)?;
        validate_algorithm(&format!("{:?}", header.alg))?;

        let claims: ScopedClaims = jwt::verify_signature(token, self.key.decoding_key())?;
        validate_claims(
            &claims.registered,
            &ClaimExpectations {
                issuer: Some(&self.issuer),
                audience: Some(&self.audience),
                now,
                leeway: self.leeway,
                require_exp: true,
            },
        )?;

        Ok(claims)
    }
}
