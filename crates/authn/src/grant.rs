//! RFC 7523 JWT-bearer grant.
//!
//! A client posts a form body
//!
//! ```text
//! grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer&assertion=<jwt>
//! ```
//!
//! where `<jwt>` is signed by a registered credential (see
//! [`Credential::sign_assertion`](crate::credential::Credential::sign_assertion)).
//! The [`GrantAuthority`] looks up the credential's public key by the
//! assertion's `kid`, verifies it, and answers with a service-signed access
//! token scoped to the tenant recorded in the key store.
//!
//! The tenant never comes from the assertion. `request_duration` is the only
//! client-controlled input and is capped by the configured maximum.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use keygrant_storage::{IdentityId, KeyId, KeyReader, TenantId};
use url::form_urlencoded;

use crate::{
    claims::{AccessTokenClaims, AssertionClaims, TokenResponse},
    config::AuthConfig,
    error::{AuthError, Rejection, Result},
    jwt,
    service_key::ServiceSigningKey,
    validation::{ClaimExpectations, validate_algorithm, validate_claims},
};

/// `grant_type` of an RFC 7523 JWT-bearer grant.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// `token_type` of issued access tokens.
pub const BEARER_TOKEN_TYPE: &str = "bearer";

/// Parsed grant request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    /// The signed bearer assertion.
    pub assertion: String,
}

impl GrantRequest {
    /// Parses a form-encoded grant request.
    ///
    /// The first occurrence of each field wins and unknown fields are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Parse`] if `grant_type` is not
    /// [`JWT_BEARER_GRANT_TYPE`] or `assertion` is missing or empty.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut grant_type = None;
        let mut assertion = None;

        for (name, value) in form_urlencoded::parse(body) {
            match name.as_ref() {
                "grant_type" if grant_type.is_none() => grant_type = Some(value.into_owned()),
                "assertion" if assertion.is_none() => assertion = Some(value.into_owned()),
                _ => {},
            }
        }

        match grant_type.as_deref() {
            Some(JWT_BEARER_GRANT_TYPE) => {},
            Some(other) => {
                return Err(AuthError::parse(format!("unsupported grant_type '{other}'")));
            },
            None => return Err(AuthError::parse("missing grant_type")),
        }

        let assertion = assertion
            .filter(|assertion| !assertion.is_empty())
            .ok_or_else(|| AuthError::parse("missing assertion"))?;

        Ok(Self { assertion })
    }
}

/// A verified assertion, ready to be turned into an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Tenant of the credential, from the key store.
    pub tenant_id: TenantId,
    /// Identity that signed the assertion.
    pub identity_id: IdentityId,
    /// Key that signed the assertion.
    pub key_id: KeyId,
    /// Lifetime of the token to issue.
    pub duration: Duration,
}

/// Exchanges bearer assertions for tenant-scoped access tokens.
///
/// Holds only read access to the key store.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use keygrant_authn::{AuthConfig, GrantAuthority, ServiceSigningKey};
/// use keygrant_storage::MemoryKeyStore;
///
/// # async fn example(body: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
/// let authority = GrantAuthority::new(
///     Arc::new(MemoryKeyStore::new()),
///     ServiceSigningKey::generate(),
///     AuthConfig::default(),
/// );
///
/// let response = authority.exchange(body).await?;
/// println!("{}", response.to_json()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GrantAuthority {
    keys: Arc<dyn KeyReader>,
    signing_key: ServiceSigningKey,
    config: AuthConfig,
}

impl GrantAuthority {
    /// Creates an authority.
    #[must_use]
    pub fn new(
        keys: Arc<dyn KeyReader>,
        signing_key: ServiceSigningKey,
        config: AuthConfig,
    ) -> Self {
        Self { keys, signing_key, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Verifies a grant request at the current time.
    ///
    /// # Errors
    ///
    /// See [`authorize_at`](Self::authorize_at).
    pub async fn authorize(&self, body: &[u8]) -> Result<Authorization> {
        self.authorize_at(body, Utc::now()).await
    }

    /// Verifies a grant request as of `now`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Parse`] for a malformed form body
    /// - [`AuthError::NotAuthorized`] if the assertion is malformed, signed by
    ///   an unknown key, has a bad signature, or fails issuer, audience or
    ///   time checks (zero leeway)
    /// - [`AuthError::DurationExceeded`] if `request_duration` is above the
    ///   configured maximum
    /// - [`AuthError::Internal`] if the key store fails or holds an unusable
    ///   public key
    #[tracing::instrument(skip(self, body, now))]
    pub async fn authorize_at(&self, body: &[u8], now: DateTime<Utc>) -> Result<Authorization> {
        let request = GrantRequest::parse(body)?;

        self.authorize_assertion(&request.assertion, now).await.inspect_err(|e| match e {
            AuthError::NotAuthorized(rejection) => {
                tracing::debug!(reason = %rejection, "Assertion rejected");
            },
            AuthError::Internal { .. } => {
                tracing::warn!(error = %e, "Grant failed");
            },
            _ => tracing::debug!(error = %e, "Grant refused"),
        })
    }

    /// Signs an access token for `authorization` at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if signing fails.
    pub fn grant(&self, authorization: &Authorization) -> Result<TokenResponse> {
        self.grant_at(authorization, Utc::now())
    }

    /// Signs an access token for `authorization` issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if signing fails.
    pub fn grant_at(
        &self,
        authorization: &Authorization,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse> {
        let issued_at = now.timestamp();
        let expires_in = i64::try_from(authorization.duration.as_secs()).unwrap_or(i64::MAX);

        let claims = AccessTokenClaims::for_tenant(
            self.config.issuer(),
            self.config.audience(),
            &authorization.tenant_id,
            issued_at,
            issued_at.saturating_add(expires_in),
        );
        let access_token = jwt::encode(&claims, None, self.signing_key.encoding_key())?;

        tracing::info!(
            tenant_id = %authorization.tenant_id,
            identity_id = %authorization.identity_id,
            key_id = %authorization.key_id,
            expires_in,
            "Issued access token"
        );

        Ok(TokenResponse { access_token, token_type: BEARER_TOKEN_TYPE.to_owned(), expires_in })
    }

    /// Verifies a grant request and signs the access token, at the current
    /// time.
    ///
    /// # Errors
    ///
    /// See [`authorize_at`](Self::authorize_at) and [`grant_at`](Self::grant_at).
    pub async fn exchange(&self, body: &[u8]) -> Result<TokenResponse> {
        self.exchange_at(body, Utc::now()).await
    }

    /// Verifies a grant request and signs the access token, as of `now`.
    ///
    /// # Errors
    ///
    /// See [`authorize_at`](Self::authorize_at) and [`grant_at`](Self::grant_at).
    pub async fn exchange_at(&self, body: &[u8], now: DateTime<Utc>) -> Result<TokenResponse> {
        let authorization = self.authorize_at(body, now).await?;
        self.grant_at(&authorization, now)
    }

    async fn authorize_assertion(
        &self,
        assertion: &str,
        now: DateTime<Utc>,
    ) -> Result<Authorization> {
        let header = jwt::decode_jwt_header(assertion)?;
        validate_algorithm(&format!("{:?}", header.alg))?;
        let key_id = KeyId::from(header.kid.ok_or(Rejection::MissingKeyId)?);

        let record = self
            .keys
            .get_key(&key_id)
            .await?
            .ok_or_else(|| Rejection::UnknownKey { kid: key_id.to_string() })?;

        let decoding_key = jwt::to_decoding_key(&record.public_key).map_err(|e| {
            AuthError::internal_with_source(format!("stored public key for {key_id} is unusable"), e)
        })?;

        let claims: AssertionClaims = jwt::verify_signature(assertion, &decoding_key)?;
        validate_claims(
            &claims.registered,
            &ClaimExpectations {
                issuer: Some(record.identity_id.as_str()),
                audience: Some(self.config.audience()),
                now,
                leeway: Duration::ZERO,
                require_exp: true,
            },
        )?;

        let duration = self.grant_duration(claims.request_duration)?;

        Ok(Authorization {
            tenant_id: record.tenant.tenant_id,
            identity_id: record.identity_id,
            key_id,
            duration,
        })
    }

    /// Resolves the token lifetime. Non-positive requests fall back to the
    /// default.
    fn grant_duration(&self, requested: Option<i64>) -> Result<Duration> {
        let maximum = self.config.max_grant_duration();
        let maximum_secs = i64::try_from(maximum.as_secs()).unwrap_or(i64::MAX);

        match requested {
            Some(requested) if requested > maximum_secs => {
                Err(AuthError::DurationExceeded { requested, maximum: maximum_secs })
            },
            Some(requested) if requested > 0 => Ok(Duration::from_secs(requested.unsigned_abs())),
            _ => Ok(self.config.default_grant_duration()),
        }
    }
}

impl fmt::Debug for GrantAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantAuthority")
            .field("signing_key", &self.signing_key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
