//! JWT algorithm and claim validation.
//!
//! Signature checks happen in [`crate::jwt`]. Everything else about a token is
//! checked here against an explicit clock, so the grant endpoint and the
//! verifier can apply different leeways and tests can pin `now`.
//!
//! # Security
//!
//! - Strict algorithm checks to prevent algorithm substitution attacks
//! - Only EdDSA is accepted; symmetric algorithms and `none` are always rejected
//! - Time claims are compared with an explicit leeway, never an implicit one

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{claims::RegisteredClaims, error::Rejection};

/// Forbidden JWT algorithms that are never accepted.
///
/// - `none`: no signature at all
/// - `HS256`, `HS384`, `HS512`: symmetric, a verifier could forge tokens
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms.
///
/// Credentials and the service signing key are both Ed25519.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["EdDSA"];

/// Validate JWT algorithm against security policies.
///
/// # Errors
///
/// Returns [`Rejection::UnsupportedAlgorithm`] if the algorithm is forbidden
/// or not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use keygrant_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("ES256").is_err());
/// assert!(validate_algorithm("HS256").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), Rejection> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(Rejection::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(Rejection::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not in accepted list (only EdDSA is supported)"
        )));
    }

    Ok(())
}

/// What a set of registered claims must satisfy.
#[derive(Debug, Clone)]
pub struct ClaimExpectations<'a> {
    /// Required `iss`. `None` skips the check.
    pub issuer: Option<&'a str>,
    /// Audience that `aud` must contain. `None` skips the check.
    pub audience: Option<&'a str>,
    /// Reference time for `exp`, `nbf` and `iat`.
    pub now: DateTime<Utc>,
    /// Clock-skew allowance in both directions.
    pub leeway: Duration,
    /// Whether a missing `exp` is a rejection.
    pub require_exp: bool,
}

/// Validate registered claims.
///
/// With `now` and leeway `L` (whole seconds):
///
/// | Claim | Rejected when |
/// |-------|---------------|
/// | `exp` | `now - L > exp` |
/// | `nbf` | `now + L < nbf` |
/// | `iat` | `now + L < iat` |
///
/// # Errors
///
/// Returns the first [`Rejection`] encountered, checking issuer, audience,
/// then the time claims.
pub fn validate_claims(
    claims: &RegisteredClaims,
    expected: &ClaimExpectations<'_>,
) -> Result<(), Rejection> {
    if let Some(issuer) = expected.issuer {
        match claims.iss.as_deref() {
            None => return Err(Rejection::MissingClaim("iss")),
            Some(iss) if iss != issuer => {
                return Err(Rejection::InvalidIssuer(format!("expected '{issuer}'")));
            },
            Some(_) => {},
        }
    }

    if let Some(audience) = expected.audience {
        match &claims.aud {
            None => return Err(Rejection::MissingClaim("aud")),
            Some(aud) if !aud.contains(audience) => {
                return Err(Rejection::InvalidAudience(format!("expected '{audience}'")));
            },
            Some(_) => {},
        }
    }

    let now = expected.now.timestamp();
    let leeway = i64::try_from(expected.leeway.as_secs()).unwrap_or(i64::MAX);

    match claims.exp {
        Some(exp) if now.saturating_sub(leeway) > exp => return Err(Rejection::TokenExpired),
        None if expected.require_exp => return Err(Rejection::MissingClaim("exp")),
        _ => {},
    }

    if let Some(nbf) = claims.nbf
        && now.saturating_add(leeway) < nbf
    {
        return Err(Rejection::TokenNotYetValid);
    }

    if let Some(iat) = claims.iat
        && now.saturating_add(leeway) < iat
    {
        return Err(Rejection::IssuedInFuture);
    }

    Ok(())
}
