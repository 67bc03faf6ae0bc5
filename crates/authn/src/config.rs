//! Configuration for the grant endpoint and the token verifier.
//!
//! [`AuthConfig`] carries the fixed service identity (issuer and audience),
//! the grant lifetime policy and the verifier's clock-skew leeway. Key
//! material is not part of the configuration; it is passed to
//! [`GrantAuthority`](crate::grant::GrantAuthority) and
//! [`TokenVerifier`](crate::verify::TokenVerifier) directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default issuer and audience name.
pub const DEFAULT_SERVICE_NAME: &str = "keygrant";

/// Default lifetime of an issued access token (1 hour).
pub const DEFAULT_GRANT_DURATION: Duration = Duration::from_secs(60 * 60);

/// Default ceiling on client-requested lifetimes (1 hour).
pub const DEFAULT_MAX_GRANT_DURATION: Duration = Duration::from_secs(60 * 60);

/// Default clock-skew leeway applied by the token verifier (60 seconds).
pub const DEFAULT_VERIFIER_LEEWAY: Duration = Duration::from_secs(60);

/// Smallest accepted grant duration. JWT timestamps have second resolution.
const MIN_GRANT_DURATION: Duration = Duration::from_secs(1);

/// Authentication service configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use keygrant_authn::AuthConfig;
///
/// let config = AuthConfig::builder()
///     .issuer("formation")
///     .audience("formation")
///     .max_grant_duration(Duration::from_secs(900))
///     .default_grant_duration(Duration::from_secs(300))
///     .build()?;
///
/// assert_eq!(config.max_grant_duration(), Duration::from_secs(900));
/// # Ok::<(), keygrant_authn::ConfigError>(())
/// ```
///
/// Deserialized configuration accepts humantime durations and must be checked
/// with [`validate`](Self::validate):
///
/// ```
/// use keygrant_authn::AuthConfig;
///
/// let json = r#"{"default_grant_duration": "5m", "max_grant_duration": "30m"}"#;
/// let config: AuthConfig = serde_json::from_str(json)?;
/// config.validate()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// `iss` of issued access tokens.
    #[serde(default = "default_service_name")]
    issuer: String,

    /// `aud` expected in assertions and written into access tokens.
    #[serde(default = "default_service_name")]
    audience: String,

    /// Lifetime used when the assertion does not request one.
    #[serde(with = "humantime_serde", default = "default_grant_duration")]
    default_grant_duration: Duration,

    /// Ceiling on client-requested lifetimes.
    #[serde(with = "humantime_serde", default = "default_max_grant_duration")]
    max_grant_duration: Duration,

    /// Clock-skew leeway for access token time claims.
    #[serde(with = "humantime_serde", default = "default_verifier_leeway")]
    verifier_leeway: Duration,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_owned()
}

fn default_grant_duration() -> Duration {
    DEFAULT_GRANT_DURATION
}

fn default_max_grant_duration() -> Duration {
    DEFAULT_MAX_GRANT_DURATION
}

fn default_verifier_leeway() -> Duration {
    DEFAULT_VERIFIER_LEEWAY
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_service_name(),
            audience: default_service_name(),
            default_grant_duration: DEFAULT_GRANT_DURATION,
            max_grant_duration: DEFAULT_MAX_GRANT_DURATION,
            verifier_leeway: DEFAULT_VERIFIER_LEEWAY,
        }
    }
}

#[bon::bon]
impl AuthConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `issuer` - Access token issuer (default: `"keygrant"`).
    /// * `audience` - Service audience (default: `"keygrant"`).
    /// * `default_grant_duration` - Lifetime when none is requested (default: 1 hour).
    /// * `max_grant_duration` - Ceiling on requested lifetimes (default: 1 hour).
    /// * `verifier_leeway` - Verifier clock-skew leeway (default: 60 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if [`validate`](Self::validate) fails.
    #[builder]
    pub fn new(
        #[builder(into, default = default_service_name())] issuer: String,
        #[builder(into, default = default_service_name())] audience: String,
        #[builder(default = DEFAULT_GRANT_DURATION)] default_grant_duration: Duration,
        #[builder(default = DEFAULT_MAX_GRANT_DURATION)] max_grant_duration: Duration,
        #[builder(default = DEFAULT_VERIFIER_LEEWAY)] verifier_leeway: Duration,
    ) -> Result<Self, ConfigError> {
        let config =
            Self { issuer, audience, default_grant_duration, max_grant_duration, verifier_leeway };
        config.validate()?;
        Ok(config)
    }

    /// Checks field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `issuer` or `audience` is empty
    /// - either grant duration is shorter than one second
    /// - `default_grant_duration` exceeds `max_grant_duration`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Empty { field: "issuer" });
        }
        if self.audience.is_empty() {
            return Err(ConfigError::Empty { field: "audience" });
        }

        for (field, value) in [
            ("default_grant_duration", self.default_grant_duration),
            ("max_grant_duration", self.max_grant_duration),
        ] {
            if value < MIN_GRANT_DURATION {
                return Err(ConfigError::BelowMinimum {
                    field,
                    value: format!("{}ms", value.as_millis()),
                    min: "1s".to_owned(),
                });
            }
        }

        if self.default_grant_duration > self.max_grant_duration {
            return Err(ConfigError::DefaultExceedsMaximum {
                default: format!("{}s", self.default_grant_duration.as_secs()),
                maximum: format!("{}s", self.max_grant_duration.as_secs()),
            });
        }

        Ok(())
    }

    /// Returns the access token issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the service audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Returns the lifetime used when none is requested.
    #[must_use]
    pub fn default_grant_duration(&self) -> Duration {
        self.default_grant_duration
    }

    /// Returns the ceiling on requested lifetimes.
    #[must_use]
    pub fn max_grant_duration(&self) -> Duration {
        self.max_grant_duration
    }

    /// Returns the verifier's clock-skew leeway.
    #[must_use]
    pub fn verifier_leeway(&self) -> Duration {
        self.verifier_leeway
    }
}
