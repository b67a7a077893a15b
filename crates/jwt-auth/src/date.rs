//! Temporal claim validation (`exp`, `iat`) with clock-skew tolerance.

use serde_json::{Map, Value};

use crate::config::{parse_bool, ConfigSource};
use crate::error::{ConfigError, JwtError};

const DEFAULT_TOLERANCE_SECONDS: i64 = 60;

/// Validates `exp` and `iat` against the current time.
///
/// Both checks share a single `now` reading and a symmetric tolerance:
/// a token is accepted while `exp >= now - tolerance` and
/// `iat <= now + tolerance` (boundaries inclusive). Expiration is
/// checked before issued-at.
#[derive(Debug, Clone)]
pub struct DateValidator {
    expiration_mandatory: bool,
    issued_at_mandatory: bool,
    tolerance: i64,
}

impl DateValidator {
    /// Build from configuration.
    ///
    /// Keys: `exp.required` (default true), `iat.required` (default
    /// true), `date.tolerance` in seconds (falling back to the
    /// MicroProfile `clockSkew` key, then 60).
    pub fn from_config<C: ConfigSource>(config: &C) -> Result<Self, ConfigError> {
        let tolerance = match config.read("date.tolerance").or_else(|| {
            config.read("org.eclipse.microprofile.authentication.JWT.clockSkew")
        }) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "date.tolerance".to_string(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_TOLERANCE_SECONDS,
        };

        Ok(Self {
            expiration_mandatory: parse_bool(&config.read_or("exp.required", "true")),
            issued_at_mandatory: parse_bool(&config.read_or("iat.required", "true")),
            tolerance,
        })
    }

    /// Validate the temporal claims of a decoded payload against the
    /// wall clock.
    pub fn check_interval(&self, payload: &Map<String, Value>) -> Result<(), JwtError> {
        self.check_interval_at(payload, chrono::Utc::now().timestamp())
    }

    /// Deterministic variant taking an explicit `now`, for tests.
    pub(crate) fn check_interval_at(
        &self,
        payload: &Map<String, Value>,
        now: i64,
    ) -> Result<(), JwtError> {
        match payload.get("exp").and_then(Value::as_i64) {
            Some(exp) => {
                if exp < now - self.tolerance {
                    tracing::debug!(
                        target: "jwt_auth.dates",
                        exp = exp,
                        now = now,
                        tolerance = self.tolerance,
                        "Token rejected: expired"
                    );
                    return Err(JwtError::Expired);
                }
            }
            None if self.expiration_mandatory => return Err(JwtError::MissingExpiration),
            None => {}
        }

        match payload.get("iat").and_then(Value::as_i64) {
            Some(iat) => {
                if iat > now + self.tolerance {
                    tracing::debug!(
                        target: "jwt_auth.dates",
                        iat = iat,
                        now = now,
                        tolerance = self.tolerance,
                        "Token rejected: issued in the future"
                    );
                    return Err(JwtError::IssuedInFuture);
                }
            }
            None if self.issued_at_mandatory => return Err(JwtError::MissingIssuedAt),
            None => {}
        }

        Ok(())
    }
}
