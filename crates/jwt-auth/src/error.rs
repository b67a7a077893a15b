//! Error types for token validation and component construction.
//!
//! Validation errors carry an HTTP-style status classification: a token
//! whose compact structure is broken is a `400`, everything that fails
//! after the structure parsed (dates, issuer, signature, headers) is a
//! `401`. Messages are deliberately terse; detail goes to logs.

use thiserror::Error;

/// Errors raised while validating a compact JWT.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// The compact serialization is structurally broken (wrong number of
    /// dots, empty signature segment).
    #[error("JWT is not valid")]
    MalformedToken,

    /// A segment was present but could not be base64url/JSON decoded.
    #[error("JWT is not valid")]
    UnreadableSegment(&'static str),

    /// A required header attribute is absent and has no configured default.
    #[error("No {0} in JWT")]
    MissingHeader(&'static str),

    /// The `typ` header is present but not `JWT` (case-insensitive).
    #[error("Invalid typ")]
    InvalidTyp,

    /// The `exp` claim is required but absent.
    #[error("No exp in the JWT")]
    MissingExpiration,

    /// The `iat` claim is required but absent.
    #[error("No iat in the JWT")]
    MissingIssuedAt,

    /// The token expired more than the configured tolerance ago.
    #[error("Token expired")]
    Expired,

    /// The token claims to have been issued in the future.
    #[error("Token issued after current time")]
    IssuedInFuture,

    /// The `iss` claim is absent or not in the allowed issuer set.
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// The `alg` header names an algorithm outside the allowlist.
    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,

    /// Signature verification failed. All cryptographic failures
    /// (unparseable key material, wrong family, bad signature bytes,
    /// genuine mismatch) collapse into this variant.
    #[error("Invalid signature")]
    InvalidSignature,
}

impl JwtError {
    /// HTTP status classification for this rejection.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedToken | Self::UnreadableSegment(_) => 400,
            _ => 401,
        }
    }
}

/// Errors raised while constructing components from configuration.
///
/// These are fail-fast: a component constructor returning `ConfigError`
/// means the deployment is broken, not that a token was bad.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Key material referenced by the static key mapping could not be read.
    #[error("failed to load key material from '{path}'")]
    KeyMaterial {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_400() {
        assert_eq!(JwtError::MalformedToken.status_code(), 400);
        assert_eq!(JwtError::UnreadableSegment("header").status_code(), 400);
    }

    #[test]
    fn validation_errors_are_401() {
        for err in [
            JwtError::MissingHeader("alg"),
            JwtError::InvalidTyp,
            JwtError::MissingExpiration,
            JwtError::MissingIssuedAt,
            JwtError::Expired,
            JwtError::IssuedInFuture,
            JwtError::InvalidIssuer,
            JwtError::UnsupportedAlgorithm,
            JwtError::InvalidSignature,
        ] {
            assert_eq!(err.status_code(), 401, "{err}");
        }
    }

    #[test]
    fn messages_match_the_wire_contract() {
        assert_eq!(JwtError::MalformedToken.to_string(), "JWT is not valid");
        assert_eq!(JwtError::MissingHeader("kid").to_string(), "No kid in JWT");
        assert_eq!(JwtError::Expired.to_string(), "Token expired");
        assert_eq!(
            JwtError::IssuedInFuture.to_string(),
            "Token issued after current time"
        );
        assert_eq!(JwtError::InvalidSignature.to_string(), "Invalid signature");
    }
}
