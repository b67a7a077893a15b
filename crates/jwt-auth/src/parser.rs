//! Compact-JWT parsing and validation pipeline.
//!
//! `TokenParser::parse` runs the stages in a fixed order: structural
//! split, header decode, `typ` check, payload decode, temporal
//! validation, issuer check, then signature verification. A token
//! only becomes a [`Token`] after every stage passed, so the rejection
//! reported is always the earliest failing stage.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};

use crate::config::{parse_bool, ConfigSource};
use crate::date::DateValidator;
use crate::error::{ConfigError, JwtError};
use crate::keys::KeyStore;
use crate::signature::SignatureValidator;
use crate::token::Token;

/// Parses and validates compact JWTs.
pub struct TokenParser {
    keys: Arc<KeyStore>,
    dates: DateValidator,
    signatures: SignatureValidator,
    default_kid: Option<String>,
    default_alg: String,
    default_typ: Option<String>,
    validate_typ: bool,
}

impl TokenParser {
    /// Build from configuration, sharing a [`KeyStore`].
    ///
    /// Keys: `jwt.header.kid.default` (no default),
    /// `jwt.header.alg.default` (default `RS256`),
    /// `jwt.header.typ.default` (default `JWT`),
    /// `jwt.header.typ.validate` (default true), plus everything the
    /// date and signature validators read.
    pub fn new<C: ConfigSource>(config: &C, keys: Arc<KeyStore>) -> Result<Self, ConfigError> {
        Ok(Self {
            keys,
            dates: DateValidator::from_config(config)?,
            signatures: SignatureValidator::from_config(config)?,
            default_kid: config.read("jwt.header.kid.default"),
            default_alg: config.read_or("jwt.header.alg.default", "RS256"),
            default_typ: Some(config.read_or("jwt.header.typ.default", "JWT")),
            validate_typ: parse_bool(&config.read_or("jwt.header.typ.validate", "true")),
        })
    }

    /// Validate a compact JWT and return the parsed token.
    ///
    /// # Errors
    ///
    /// Structural problems are [`JwtError::MalformedToken`] /
    /// [`JwtError::UnreadableSegment`] (400); everything after the
    /// structure parsed rejects with a 401 variant.
    pub async fn parse(&self, jwt: &str) -> Result<Token, JwtError> {
        let (header_seg, payload_seg, signature_seg) = split_compact(jwt)?;

        let header = decode_segment(header_seg, "header")?;

        if self.validate_typ {
            let typ = self.attribute(&header, "typ", self.default_typ.as_deref())?;
            if !typ.eq_ignore_ascii_case("jwt") {
                tracing::debug!(target: "jwt_auth.parser", typ = %typ, "Token rejected: invalid typ");
                return Err(JwtError::InvalidTyp);
            }
        }

        let payload = decode_segment(payload_seg, "payload")?;

        self.dates.check_interval(&payload)?;

        let alg = self.attribute(&header, "alg", Some(&self.default_alg))?;
        let kid = self.attribute(&header, "kid", self.default_kid.as_deref())?;

        let issuers = self.keys.resolve_issuers(&kid);
        if !issuers.is_empty() {
            match payload.get("iss").and_then(Value::as_str) {
                Some(iss) if issuers.contains(iss) => {}
                iss => {
                    tracing::debug!(
                        target: "jwt_auth.parser",
                        issuer_present = iss.is_some(),
                        "Token rejected: issuer not allowed for this kid"
                    );
                    return Err(JwtError::InvalidIssuer);
                }
            }
        }

        let key = self.keys.resolve_key(&kid).await;
        let signing_input_len = header_seg.len() + 1 + payload_seg.len();
        let signing_input = jwt
            .get(..signing_input_len)
            .ok_or(JwtError::MalformedToken)?;
        self.signatures
            .verify(&alg, &key, signing_input.as_bytes(), signature_seg)?;

        Ok(Token::new(jwt.to_string(), payload))
    }

    /// A header attribute with its configured default; absence of both
    /// is a 401.
    fn attribute(
        &self,
        header: &Map<String, Value>,
        name: &'static str,
        default: Option<&str>,
    ) -> Result<String, JwtError> {
        header
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| default.map(str::to_string))
            .ok_or(JwtError::MissingHeader(name))
    }
}

/// Split the compact serialization into its three segments. Exactly
/// two dots and a non-empty signature are required.
fn split_compact(jwt: &str) -> Result<(&str, &str, &str), JwtError> {
    let first = jwt.find('.').ok_or(JwtError::MalformedToken)?;
    let after_first = jwt.get(first + 1..).ok_or(JwtError::MalformedToken)?;
    let second_rel = after_first.find('.').ok_or(JwtError::MalformedToken)?;

    let header = jwt.get(..first).ok_or(JwtError::MalformedToken)?;
    let payload = after_first
        .get(..second_rel)
        .ok_or(JwtError::MalformedToken)?;
    let signature = after_first
        .get(second_rel + 1..)
        .ok_or(JwtError::MalformedToken)?;

    if signature.is_empty() || signature.contains('.') {
        return Err(JwtError::MalformedToken);
    }
    Ok((header, payload, signature))
}

fn decode_segment(segment: &str, which: &'static str) -> Result<Map<String, Value>, JwtError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "jwt_auth.parser", segment = which, error = %e, "Segment is not valid base64url");
        JwtError::UnreadableSegment(which)
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "jwt_auth.parser", segment = which, error = %e, "Segment is not a JSON object");
        JwtError::UnreadableSegment(which)
    })
}
