//! Signature verification over the compact signing input.
//!
//! Supports the RSA (`RS*`), HMAC (`HS*`), and ECDSA (`ES*`) families
//! in 256/384/512 widths. RSA and HMAC go through `jsonwebtoken`'s
//! crypto layer; ECDSA goes through the RustCrypto curve crates since
//! the ring backend has no P-521 support. Every cryptographic failure
//! collapses into [`JwtError::InvalidSignature`] so callers cannot
//! distinguish bad keys from bad signatures.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey};
use p256::ecdsa::signature::Verifier;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs8::DecodePublicKey;

use crate::config::{parse_bool, ConfigSource};
use crate::error::{ConfigError, JwtError};

const DEFAULT_SUPPORTED: &str = "RS256";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyKind {
    Rsa,
    P256,
    P384,
    P521,
}

/// Key material parsed once and reused across verifications.
#[derive(Clone)]
enum ParsedKey {
    Rsa(DecodingKey),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
}

/// Verifies compact-JWT signatures against configured algorithms.
pub struct SignatureValidator {
    /// Lowercased algorithm allowlist.
    supported: HashSet<String>,

    /// Parsed-key cache keyed by exact key-material string. `None`
    /// when caching is disabled. Racing misses both parse and the
    /// later insert wins; entries live for the process lifetime.
    cache: Option<Mutex<HashMap<(KeyKind, String), ParsedKey>>>,
}

impl SignatureValidator {
    /// Build from configuration.
    ///
    /// Keys: `header.alg.supported` (comma list, case-insensitive,
    /// default `RS256`), `public-key.cache.active` (default true).
    pub fn from_config<C: ConfigSource>(config: &C) -> Result<Self, ConfigError> {
        let supported: HashSet<String> = config
            .read_or("header.alg.supported", DEFAULT_SUPPORTED)
            .split(',')
            .map(|alg| alg.trim().to_ascii_lowercase())
            .filter(|alg| !alg.is_empty())
            .collect();
        if supported.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "header.alg.supported".to_string(),
                reason: "allowlist is empty".to_string(),
            });
        }

        let cache = parse_bool(&config.read_or("public-key.cache.active", "true"))
            .then(|| Mutex::new(HashMap::new()));

        Ok(Self { supported, cache })
    }

    /// Verify `signature_b64` (base64url, no padding) over
    /// `signing_input` using the given algorithm and key material.
    ///
    /// RSA keys are SPKI PEM (armor optional), HMAC keys are raw
    /// secret bytes, EC keys are SPKI PEM.
    pub fn verify(
        &self,
        alg: &str,
        key: &str,
        signing_input: &[u8],
        signature_b64: &str,
    ) -> Result<(), JwtError> {
        let alg_lower = alg.to_ascii_lowercase();
        if !self.supported.contains(&alg_lower) {
            tracing::debug!(
                target: "jwt_auth.signature",
                alg = %alg,
                "Token rejected: algorithm not in allowlist"
            );
            return Err(JwtError::UnsupportedAlgorithm);
        }

        match alg_lower.as_str() {
            "rs256" => self.verify_rsa(Algorithm::RS256, key, signing_input, signature_b64),
            "rs384" => self.verify_rsa(Algorithm::RS384, key, signing_input, signature_b64),
            "rs512" => self.verify_rsa(Algorithm::RS512, key, signing_input, signature_b64),
            "hs256" => verify_hmac(Algorithm::HS256, key, signing_input, signature_b64),
            "hs384" => verify_hmac(Algorithm::HS384, key, signing_input, signature_b64),
            "hs512" => verify_hmac(Algorithm::HS512, key, signing_input, signature_b64),
            "es256" | "es384" | "es512" => {
                self.verify_ecdsa(&alg_lower, key, signing_input, signature_b64)
            }
            _ => Err(JwtError::UnsupportedAlgorithm),
        }
    }

    fn verify_rsa(
        &self,
        algorithm: Algorithm,
        key: &str,
        signing_input: &[u8],
        signature_b64: &str,
    ) -> Result<(), JwtError> {
        let ParsedKey::Rsa(decoding_key) = self.parsed_key(KeyKind::Rsa, key)? else {
            return Err(JwtError::InvalidSignature);
        };
        match jsonwebtoken::crypto::verify(signature_b64, signing_input, &decoding_key, algorithm)
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(JwtError::InvalidSignature),
            Err(e) => {
                tracing::debug!(target: "jwt_auth.signature", error = %e, "RSA verification failed");
                Err(JwtError::InvalidSignature)
            }
        }
    }

    fn verify_ecdsa(
        &self,
        alg_lower: &str,
        key: &str,
        signing_input: &[u8],
        signature_b64: &str,
    ) -> Result<(), JwtError> {
        let kind = match alg_lower {
            "es256" => KeyKind::P256,
            "es384" => KeyKind::P384,
            _ => KeyKind::P521,
        };
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| JwtError::InvalidSignature)?;

        let verified = match self.parsed_key(kind, key)? {
            ParsedKey::P256(vk) => p256::ecdsa::Signature::from_slice(&signature)
                .and_then(|sig| vk.verify(signing_input, &sig)),
            ParsedKey::P384(vk) => p384::ecdsa::Signature::from_slice(&signature)
                .and_then(|sig| vk.verify(signing_input, &sig)),
            ParsedKey::P521(vk) => p521::ecdsa::Signature::from_slice(&signature)
                .and_then(|sig| vk.verify(signing_input, &sig)),
            ParsedKey::Rsa(_) => return Err(JwtError::InvalidSignature),
        };
        verified.map_err(|e| {
            tracing::debug!(target: "jwt_auth.signature", error = %e, "ECDSA verification failed");
            JwtError::InvalidSignature
        })
    }

    fn parsed_key(&self, kind: KeyKind, key: &str) -> Result<ParsedKey, JwtError> {
        if let Some(cache) = &self.cache {
            let guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(parsed) = guard.get(&(kind, key.to_string())) {
                return Ok(parsed.clone());
            }
        }

        let parsed = parse_key(kind, key)?;

        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert((kind, key.to_string()), parsed.clone());
        }
        Ok(parsed)
    }
}

fn verify_hmac(
    algorithm: Algorithm,
    key: &str,
    signing_input: &[u8],
    signature_b64: &str,
) -> Result<(), JwtError> {
    let decoding_key = DecodingKey::from_secret(key.as_bytes());
    match jsonwebtoken::crypto::verify(signature_b64, signing_input, &decoding_key, algorithm) {
        Ok(true) => Ok(()),
        _ => Err(JwtError::InvalidSignature),
    }
}

fn parse_key(kind: KeyKind, key: &str) -> Result<ParsedKey, JwtError> {
    let pem = normalize_pem(key);
    let parsed = match kind {
        KeyKind::Rsa => DecodingKey::from_rsa_pem(pem.as_bytes())
            .map(ParsedKey::Rsa)
            .map_err(|e| e.to_string()),
        KeyKind::P256 => p256::ecdsa::VerifyingKey::from_public_key_pem(&pem)
            .map(ParsedKey::P256)
            .map_err(|e| e.to_string()),
        KeyKind::P384 => p384::ecdsa::VerifyingKey::from_public_key_pem(&pem)
            .map(ParsedKey::P384)
            .map_err(|e| e.to_string()),
        // p521's `ecdsa::VerifyingKey` is a wrapper without pkcs8 impls,
        // so decode the SPKI PEM via `PublicKey` and convert.
        KeyKind::P521 => p521::PublicKey::from_public_key_pem(&pem)
            .map_err(|e| e.to_string())
            .and_then(|pk| {
                p521::ecdsa::VerifyingKey::from_sec1_bytes(pk.to_encoded_point(false).as_bytes())
                    .map_err(|e| e.to_string())
            })
            .map(ParsedKey::P521),
    };
    parsed.map_err(|e| {
        tracing::debug!(target: "jwt_auth.signature", error = %e, "Unparseable key material");
        JwtError::InvalidSignature
    })
}

/// Canonicalize PEM-ish key material: strip any armor lines and
/// whitespace, then rewrap the base64 body at 64 columns under
/// `PUBLIC KEY` armor. Accepts single-line PEM (armor with no
/// newlines) as produced by some property files.
fn normalize_pem(key: &str) -> String {
    let mut body = key.to_string();
    for armor in [
        "-----BEGIN RSA PUBLIC KEY-----",
        "-----END RSA PUBLIC KEY-----",
        "-----BEGIN RSA KEY-----",
        "-----END RSA KEY-----",
        "-----BEGIN PUBLIC KEY-----",
        "-----END PUBLIC KEY-----",
    ] {
        body = body.replace(armor, "");
    }
    let body: String = body.split_whitespace().collect();

    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for chunk in body.as_bytes().chunks(64) {
        if let Ok(line) = std::str::from_utf8(chunk) {
            pem.push_str(line);
            pem.push('\n');
        }
    }
    pem.push_str("-----END PUBLIC KEY-----");
    pem
}
