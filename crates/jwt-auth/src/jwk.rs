//! JSON Web Key documents and conversion to SPKI PEM.
//!
//! The key store works with PEM-encoded key material throughout, so
//! keys arriving as JWKs (from a JWKS endpoint) are converted once at
//! fetch time: RSA keys from their `n`/`e` members, EC keys from their
//! `crv`/`x`/`y` members via an uncompressed SEC1 point.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{BigUint, RsaPublicKey};
use serde::Deserialize;
use thiserror::Error;

/// A single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// EC x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,

    /// EC curve name.
    #[serde(default)]
    pub crv: Option<String>,
}

/// A JWK Set document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Why a JWK could not be converted to PEM.
#[derive(Error, Debug)]
pub enum JwkError {
    #[error("missing '{0}' member")]
    MissingMember(&'static str),

    #[error("member is not valid base64url")]
    Decode(#[from] base64::DecodeError),

    #[error("coordinate does not fit the curve's field size")]
    CoordinateLength,

    #[error("unsupported key type '{0}'")]
    UnsupportedKeyType(String),

    #[error("invalid RSA public key")]
    Rsa(#[from] rsa::Error),

    #[error("invalid EC public key")]
    Ec(#[from] p256::elliptic_curve::Error),

    #[error("SPKI encoding failed")]
    Spki(#[from] rsa::pkcs8::spki::Error),
}

impl Jwk {
    /// Whether this key is usable for signature verification (`use`
    /// absent or `sig`).
    #[must_use]
    pub fn is_signature_key(&self) -> bool {
        self.key_use.as_deref().is_none_or(|u| u == "sig")
    }

    /// Convert to an SPKI `PUBLIC KEY` PEM, without trailing newline.
    pub fn to_pem(&self) -> Result<String, JwkError> {
        match self.kty.as_str() {
            "RSA" => self.rsa_pem(),
            "EC" => self.ec_pem(),
            other => Err(JwkError::UnsupportedKeyType(other.to_string())),
        }
    }

    fn rsa_pem(&self) -> Result<String, JwkError> {
        let n = self.n.as_deref().ok_or(JwkError::MissingMember("n"))?;
        let e = self.e.as_deref().ok_or(JwkError::MissingMember("e"))?;
        let n = BigUint::from_bytes_be(&URL_SAFE_NO_PAD.decode(n)?);
        let e = BigUint::from_bytes_be(&URL_SAFE_NO_PAD.decode(e)?);
        let key = RsaPublicKey::new(n, e)?;
        Ok(key.to_public_key_pem(LineEnding::LF)?.trim_end().to_string())
    }

    fn ec_pem(&self) -> Result<String, JwkError> {
        let crv = self.crv.as_deref().ok_or(JwkError::MissingMember("crv"))?;
        let x = self.x.as_deref().ok_or(JwkError::MissingMember("x"))?;
        let y = self.y.as_deref().ok_or(JwkError::MissingMember("y"))?;

        // Curve selection mirrors algorithm naming: a crv ending in
        // "256" is P-256, "384" is P-384, anything else is P-521.
        let field_size = if crv.ends_with("256") {
            32
        } else if crv.ends_with("384") {
            48
        } else {
            66
        };

        // Uncompressed SEC1 point: 0x04 || X || Y, coordinates
        // left-padded to the field size.
        let mut point = Vec::with_capacity(1 + 2 * field_size);
        point.push(0x04);
        point.extend(pad_coordinate(&URL_SAFE_NO_PAD.decode(x)?, field_size)?);
        point.extend(pad_coordinate(&URL_SAFE_NO_PAD.decode(y)?, field_size)?);

        let pem = match field_size {
            32 => p256::PublicKey::from_sec1_bytes(&point)?.to_public_key_pem(LineEnding::LF)?,
            48 => p384::PublicKey::from_sec1_bytes(&point)?.to_public_key_pem(LineEnding::LF)?,
            _ => p521::PublicKey::from_sec1_bytes(&point)?.to_public_key_pem(LineEnding::LF)?,
        };
        Ok(pem.trim_end().to_string())
    }
}

fn pad_coordinate(bytes: &[u8], size: usize) -> Result<Vec<u8>, JwkError> {
    if bytes.len() > size {
        return Err(JwkError::CoordinateLength);
    }
    let mut padded = vec![0u8; size - bytes.len()];
    padded.extend_from_slice(bytes);
    Ok(padded)
}
