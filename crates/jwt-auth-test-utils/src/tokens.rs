//! Compact-token builders for tests.
//!
//! Tokens are assembled segment by segment rather than through a
//! high-level encode call, so tests can control the header freely
//! (arbitrary `kid`, wrong `typ`, missing attributes) and produce
//! deliberately broken tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, EncodingKey};
use p256::ecdsa::signature::Signer;
use serde_json::{json, Map, Value};

/// Fluent claims builder with sensible live defaults: `exp` an hour
/// out, `iat` just past.
pub struct ClaimsBuilder {
    claims: Map<String, Value>,
}

impl Default for ClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsBuilder {
    #[must_use]
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("exp".to_string(), json!(now + 3600));
        claims.insert("iat".to_string(), json!(now - 10));
        Self { claims }
    }

    #[must_use]
    pub fn issuer(mut self, iss: &str) -> Self {
        self.claims.insert("iss".to_string(), json!(iss));
        self
    }

    #[must_use]
    pub fn subject(mut self, sub: &str) -> Self {
        self.claims.insert("sub".to_string(), json!(sub));
        self
    }

    #[must_use]
    pub fn upn(mut self, upn: &str) -> Self {
        self.claims.insert("upn".to_string(), json!(upn));
        self
    }

    #[must_use]
    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.claims.insert("groups".to_string(), json!(groups));
        self
    }

    #[must_use]
    pub fn expires_at(mut self, exp: i64) -> Self {
        self.claims.insert("exp".to_string(), json!(exp));
        self
    }

    #[must_use]
    pub fn issued_at(mut self, iat: i64) -> Self {
        self.claims.insert("iat".to_string(), json!(iat));
        self
    }

    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    #[must_use]
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}

/// A standard `JWT` header with optional kid.
#[must_use]
pub fn header(alg: &str, kid: Option<&str>) -> Value {
    let mut header = json!({ "alg": alg, "typ": "JWT" });
    if let (Some(obj), Some(kid)) = (header.as_object_mut(), kid) {
        obj.insert("kid".to_string(), json!(kid));
    }
    header
}

fn assemble(header: &Value, claims: &Value, sign: impl FnOnce(&[u8]) -> String) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
    );
    let signature = sign(signing_input.as_bytes());
    format!("{signing_input}.{signature}")
}

/// Sign with an HMAC secret. `alg` picks the width (`HS256`...).
#[must_use]
pub fn sign_hmac(header_json: &Value, claims: &Value, secret: &str) -> String {
    let alg = match header_json.get("alg").and_then(Value::as_str) {
        Some("HS384") => Algorithm::HS384,
        Some("HS512") => Algorithm::HS512,
        _ => Algorithm::HS256,
    };
    assemble(header_json, claims, |input| {
        jsonwebtoken::crypto::sign(input, &EncodingKey::from_secret(secret.as_bytes()), alg)
            .expect("HMAC signing failed")
    })
}

/// Sign RS256 with a PKCS#8 private key PEM.
#[must_use]
pub fn sign_rs256(header_json: &Value, claims: &Value, private_pem: &str) -> String {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("invalid RSA private PEM");
    assemble(header_json, claims, |input| {
        jsonwebtoken::crypto::sign(input, &key, Algorithm::RS256).expect("RSA signing failed")
    })
}

/// Sign ES256 with a P-256 key.
#[must_use]
pub fn sign_es256(header_json: &Value, claims: &Value, key: &p256::ecdsa::SigningKey) -> String {
    assemble(header_json, claims, |input| {
        let signature: p256::ecdsa::Signature = key.sign(input);
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    })
}

/// Sign ES512 with a P-521 key.
#[must_use]
pub fn sign_es512(header_json: &Value, claims: &Value, key: &p521::ecdsa::SigningKey) -> String {
    assemble(header_json, claims, |input| {
        let signature: p521::ecdsa::Signature = key.sign(input);
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    })
}

/// Rewrite one claim in the payload segment, leaving the signature
/// untouched. The result must fail signature verification.
#[must_use]
pub fn tamper_claim(jwt: &str, name: &str, value: Value) -> String {
    let mut parts: Vec<&str> = jwt.split('.').collect();
    let payload = parts.get(1).expect("token must have three segments");
    let bytes = URL_SAFE_NO_PAD.decode(payload).expect("payload must decode");
    let mut claims: Map<String, Value> =
        serde_json::from_slice(&bytes).expect("payload must be a JSON object");
    claims.insert(name.to_string(), value);
    let forged = URL_SAFE_NO_PAD.encode(Value::Object(claims).to_string());
    parts[1] = &forged;
    parts.join(".")
}
