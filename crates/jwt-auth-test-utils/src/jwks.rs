//! JWKS document builders for wiremock-served endpoints.

use serde_json::{json, Value};

use crate::keys::{P256KeyFixture, RsaKeyFixture};

/// An RSA signature JWK for the given kid.
#[must_use]
pub fn rsa_jwk(kid: &str, fixture: &RsaKeyFixture) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": fixture.n_b64,
        "e": fixture.e_b64,
    })
}

/// A P-256 signature JWK for the given kid.
#[must_use]
pub fn p256_jwk(kid: &str, fixture: &P256KeyFixture) -> Value {
    json!({
        "kty": "EC",
        "kid": kid,
        "use": "sig",
        "alg": "ES256",
        "crv": "P-256",
        "x": fixture.x_b64,
        "y": fixture.y_b64,
    })
}

/// A JWK Set document wrapping the given keys.
#[must_use]
pub fn jwks_document(keys: &[Value]) -> Value {
    json!({ "keys": keys })
}
