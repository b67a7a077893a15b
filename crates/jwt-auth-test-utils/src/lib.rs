//! Shared fixtures for `jwt-auth` tests: generated keypairs, compact
//! token builders, and JWKS documents.

pub mod jwks;
pub mod keys;
pub mod tokens;

pub use jwks::{jwks_document, p256_jwk, rsa_jwk};
pub use keys::{p256_fixture, p521_fixture, rsa_fixture};
pub use tokens::{
    header, sign_es256, sign_es512, sign_hmac, sign_rs256, tamper_claim, ClaimsBuilder,
};
