//! End-to-end validation against real signatures for each algorithm
//! family.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use jwt_auth::{
    ClaimInjectionResolver, ClaimShape, GroupMapper, JwtError, KeyStore, MapConfig, TokenParser,
};
use jwt_auth_test_utils::{
    header, p256_fixture, p521_fixture, rsa_fixture, sign_es256, sign_es512, sign_hmac,
    sign_rs256, tamper_claim, ClaimsBuilder,
};
use serde_json::json;

fn parser_for(config: &MapConfig) -> TokenParser {
    let keys = Arc::new(KeyStore::from_config(config).unwrap());
    TokenParser::new(config, keys).unwrap()
}

/// Key material in properties files is single-line PEM; the validator
/// re-wraps it.
fn single_line(pem: &str) -> String {
    pem.replace('\n', "")
}

#[tokio::test]
async fn rs256_round_trip_with_static_key_mapping() {
    let fixture = rsa_fixture();
    let mut config = MapConfig::default();
    config.set(
        "kids.key.mapping",
        format!("orange-1234={}", single_line(&fixture.public_pem)),
    );

    let claims = ClaimsBuilder::new()
        .issuer("https://idp.example")
        .subject("user-1")
        .upn("alice@example.com")
        .groups(&["viewer", "editor"])
        .build();
    let jwt = sign_rs256(
        &header("RS256", Some("orange-1234")),
        &claims,
        &fixture.private_pem,
    );

    let token = parser_for(&config).parse(&jwt).await.unwrap();
    assert_eq!(token.issuer().as_deref(), Some("https://idp.example"));
    assert_eq!(token.subject().as_deref(), Some("user-1"));
    assert_eq!(token.name().as_deref(), Some("alice@example.com"));
    assert!(token.groups().contains("editor"));
    assert_eq!(token.raw_token(), jwt);
}

#[tokio::test]
async fn es256_round_trip() {
    let fixture = p256_fixture();
    let mut config = MapConfig::default();
    config.set("header.alg.supported", "ES256");
    config.set(
        "kids.key.mapping",
        format!("ec-1={}", single_line(&fixture.public_pem)),
    );

    let claims = ClaimsBuilder::new().subject("user-2").build();
    let jwt = sign_es256(&header("ES256", Some("ec-1")), &claims, &fixture.signing_key);

    let token = parser_for(&config).parse(&jwt).await.unwrap();
    assert_eq!(token.subject().as_deref(), Some("user-2"));
}

#[tokio::test]
async fn es512_round_trip() {
    let fixture = p521_fixture();
    let mut config = MapConfig::default();
    config.set("header.alg.supported", "ES512");
    config.set(
        "kids.key.mapping",
        format!("ec-5={}", single_line(&fixture.public_pem)),
    );

    let claims = ClaimsBuilder::new().subject("user-3").build();
    let jwt = sign_es512(&header("ES512", Some("ec-5")), &claims, &fixture.signing_key);

    let token = parser_for(&config).parse(&jwt).await.unwrap();
    assert_eq!(token.subject().as_deref(), Some("user-3"));
}

#[tokio::test]
async fn hmac_uses_default_key_as_shared_secret() {
    let mut config = MapConfig::default();
    config.set("header.alg.supported", "HS256");
    config.set("public-key.default", "top-secret");

    let claims = ClaimsBuilder::new().subject("user-4").build();
    let jwt = sign_hmac(&header("HS256", Some("any-kid")), &claims, "top-secret");

    let token = parser_for(&config).parse(&jwt).await.unwrap();
    assert_eq!(token.subject().as_deref(), Some("user-4"));
}

#[tokio::test]
async fn tampered_payload_rejected_per_family() {
    let rsa = rsa_fixture();
    let p256 = p256_fixture();

    let mut config = MapConfig::default();
    config.set("header.alg.supported", "RS256,ES256,HS256");
    config.set(
        "kids.key.mapping",
        format!(
            "rsa-kid={}\nec-kid={}",
            single_line(&rsa.public_pem),
            single_line(&p256.public_pem),
        ),
    );
    config.set("public-key.default", "hmac-secret");
    let parser = parser_for(&config);

    let claims = ClaimsBuilder::new().subject("honest").build();
    let tokens = [
        sign_rs256(&header("RS256", Some("rsa-kid")), &claims, &rsa.private_pem),
        sign_es256(&header("ES256", Some("ec-kid")), &claims, &p256.signing_key),
        sign_hmac(&header("HS256", Some("h")), &claims, "hmac-secret"),
    ];

    for jwt in &tokens {
        assert!(parser.parse(jwt).await.is_ok(), "untampered must pass");
        let forged = tamper_claim(jwt, "sub", json!("attacker"));
        assert_eq!(
            parser.parse(&forged).await.unwrap_err(),
            JwtError::InvalidSignature
        );
    }
}

#[tokio::test]
async fn expired_and_future_tokens_rejected() {
    let mut config = MapConfig::default();
    config.set("header.alg.supported", "HS256");
    config.set("public-key.default", "secret");
    let parser = parser_for(&config);
    let now = chrono::Utc::now().timestamp();

    let expired = sign_hmac(
        &header("HS256", Some("k")),
        &ClaimsBuilder::new().expires_at(now - 3600).build(),
        "secret",
    );
    assert_eq!(parser.parse(&expired).await.unwrap_err(), JwtError::Expired);

    let premature = sign_hmac(
        &header("HS256", Some("k")),
        &ClaimsBuilder::new().issued_at(now + 3600).build(),
        "secret",
    );
    assert_eq!(
        parser.parse(&premature).await.unwrap_err(),
        JwtError::IssuedInFuture
    );

    let missing_exp = sign_hmac(
        &header("HS256", Some("k")),
        &ClaimsBuilder::new().without("exp").build(),
        "secret",
    );
    assert_eq!(
        parser.parse(&missing_exp).await.unwrap_err(),
        JwtError::MissingExpiration
    );
}

#[tokio::test]
async fn issuer_mapping_restricts_per_kid() {
    let mut config = MapConfig::default();
    config.set("header.alg.supported", "HS256");
    config.set("public-key.default", "secret");
    config.set("kids.issuer.mapping", "kid-a=https://idp-a.example");
    config.set("issuer.default", "https://idp-default.example");
    let parser = parser_for(&config);

    // kid-a only accepts its mapped issuer
    let ok = sign_hmac(
        &header("HS256", Some("kid-a")),
        &ClaimsBuilder::new().issuer("https://idp-a.example").build(),
        "secret",
    );
    assert!(parser.parse(&ok).await.is_ok());

    let wrong = sign_hmac(
        &header("HS256", Some("kid-a")),
        &ClaimsBuilder::new()
            .issuer("https://idp-default.example")
            .build(),
        "secret",
    );
    assert_eq!(
        parser.parse(&wrong).await.unwrap_err(),
        JwtError::InvalidIssuer
    );

    // unmapped kids fall back to the default issuer set
    let fallback = sign_hmac(
        &header("HS256", Some("kid-b")),
        &ClaimsBuilder::new()
            .issuer("https://idp-default.example")
            .build(),
        "secret",
    );
    assert!(parser.parse(&fallback).await.is_ok());
}

#[tokio::test]
async fn groups_flow_through_mapping_and_injection() {
    let mut config = MapConfig::default();
    config.set("header.alg.supported", "HS256");
    config.set("public-key.default", "secret");
    config.set("groups.mapping", "admin=ops,superuser");
    let parser = parser_for(&config);

    let jwt = sign_hmac(
        &header("HS256", Some("k")),
        &ClaimsBuilder::new().groups(&["admin", "viewer"]).build(),
        "secret",
    );
    let token = parser.parse(&jwt).await.unwrap();

    let mapper = GroupMapper::from_config(&config);
    let roles = token.groups();
    let groups = mapper.map_all(roles.iter().map(String::as_str));
    assert!(groups.contains("ops"));
    assert!(groups.contains("superuser"));
    assert!(groups.contains("viewer"));
    assert!(!groups.contains("admin"));

    let shaped =
        ClaimInjectionResolver::resolve(&token, "groups", ClaimShape::Collection).unwrap();
    assert_eq!(shaped.as_set().unwrap().len(), 2);
}

#[tokio::test]
async fn comma_string_groups_coerce_like_arrays() {
    let mut config = MapConfig::default();
    config.set("header.alg.supported", "HS256");
    config.set("public-key.default", "secret");
    let parser = parser_for(&config);

    let jwt = sign_hmac(
        &header("HS256", Some("k")),
        &ClaimsBuilder::new()
            .claim("groups", json!("viewer,editor"))
            .build(),
        "secret",
    );
    let token = parser.parse(&jwt).await.unwrap();
    let groups = token.groups();
    assert!(groups.contains("viewer"));
    assert!(groups.contains("editor"));
}
