//! Validated token and typed claim access.
//!
//! A [`Token`] owns the raw compact serialization plus the decoded
//! payload object, and exposes claims through a small coercion layer:
//! each standard claim declares a [`ClaimType`], and JSON values are
//! shaped into that type on access. Set-typed claims accept both a
//! JSON array and a comma-separated string form.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

/// Standard claims with a declared shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Claim {
    Issuer,
    Subject,
    Audience,
    ExpirationTime,
    IssuedAtTime,
    AuthTime,
    NotBefore,
    TokenId,
    UserPrincipalName,
    Groups,
    RawToken,
}

/// The shape a claim is coerced into on access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimType {
    String,
    Number,
    StringSet,
    Json,
}

impl Claim {
    /// The claim's wire name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Issuer => "iss",
            Self::Subject => "sub",
            Self::Audience => "aud",
            Self::ExpirationTime => "exp",
            Self::IssuedAtTime => "iat",
            Self::AuthTime => "auth_time",
            Self::NotBefore => "nbf",
            Self::TokenId => "jti",
            Self::UserPrincipalName => "upn",
            Self::Groups => "groups",
            Self::RawToken => "raw_token",
        }
    }

    /// Look up a standard claim by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "iss" => Some(Self::Issuer),
            "sub" => Some(Self::Subject),
            "aud" => Some(Self::Audience),
            "exp" => Some(Self::ExpirationTime),
            "iat" => Some(Self::IssuedAtTime),
            "auth_time" => Some(Self::AuthTime),
            "nbf" => Some(Self::NotBefore),
            "jti" => Some(Self::TokenId),
            "upn" => Some(Self::UserPrincipalName),
            "groups" => Some(Self::Groups),
            "raw_token" => Some(Self::RawToken),
            _ => None,
        }
    }

    /// The declared shape of this claim.
    #[must_use]
    pub fn claim_type(&self) -> ClaimType {
        match self {
            Self::Issuer | Self::Subject | Self::TokenId | Self::UserPrincipalName
            | Self::RawToken => ClaimType::String,
            Self::ExpirationTime | Self::IssuedAtTime | Self::AuthTime | Self::NotBefore => {
                ClaimType::Number
            }
            Self::Audience | Self::Groups => ClaimType::StringSet,
        }
    }
}

/// A claim value after coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    String(String),
    Number(i64),
    StringSet(BTreeSet<String>),
    Json(Value),
}

impl ClaimValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::StringSet(set) => Some(set),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// A parsed and validated JWT.
///
/// Construction happens only inside the parser after signature and date
/// validation succeeded; holding a `Token` implies the token was valid
/// at parse time.
#[derive(Clone)]
pub struct Token {
    raw: String,
    payload: Map<String, Value>,
}

impl Token {
    pub(crate) fn new(raw: String, payload: Map<String, Value>) -> Self {
        Self { raw, payload }
    }

    /// The raw compact serialization this token was parsed from.
    #[must_use]
    pub fn raw_token(&self) -> &str {
        &self.raw
    }

    /// Claim names present in the payload.
    pub fn claim_names(&self) -> impl Iterator<Item = &str> {
        self.payload.keys().map(String::as_str)
    }

    /// Whether the payload carries the named claim.
    #[must_use]
    pub fn contains_claim(&self, name: &str) -> bool {
        self.payload.contains_key(name)
    }

    /// The raw JSON value of a claim, without coercion.
    #[must_use]
    pub fn raw_claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Look up a claim and coerce it to its declared shape.
    ///
    /// Standard claims coerce per [`Claim::claim_type`]; a claim whose
    /// JSON value does not fit its declared shape yields `None`.
    /// Unknown claims are returned as raw JSON.
    #[must_use]
    pub fn get_claim(&self, name: &str) -> Option<ClaimValue> {
        if name == Claim::RawToken.name() {
            return Some(ClaimValue::String(self.raw.clone()));
        }
        let value = self.payload.get(name)?;
        match Claim::from_name(name) {
            Some(claim) => coerce(value, claim.claim_type()),
            None => Some(ClaimValue::Json(value.clone())),
        }
    }

    /// `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> Option<String> {
        self.string_claim(Claim::Issuer)
    }

    /// `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.string_claim(Claim::Subject)
    }

    /// `aud` claim as a set. A single string audience becomes a
    /// one-element set.
    #[must_use]
    pub fn audience(&self) -> Option<BTreeSet<String>> {
        self.set_claim(Claim::Audience)
    }

    /// `jti` claim.
    #[must_use]
    pub fn token_id(&self) -> Option<String> {
        self.string_claim(Claim::TokenId)
    }

    /// `exp` claim in epoch seconds.
    #[must_use]
    pub fn expiration_time(&self) -> Option<i64> {
        self.number_claim(Claim::ExpirationTime)
    }

    /// `iat` claim in epoch seconds.
    #[must_use]
    pub fn issued_at_time(&self) -> Option<i64> {
        self.number_claim(Claim::IssuedAtTime)
    }

    /// `groups` claim as a set; empty set when absent.
    #[must_use]
    pub fn groups(&self) -> BTreeSet<String> {
        self.set_claim(Claim::Groups).unwrap_or_default()
    }

    /// The caller principal name, from `upn`.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.string_claim(Claim::UserPrincipalName)
    }

    fn string_claim(&self, claim: Claim) -> Option<String> {
        match self.get_claim(claim.name())? {
            ClaimValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn number_claim(&self, claim: Claim) -> Option<i64> {
        self.get_claim(claim.name())?.as_i64()
    }

    fn set_claim(&self, claim: Claim) -> Option<BTreeSet<String>> {
        match self.get_claim(claim.name())? {
            ClaimValue::StringSet(set) => Some(set),
            _ => None,
        }
    }
}

// Identifier claims are redacted; everything else is summarized.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("iss", &self.raw_claim("iss"))
            .field("sub", &self.raw_claim("sub").map(|_| "[REDACTED]"))
            .field("upn", &self.raw_claim("upn").map(|_| "[REDACTED]"))
            .field("exp", &self.raw_claim("exp"))
            .field("claims", &self.payload.len())
            .finish()
    }
}

/// Shape a JSON value into the requested claim type.
pub(crate) fn coerce(value: &Value, ty: ClaimType) -> Option<ClaimValue> {
    match ty {
        ClaimType::String => value.as_str().map(|s| ClaimValue::String(s.to_string())),
        ClaimType::Number => value.as_i64().map(ClaimValue::Number),
        ClaimType::StringSet => coerce_set(value).map(ClaimValue::StringSet),
        ClaimType::Json => Some(ClaimValue::Json(value.clone())),
    }
}

/// Set coercion accepts two wire forms: a comma-separated string
/// (split verbatim, no trimming, empty segments kept) and a JSON array
/// whose elements are stringified (strings as-is, numbers via their
/// canonical text form, other values via compact JSON).
fn coerce_set(value: &Value) -> Option<BTreeSet<String>> {
    match value {
        Value::String(s) => Some(s.split(',').map(str::to_string).collect()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        _ => None,
    }
}
