//! MicroProfile-style JWT validation core.
//!
//! This crate parses and validates compact JWTs: structural split,
//! header checks, temporal claims, issuer restriction, and signature
//! verification against keys resolved from static configuration,
//! local files, or a remote JWKS endpoint. Validated tokens expose
//! their claims through a typed coercion layer, and roles can be
//! expanded to deployment groups.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jwt_auth::{KeyStore, MapConfig, PrefixedConfig, TokenParser};
//!
//! let config = PrefixedConfig::new(MapConfig::from_properties(properties_text));
//! let keys = Arc::new(KeyStore::from_config(&config)?);
//! let parser = TokenParser::new(&config, keys)?;
//!
//! let token = parser.parse(compact_jwt).await?;
//! let caller = token.name();
//! let groups = token.groups();
//! ```
//!
//! Out of scope: JWE, token issuance, and HTTP integration. The host
//! passes tokens in and carries the resulting [`Token`] explicitly;
//! no ambient per-request state exists here.

pub mod config;
pub mod date;
pub mod error;
pub mod groups;
pub mod injection;
pub mod jwk;
pub mod keys;
pub mod parser;
pub mod signature;
pub mod token;

pub use config::{ConfigSource, EnvConfig, MapConfig, PrefixedConfig};
pub use date::DateValidator;
pub use error::{ConfigError, JwtError};
pub use groups::GroupMapper;
pub use injection::{ClaimInjectionResolver, ClaimShape};
pub use jwk::{Jwk, JwkSet};
pub use keys::KeyStore;
pub use parser::TokenParser;
pub use signature::SignatureValidator;
pub use token::{Claim, ClaimType, ClaimValue, Token};
