//! Shape-directed claim resolution for hosts that bind claims to
//! typed slots (configuration values, request context fields).
//!
//! This is a thin dispatch over [`Token`]'s own coercion: the caller
//! states the shape it wants and the resolver bridges the remaining
//! gap, unwrapping single-element sets into scalars and lifting
//! scalars into sets.

use crate::token::{ClaimValue, Token};

/// The shape a host wants a claim delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimShape {
    /// Exactly one string or number value.
    Scalar,
    /// Like `Scalar`, but absence is fine.
    OptionalScalar,
    /// A string set; scalar claims become singletons.
    Collection,
    /// The raw JSON value, whatever it is.
    Json,
}

/// Resolves claims into caller-requested shapes.
pub struct ClaimInjectionResolver;

impl ClaimInjectionResolver {
    /// Resolve `name` from the token into the requested shape.
    /// `None` means the claim is absent or cannot fit the shape;
    /// distinguishing the two is the caller's policy (`Scalar` vs
    /// `OptionalScalar` exists for exactly that).
    #[must_use]
    pub fn resolve(token: &Token, name: &str, shape: ClaimShape) -> Option<ClaimValue> {
        let value = token.get_claim(name)?;
        match shape {
            ClaimShape::Scalar | ClaimShape::OptionalScalar => match value {
                ClaimValue::String(_) | ClaimValue::Number(_) => Some(value),
                // a one-element set collapses to its element
                ClaimValue::StringSet(set) if set.len() == 1 => {
                    set.into_iter().next().map(ClaimValue::String)
                }
                _ => None,
            },
            ClaimShape::Collection => match value {
                ClaimValue::StringSet(_) => Some(value),
                // scalar claims lift into singleton sets, reusing the
                // comma-split rule string claims already follow
                ClaimValue::String(s) => Some(ClaimValue::StringSet(
                    s.split(',').map(str::to_string).collect(),
                )),
                ClaimValue::Number(n) => {
                    Some(ClaimValue::StringSet([n.to_string()].into_iter().collect()))
                }
                ClaimValue::Json(_) => None,
            },
            ClaimShape::Json => token.raw_claim(name).cloned().map(ClaimValue::Json),
        }
    }
}
