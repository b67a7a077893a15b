//! Configuration access for the validation components.
//!
//! Components never read configuration ad hoc; they take a
//! [`ConfigSource`] at construction and resolve everything up front.
//! The [`PrefixedConfig`] wrapper namespaces lookups under
//! `geronimo.jwt-auth.` while letting MicroProfile-standard keys
//! (`mp.*`, `org.eclipse.*`) pass through unprefixed.

use std::collections::HashMap;

/// Read-only key/value configuration.
pub trait ConfigSource: Send + Sync {
    /// Look up a configuration value. `None` means unset; empty strings
    /// are returned as-is.
    fn read(&self, key: &str) -> Option<String>;

    /// Look up a value, falling back to `default` when unset.
    fn read_or(&self, key: &str, default: &str) -> String {
        self.read(key).unwrap_or_else(|| default.to_string())
    }
}

impl<C: ConfigSource + ?Sized> ConfigSource for &C {
    fn read(&self, key: &str) -> Option<String> {
        (**self).read(key)
    }
}

/// In-memory configuration backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Build from properties-format text (`key=value` lines).
    #[must_use]
    pub fn from_properties(text: &str) -> Self {
        Self {
            values: parse_properties(text),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for MapConfig {
    fn read(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Configuration backed by process environment variables.
///
/// Keys are looked up verbatim first, then with dots replaced by
/// underscores and uppercased (`geronimo.jwt-auth.issuer.default` ->
/// `GERONIMO_JWT_AUTH_ISSUER_DEFAULT`), matching how deployment
/// environments usually surface dotted property names.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl ConfigSource for EnvConfig {
    fn read(&self, key: &str) -> Option<String> {
        if let Ok(value) = std::env::var(key) {
            return Some(value);
        }
        let env_key: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        std::env::var(env_key).ok()
    }
}

/// Namespace prefix applied by [`PrefixedConfig`].
pub const CONFIG_PREFIX: &str = "geronimo.jwt-auth.";

/// Wrapper prepending [`CONFIG_PREFIX`] to every lookup, except for
/// MicroProfile-standard keys which are already fully qualified.
#[derive(Debug, Clone)]
pub struct PrefixedConfig<C> {
    inner: C,
}

impl<C: ConfigSource> PrefixedConfig<C> {
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: ConfigSource> ConfigSource for PrefixedConfig<C> {
    fn read(&self, key: &str) -> Option<String> {
        if key.starts_with("mp.") || key.starts_with("org.eclipse.") {
            self.inner.read(key)
        } else {
            self.inner.read(&format!("{CONFIG_PREFIX}{key}"))
        }
    }
}

/// Parse properties-format text into a map.
///
/// `key=value` per line, leading/trailing whitespace trimmed, lines
/// starting with `#` or `!` ignored, split on the first `=` only.
/// Lines without `=` map the whole trimmed line to an empty value.
#[must_use]
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                values.insert(line.to_string(), String::new());
            }
        }
    }
    values
}

/// Parse a boolean the way the original property layer does: exactly
/// `true` (case-insensitive) is true, anything else is false.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
