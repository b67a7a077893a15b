//! Key and issuer resolution for token verification.
//!
//! A [`KeyStore`] turns the `kid` header of an incoming token into key
//! material, trying in order: the static `kids.key.mapping` table, the
//! cached remote JWKS snapshot, a local file named by the kid, a file
//! under the configured resource directory, a remote JWKS fetch, the
//! configured default key, and finally the kid itself as a literal
//! (which doubles as the shared secret for HMAC setups).
//!
//! The remote snapshot is replaced wholesale on each successful fetch;
//! readers always see either the previous or the new complete set.
//! Concurrent cold-path resolutions are collapsed into a single fetch.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::{parse_bool, parse_properties, ConfigSource};
use crate::error::ConfigError;
use crate::jwk::JwkSet;

const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

#[derive(Error, Debug)]
enum KeyFetchError {
    #[error("request failed")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Resolves token `kid` headers to key material and allowed issuers.
pub struct KeyStore {
    /// Static mapping plus memoized local resolutions.
    keys: RwLock<HashMap<String, String>>,

    issuer_mapping: HashMap<String, BTreeSet<String>>,
    default_issuers: BTreeSet<String>,
    default_key: Option<String>,
    resource_dir: Option<PathBuf>,
    jwks_url: Option<String>,
    fetch_before_default: bool,

    http: reqwest::Client,

    /// Remote JWKS snapshot (kid -> SPKI PEM), replaced wholesale.
    remote: Arc<RwLock<HashMap<String, String>>>,

    /// 0 until the first fetch attempt completes (success or failure).
    fetch_generation: Arc<AtomicU64>,

    /// Serializes fetches so concurrent cold paths collapse into one.
    fetch_lock: Arc<Mutex<()>>,

    refresh_task: Option<JoinHandle<()>>,
}

impl KeyStore {
    /// Build from configuration. Static key-mapping values that name a
    /// readable file are loaded eagerly; unreadable files fail fast.
    ///
    /// Keys: `kids.key.mapping`, `kids.issuer.mapping`,
    /// `issuer.default` (fallback the MicroProfile `issuer` key),
    /// the MicroProfile `issuers` list, `public-key.default` (fallback
    /// the MicroProfile `verifierPublicKey` key),
    /// `mp.jwt.verify.publickey.location`, `key.resource.dir`,
    /// `jwks.invalidation.interval` (seconds, 0 = fetch once),
    /// `jwks.fetch.timeout`, `jwks.fetch-before-default`.
    pub fn from_config<C: ConfigSource>(config: &C) -> Result<Self, ConfigError> {
        let resource_dir = config.read("key.resource.dir").map(PathBuf::from);

        let mut keys = HashMap::new();
        if let Some(text) = config.read("kids.key.mapping") {
            for (kid, value) in parse_properties(&text) {
                let material = load_key_material(&value, resource_dir.as_deref())?;
                keys.insert(kid, material);
            }
        }

        let mut issuer_mapping = HashMap::new();
        if let Some(text) = config.read("kids.issuer.mapping") {
            for (kid, value) in parse_properties(&text) {
                issuer_mapping.insert(kid, split_trimmed(&value));
            }
        }

        let mut default_issuers = BTreeSet::new();
        if let Some(list) =
            config.read("org.eclipse.microprofile.authentication.JWT.issuers")
        {
            default_issuers.extend(split_trimmed(&list));
        }
        if let Some(issuer) = config.read("issuer.default").or_else(|| {
            config.read("org.eclipse.microprofile.authentication.JWT.issuer")
        }) {
            default_issuers.insert(issuer);
        }

        let default_key = config.read("public-key.default").or_else(|| {
            config.read("org.eclipse.microprofile.authentication.JWT.verifierPublicKey")
        });

        let jwks_url = config.read("mp.jwt.verify.publickey.location");
        let refresh_interval = parse_seconds(config, "jwks.invalidation.interval", 0)?;
        let fetch_timeout =
            parse_seconds(config, "jwks.fetch.timeout", DEFAULT_FETCH_TIMEOUT_SECONDS)?;
        let fetch_before_default =
            parse_bool(&config.read_or("jwks.fetch-before-default", "true"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch_timeout))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "jwt_auth.keys", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        let remote = Arc::new(RwLock::new(HashMap::new()));
        let fetch_generation = Arc::new(AtomicU64::new(0));
        let fetch_lock = Arc::new(Mutex::new(()));

        let refresh_task = match (&jwks_url, refresh_interval) {
            (Some(url), interval) if interval > 0 => Some(spawn_refresh_task(
                http.clone(),
                url.clone(),
                interval,
                Arc::clone(&remote),
                Arc::clone(&fetch_generation),
                Arc::clone(&fetch_lock),
            )),
            _ => None,
        };

        Ok(Self {
            keys: RwLock::new(keys),
            issuer_mapping,
            default_issuers,
            default_key,
            resource_dir,
            jwks_url,
            fetch_before_default,
            http,
            remote,
            fetch_generation,
            fetch_lock,
            refresh_task,
        })
    }

    /// Resolve a kid to key material. Never fails: an unresolvable kid
    /// falls back to its own literal value, and a key that turns out
    /// to be unusable surfaces later as a signature failure.
    pub async fn resolve_key(&self, kid: &str) -> String {
        if let Some(key) = self.keys.read().await.get(kid) {
            return key.clone();
        }
        if let Some(key) = self.remote.read().await.get(kid) {
            return key.clone();
        }
        if let Some(key) = self.load_local(kid) {
            // Memoize only real resolutions, never the literal echo.
            if key != kid {
                self.keys
                    .write()
                    .await
                    .insert(kid.to_string(), key.clone());
            }
            return key;
        }

        if self.jwks_url.is_some() {
            if !self.fetch_before_default {
                if let Some(default) = &self.default_key {
                    return default.clone();
                }
            }
            self.ensure_fetched().await;
            if let Some(key) = self.remote.read().await.get(kid) {
                return key.clone();
            }
        }

        if let Some(default) = &self.default_key {
            return default.clone();
        }

        tracing::debug!(target: "jwt_auth.keys", kid = %kid, "No key resolved, using kid literally");
        kid.to_string()
    }

    /// Issuers allowed for tokens signed under this kid. An empty set
    /// means no issuer restriction applies.
    #[must_use]
    pub fn resolve_issuers(&self, kid: &str) -> BTreeSet<String> {
        self.issuer_mapping
            .get(kid)
            .cloned()
            .unwrap_or_else(|| self.default_issuers.clone())
    }

    fn load_local(&self, kid: &str) -> Option<String> {
        let direct = Path::new(kid);
        if direct.is_file() {
            match std::fs::read_to_string(direct) {
                Ok(content) => return Some(content.trim_end().to_string()),
                Err(e) => {
                    tracing::warn!(target: "jwt_auth.keys", kid = %kid, error = %e, "Failed to read key file");
                }
            }
        }
        if let Some(dir) = &self.resource_dir {
            let candidate = dir.join(kid);
            if candidate.is_file() {
                match std::fs::read_to_string(&candidate) {
                    Ok(content) => return Some(content.trim_end().to_string()),
                    Err(e) => {
                        tracing::warn!(target: "jwt_auth.keys", kid = %kid, error = %e, "Failed to read key resource");
                    }
                }
            }
        }
        None
    }

    /// Cold-path fetch with single-flight semantics: the first caller
    /// fetches while the rest await the same attempt; once one attempt
    /// has completed (either way) this becomes a no-op and freshness
    /// is the refresh task's concern.
    async fn ensure_fetched(&self) {
        if self.fetch_generation.load(Ordering::Acquire) > 0 {
            return;
        }
        let Some(url) = &self.jwks_url else { return };

        let _guard = self.fetch_lock.lock().await;
        if self.fetch_generation.load(Ordering::Acquire) > 0 {
            return;
        }

        match fetch_jwks(&self.http, url).await {
            Ok(snapshot) => {
                *self.remote.write().await = snapshot;
            }
            Err(e) => {
                tracing::warn!(target: "jwt_auth.keys", url = %url, error = %e, "JWKS fetch failed");
            }
        }
        self.fetch_generation.fetch_add(1, Ordering::Release);
    }
}

impl Drop for KeyStore {
    fn drop(&mut self) {
        if let Some(task) = &self.refresh_task {
            task.abort();
        }
    }
}

fn spawn_refresh_task(
    http: reqwest::Client,
    url: String,
    interval_seconds: u64,
    remote: Arc<RwLock<HashMap<String, String>>>,
    fetch_generation: Arc<AtomicU64>,
    fetch_lock: Arc<Mutex<()>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        loop {
            // first tick fires immediately, giving an eager initial fetch
            ticker.tick().await;
            let _guard = fetch_lock.lock().await;
            match fetch_jwks(&http, &url).await {
                Ok(snapshot) => {
                    let count = snapshot.len();
                    *remote.write().await = snapshot;
                    tracing::debug!(target: "jwt_auth.keys", url = %url, key_count = count, "JWKS snapshot refreshed");
                }
                Err(e) => {
                    tracing::warn!(target: "jwt_auth.keys", url = %url, error = %e, "JWKS refresh failed, keeping previous snapshot");
                }
            }
            fetch_generation.fetch_add(1, Ordering::Release);
        }
    })
}

async fn fetch_jwks(
    http: &reqwest::Client,
    url: &str,
) -> Result<HashMap<String, String>, KeyFetchError> {
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(KeyFetchError::Status(response.status()));
    }
    let set: JwkSet = response.json().await?;

    let mut snapshot = HashMap::new();
    for jwk in set.keys.into_iter().filter(crate::jwk::Jwk::is_signature_key) {
        match jwk.to_pem() {
            Ok(pem) => {
                snapshot.insert(jwk.kid.clone(), pem);
            }
            Err(e) => {
                tracing::warn!(target: "jwt_auth.keys", kid = %jwk.kid, error = %e, "Skipping unconvertible JWK");
            }
        }
    }
    Ok(snapshot)
}

fn load_key_material(
    value: &str,
    resource_dir: Option<&Path>,
) -> Result<String, ConfigError> {
    let direct = Path::new(value);
    if direct.is_file() {
        return std::fs::read_to_string(direct)
            .map(|content| content.trim_end().to_string())
            .map_err(|source| ConfigError::KeyMaterial {
                path: value.to_string(),
                source,
            });
    }
    if let Some(dir) = resource_dir {
        let candidate = dir.join(value);
        if candidate.is_file() {
            return std::fs::read_to_string(&candidate)
                .map(|content| content.trim_end().to_string())
                .map_err(|source| ConfigError::KeyMaterial {
                    path: candidate.display().to_string(),
                    source,
                });
        }
    }
    Ok(value.to_string())
}

fn split_trimmed(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_seconds<C: ConfigSource>(
    config: &C,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match config.read(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::MapConfig;

    #[tokio::test]
    async fn static_mapping_wins() {
        let mut config = MapConfig::default();
        config.set("kids.key.mapping", "kid-1=literal-key-material");
        config.set("public-key.default", "default-key");
        let store = KeyStore::from_config(&config).unwrap();

        assert_eq!(store.resolve_key("kid-1").await, "literal-key-material");
    }

    #[tokio::test]
    async fn default_key_before_literal_fallback() {
        let mut config = MapConfig::default();
        config.set("public-key.default", "default-key");
        let store = KeyStore::from_config(&config).unwrap();

        assert_eq!(store.resolve_key("unknown").await, "default-key");
    }

    #[tokio::test]
    async fn unresolvable_kid_falls_back_to_itself() {
        let store = KeyStore::from_config(&MapConfig::default()).unwrap();
        assert_eq!(store.resolve_key("shared-secret").await, "shared-secret");
    }

    #[tokio::test]
    async fn file_valued_mapping_loads_eagerly() {
        let path = std::env::temp_dir().join(format!(
            "jwt-auth-key-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        std::fs::write(&path, "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n")
            .unwrap();

        let mut config = MapConfig::default();
        config.set("kids.key.mapping", format!("kid-1={}", path.display()));
        let store = KeyStore::from_config(&config).unwrap();

        let key = store.resolve_key("kid-1").await;
        assert!(key.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(key.ends_with("-----END PUBLIC KEY-----"));

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn kid_naming_a_file_is_loaded_and_memoized() {
        let path = std::env::temp_dir().join(format!(
            "jwt-auth-kidfile-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        std::fs::write(&path, "file-key-material\n").unwrap();
        let kid = path.display().to_string();

        let store = KeyStore::from_config(&MapConfig::default()).unwrap();
        assert_eq!(store.resolve_key(&kid).await, "file-key-material");

        // second resolution served from the memoized map
        std::fs::remove_file(&path).unwrap();
        assert_eq!(store.resolve_key(&kid).await, "file-key-material");
    }

    #[tokio::test]
    async fn resource_dir_lookup() {
        let dir = std::env::temp_dir().join(format!(
            "jwt-auth-resources-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kid-r"), "resource-key").unwrap();

        let mut config = MapConfig::default();
        config.set("key.resource.dir", dir.display().to_string());
        let store = KeyStore::from_config(&config).unwrap();

        assert_eq!(store.resolve_key("kid-r").await, "resource-key");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn issuer_mapping_and_default() {
        let mut config = MapConfig::default();
        config.set("kids.issuer.mapping", "kid-1=iss-a, iss-b");
        config.set("issuer.default", "iss-default");
        let store = KeyStore::from_config(&config).unwrap();

        let mapped = store.resolve_issuers("kid-1");
        assert_eq!(mapped.len(), 2);
        assert!(mapped.contains("iss-a"));
        assert!(mapped.contains("iss-b"));

        let fallback = store.resolve_issuers("other");
        assert_eq!(fallback.len(), 1);
        assert!(fallback.contains("iss-default"));
    }

    #[test]
    fn default_issuers_union_of_list_and_single() {
        let mut config = MapConfig::default();
        config.set(
            "org.eclipse.microprofile.authentication.JWT.issuers",
            "iss-1, iss-2",
        );
        config.set(
            "org.eclipse.microprofile.authentication.JWT.issuer",
            "iss-3",
        );
        let store = KeyStore::from_config(&config).unwrap();

        let issuers = store.resolve_issuers("any");
        assert_eq!(issuers.len(), 3);
    }

    #[test]
    fn no_issuer_config_means_no_restriction() {
        let store = KeyStore::from_config(&MapConfig::default()).unwrap();
        assert!(store.resolve_issuers("any").is_empty());
    }

    #[test]
    fn missing_mapped_file_fails_fast() {
        // a path-looking value that is not a file stays a literal
        let mut config = MapConfig::default();
        config.set("kids.key.mapping", "kid-1=/nonexistent/path/key.pem");
        let store = KeyStore::from_config(&config).unwrap();
        // constructor treats it as literal material; nothing panics
        drop(store);
    }

    #[test]
    fn bad_interval_fails_fast() {
        let mut config = MapConfig::default();
        config.set("jwks.invalidation.interval", "often");
        assert!(KeyStore::from_config(&config).is_err());
    }
}
