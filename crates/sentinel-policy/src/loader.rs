//! The policy loader chain.
//!
//! Production composition is `CachedLoader<VerifyingLoader<RawLoader>>`:
//! `RawLoader` fetches parameter bytes, `VerifyingLoader` refuses anything
//! whose signature does not verify, `CachedLoader` keeps decoded policies
//! for a short TTL. Errors are never cached so transient verifier failures
//! retry on the next request.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use sentinel_core::constants::{KV_TIMEOUT, POLICY_CACHE_TTL};
use sentinel_core::error::SentinelError;
use sentinel_crypto::SignatureVerifier;

use crate::model::Policy;
use crate::schema::parse_policy;
use crate::store::ParameterStore;
use crate::SignatureEnvelope;

/// Produces a validated `Policy` for a profile. `load_raw` exposes the
/// underlying parameter bytes for the signature layer and tooling; it never
/// parses.
#[async_trait]
pub trait PolicyLoader: Send + Sync {
    async fn load(&self, profile: &str) -> Result<Policy, SentinelError>;
    async fn load_raw(&self, profile: &str) -> Result<Vec<u8>, SentinelError>;
}

// ── RawLoader ────────────────────────────────────────────────────────────────

/// Fetches parameter bytes and parses them directly as YAML. Used alone only
/// when policy signing is disabled; production wraps it in a
/// `VerifyingLoader`.
pub struct RawLoader {
    store: Arc<dyn ParameterStore>,
    policy_root: String,
}

impl RawLoader {
    pub fn new(store: Arc<dyn ParameterStore>, policy_root: impl Into<String>) -> Self {
        Self {
            store,
            policy_root: policy_root.into(),
        }
    }

    fn parameter_name(&self, profile: &str) -> String {
        format!("{}/{}", self.policy_root.trim_end_matches('/'), profile)
    }

    async fn fetch(&self, profile: &str) -> Result<Vec<u8>, SentinelError> {
        let name = self.parameter_name(profile);
        let param = tokio::time::timeout(KV_TIMEOUT, self.store.get(&name))
            .await
            .map_err(|_| SentinelError::DeadlineExceeded {
                operation: format!("parameter fetch {name}"),
            })??;
        match param {
            Some(p) => Ok(p.value),
            None => Err(SentinelError::PolicyNotFound(profile.to_string())),
        }
    }
}

#[async_trait]
impl PolicyLoader for RawLoader {
    async fn load(&self, profile: &str) -> Result<Policy, SentinelError> {
        let bytes = self.fetch(profile).await?;
        parse_policy(&bytes)
    }

    async fn load_raw(&self, profile: &str) -> Result<Vec<u8>, SentinelError> {
        self.fetch(profile).await
    }
}

// ── VerifyingLoader ──────────────────────────────────────────────────────────

/// Treats the parameter bytes as a signature envelope, verifies the
/// signature over the decoded payload, then parses the payload as YAML.
///
/// Fail-closed: a verification error is indistinguishable from a rejected
/// signature; there is no fallback to unverified bytes.
pub struct VerifyingLoader<L> {
    inner: L,
    verifier: Arc<dyn SignatureVerifier>,
}

impl<L: PolicyLoader> VerifyingLoader<L> {
    pub fn new(inner: L, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { inner, verifier }
    }
}

#[async_trait]
impl<L: PolicyLoader> PolicyLoader for VerifyingLoader<L> {
    async fn load(&self, profile: &str) -> Result<Policy, SentinelError> {
        let raw = self.inner.load_raw(profile).await?;
        let envelope = SignatureEnvelope::parse(&raw)?;
        let payload = envelope.payload_bytes()?;
        let signature = envelope.signature_bytes()?;

        let valid = self
            .verifier
            .verify(&envelope.kms_key_id, envelope.algorithm, &payload, &signature)
            .await
            .map_err(|e| {
                warn!(profile, error = %e, "signature verification errored; failing closed");
                SentinelError::SignatureInvalid(format!("verification unavailable: {e}"))
            })?;
        if !valid {
            return Err(SentinelError::SignatureInvalid(format!(
                "key {} rejected policy signature for {profile}",
                envelope.kms_key_id
            )));
        }
        parse_policy(&payload)
    }

    async fn load_raw(&self, profile: &str) -> Result<Vec<u8>, SentinelError> {
        self.inner.load_raw(profile).await
    }
}

// ── CachedLoader ─────────────────────────────────────────────────────────────

struct CacheEntry {
    policy: Policy,
    loaded_at: Instant,
}

/// Read-mostly policy cache. The sole in-process shared mutable state of the
/// broker: concurrent readers, single writer installing fresh entries,
/// errors never cached.
pub struct CachedLoader<L> {
    inner: L,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl<L: PolicyLoader> CachedLoader<L> {
    pub fn new(inner: L) -> Self {
        Self::with_ttl(inner, POLICY_CACHE_TTL)
    }

    pub fn with_ttl(inner: L, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<L: PolicyLoader> PolicyLoader for CachedLoader<L> {
    async fn load(&self, profile: &str) -> Result<Policy, SentinelError> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| SentinelError::Internal("policy cache poisoned".to_string()))?;
            if let Some(entry) = cache.get(profile) {
                if entry.loaded_at.elapsed() < self.ttl {
                    debug!(profile, "policy cache hit");
                    return Ok(entry.policy.clone());
                }
            }
        }

        let policy = self.inner.load(profile).await?;

        let mut cache = self
            .cache
            .write()
            .map_err(|_| SentinelError::Internal("policy cache poisoned".to_string()))?;
        cache.insert(
            profile.to_string(),
            CacheEntry {
                policy: policy.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(policy)
    }

    async fn load_raw(&self, profile: &str) -> Result<Vec<u8>, SentinelError> {
        // Raw bytes are for the signature layer; caching them would let a
        // stale envelope outlive a parameter rotation.
        self.inner.load_raw(profile).await
    }
}
