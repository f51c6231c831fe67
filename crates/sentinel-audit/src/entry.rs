//! Decision-log records.

use serde::{Deserialize, Serialize};

use sentinel_core::identity::Identity;
use sentinel_core::types::{Mode, RequestId, SourceIdentity, Timestamp};
use sentinel_decision::Decision;

/// One decision, as written to the log (before signing).
///
/// Field order is the canonical serialization order; the HMAC covers these
/// exact bytes, so reordering fields is a breaking change for every
/// previously signed stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub ts: Timestamp,
    pub request_id: String,
    pub principal: String,
    pub profile: String,
    pub rule: Option<String>,
    pub effect: Option<String>,
    pub allowed: bool,
    pub max_duration_s: u64,
    pub mode: String,
    pub device_bound: bool,
    pub break_glass: bool,
    pub source_identity: Option<String>,
    pub correlation_id: Option<String>,
}

impl DecisionLogEntry {
    pub fn new(
        decision: &Decision,
        identity: &Identity,
        profile: &str,
        mode: Mode,
        request_id: &RequestId,
        source_identity: Option<&SourceIdentity>,
        correlation_id: Option<String>,
        ts: Timestamp,
    ) -> Self {
        Self {
            ts,
            request_id: request_id.to_string(),
            principal: identity.arn.clone(),
            profile: profile.to_string(),
            rule: decision.matched_rule.clone(),
            effect: decision.effect.map(|e| e.to_string()),
            allowed: decision.allow,
            max_duration_s: decision.max_duration.as_secs(),
            mode: mode.to_string(),
            device_bound: decision.device_bound,
            break_glass: decision.break_glass,
            source_identity: source_identity.map(|s| s.as_str().to_string()),
            correlation_id,
        }
    }
}

/// A signed log line: `{entry, ts, key_id, sig}` where `sig` is Base64
/// HMAC-SHA256 over `entry_bytes ‖ ts ‖ key_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedEntry {
    pub entry: DecisionLogEntry,
    pub ts: String,
    pub key_id: String,
    pub sig: String,
}
