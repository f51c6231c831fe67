//! Break-glass event records.
//!
//! A break-glass event is a time-bounded emergency bypass of normal policy.
//! Its lifecycle is strictly one-way: `active → closed` (operator action) or
//! `active → expired` (TTL). Terminal states never change again; the store
//! enforces this with conditional writes keyed on `updated_at`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::{RequestId, Timestamp};

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakGlassStatus {
    Active,
    Closed,
    Expired,
}

impl BreakGlassStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BreakGlassStatus::Closed | BreakGlassStatus::Expired)
    }
}

impl fmt::Display for BreakGlassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakGlassStatus::Active => "active",
            BreakGlassStatus::Closed => "closed",
            BreakGlassStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

// ── ReasonCode ───────────────────────────────────────────────────────────────

/// Closed set of reasons an invoker may cite. Free-form detail goes in the
/// justification, which is mandatory either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Incident,
    Maintenance,
    Security,
    Recovery,
    Other,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::Incident => "incident",
            ReasonCode::Maintenance => "maintenance",
            ReasonCode::Security => "security",
            ReasonCode::Recovery => "recovery",
            ReasonCode::Other => "other",
        };
        write!(f, "{s}")
    }
}

// ── BreakGlassEvent ──────────────────────────────────────────────────────────

/// Persistent record of one emergency bypass.
///
/// Invariants enforced by the store layer:
/// - at most one `active` event per (invoker, profile) at any instant
/// - `updated_at` is the optimistic-lock token for every mutation
/// - terminal records are immutable
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakGlassEvent {
    /// 16 lowercase hex chars, crypto-random.
    pub id: String,
    pub invoker: String,
    pub profile: String,
    pub reason_code: ReasonCode,
    /// Mandatory free-form justification, 20–1000 characters.
    pub justification: String,
    pub requested_duration: Duration,
    pub status: BreakGlassStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub expires_at: Timestamp,
    pub closed_by: Option<String>,
    pub closed_reason: Option<String>,
    /// Request id of the invocation, for audit correlation.
    pub request_id: Option<RequestId>,
    /// Unix seconds mirror of `expires_at`, for hosted-KV TTL attributes.
    pub ttl: i64,
}

impl BreakGlassEvent {
    /// Whether this event authorizes credentials right now. Both conditions
    /// must hold; either failing invalidates the event regardless of the
    /// other.
    pub fn authorizes(&self, now: Timestamp) -> bool {
        self.status == BreakGlassStatus::Active && now < self.expires_at
    }

    /// Remaining emergency-access window, or `None` once expired.
    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        if !self.authorizes(now) {
            return None;
        }
        (self.expires_at - now).to_std().ok()
    }
}
