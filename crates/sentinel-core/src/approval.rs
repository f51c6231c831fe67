//! Out-of-band approval request records backing the `require_approval`
//! policy effect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::Timestamp;

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
    Cancelled,
}

impl ApprovalStatus {
    /// Only `pending` may transition; everything else is immutable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Denied => "denied",
            ApprovalStatus::Expired => "expired",
            ApprovalStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ── ApprovalRequest ──────────────────────────────────────────────────────────

/// Persistent record of one approval request.
///
/// While `pending`, `expires_at` bounds how long the request waits for a
/// human. On approval it is reset to `approval time + TTL` and bounds how
/// long the grant authorizes issuance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub requester: String,
    pub profile: String,
    pub requested_duration: Duration,
    pub justification: String,
    pub status: ApprovalStatus,
    pub approver: Option<String>,
    pub approved_at: Option<Timestamp>,
    pub denial_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub expires_at: Timestamp,
    /// Unix seconds mirror of `expires_at`, for hosted-KV TTL attributes.
    pub ttl: i64,
}

impl ApprovalRequest {
    /// Whether this request grants issuance right now.
    pub fn grants(&self, now: Timestamp) -> bool {
        self.status == ApprovalStatus::Approved && now < self.expires_at
    }

    /// Remaining grant window, or `None` when not granting.
    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        if !self.grants(now) {
            return None;
        }
        (self.expires_at - now).to_std().ok()
    }
}
