//! Server-mode session records: one per issued credential set, backing
//! real-time revocation.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, SourceIdentity, Timestamp};

/// Record of one issued credential set in server mode.
///
/// Indexed by principal, profile, and device id. Revocation sets the flag
/// under the optimistic lock; subsequent requests referencing the session id
/// must fail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerSession {
    pub id: String,
    pub principal: String,
    pub profile: String,
    pub device_id: Option<DeviceId>,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked: bool,
    pub source_identity: SourceIdentity,
    /// Optimistic-lock token for the revoke write.
    pub updated_at: Timestamp,
    /// Unix seconds mirror of `expires_at`, for hosted-KV TTL attributes.
    pub ttl: i64,
}

impl ServerSession {
    /// Whether the session may still be referenced by credential requests.
    pub fn is_active(&self, now: Timestamp) -> bool {
        !self.revoked && now < self.expires_at
    }
}
