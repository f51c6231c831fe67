//! Server-resolved device posture.
//!
//! All boolean attributes are tri-state (`Option<bool>`): `None` means the
//! MDM did not report the attribute, which is distinct from a reported
//! `false`. Rule matching treats both `None` and `Some(false)` as failing a
//! required condition.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, Timestamp};

/// Security-relevant attributes of a device, as reported by an MDM provider.
/// Never derived from client-supplied claims.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DevicePosture {
    pub device_id: DeviceId,
    pub collected_at: Timestamp,
    /// Which provider answered the lookup.
    pub source: String,
    pub mdm_enrolled: Option<bool>,
    pub mdm_compliant: Option<bool>,
    pub disk_encrypted: Option<bool>,
    pub firewall_enabled: Option<bool>,
    pub os_type: Option<String>,
    pub os_version: Option<String>,
}

impl DevicePosture {
    /// An "unknown" posture: the device exists but nothing was checked.
    /// Produced by the noop provider when MDM is not configured.
    pub fn unknown(device_id: DeviceId, now: Timestamp, source: &str) -> Self {
        Self {
            device_id,
            collected_at: now,
            source: source.to_string(),
            mdm_enrolled: None,
            mdm_compliant: None,
            disk_encrypted: None,
            firewall_enabled: None,
            os_type: None,
            os_version: None,
        }
    }
}
