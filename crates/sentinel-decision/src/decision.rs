//! Decision request and outcome records.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use sentinel_core::identity::Identity;
use sentinel_core::types::{DeviceId, Effect, Mode, Timestamp};

/// Everything the orchestrator needs about one credential request.
#[derive(Clone, Debug)]
pub struct DecisionRequest {
    pub identity: Identity,
    pub profile: String,
    pub mode: Mode,
    pub requested_duration: Duration,
    pub request_time: Timestamp,
    pub device_id: Option<DeviceId>,
}

/// The orchestrator's verdict. Side-effect free: recording and vending
/// happen above this layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub matched_rule: Option<String>,
    pub effect: Option<Effect>,
    /// Bound on the issued session; zero when denied.
    pub max_duration: Duration,
    pub reasons: Vec<String>,
    /// Set when an active break-glass event overrode the outcome.
    pub break_glass: bool,
    /// Remaining break-glass window; an additional vending ceiling.
    pub break_glass_remaining: Option<Duration>,
    /// Whether device posture participated in the match.
    pub device_bound: bool,
}

impl Decision {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            matched_rule: None,
            effect: None,
            max_duration: Duration::ZERO,
            reasons: vec![reason.into()],
            break_glass: false,
            break_glass_remaining: None,
            device_bound: false,
        }
    }
}
