//! The policy data model.
//!
//! A policy is a versioned YAML document addressed by profile name in the
//! parameter store: an ordered sequence of rules plus optional companion
//! documents for approval, break-glass, and rate-limit behaviour. Policy
//! bytes are immutable once signed; updates produce a new parameter version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use sentinel_core::types::{Effect, MfaMethod, Mode};

use crate::duration::{serde_duration, serde_opt_duration};

// ── Weekday ──────────────────────────────────────────────────────────────────

/// Day-of-week names as they appear in policy documents (`Mon`..`Sun`, full
/// names accepted as aliases).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(alias = "Monday")]
    Mon,
    #[serde(alias = "Tuesday")]
    Tue,
    #[serde(alias = "Wednesday")]
    Wed,
    #[serde(alias = "Thursday")]
    Thu,
    #[serde(alias = "Friday")]
    Fri,
    #[serde(alias = "Saturday")]
    Sat,
    #[serde(alias = "Sunday")]
    Sun,
}

impl Weekday {
    pub fn to_chrono(self) -> chrono::Weekday {
        match self {
            Weekday::Mon => chrono::Weekday::Mon,
            Weekday::Tue => chrono::Weekday::Tue,
            Weekday::Wed => chrono::Weekday::Wed,
            Weekday::Thu => chrono::Weekday::Thu,
            Weekday::Fri => chrono::Weekday::Fri,
            Weekday::Sat => chrono::Weekday::Sat,
            Weekday::Sun => chrono::Weekday::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ── Time window ──────────────────────────────────────────────────────────────

/// Half-open daily hour range `[start, end)` in `HH:MM`. Wrap-around windows
/// are not modelled; `start < end` is enforced at schema validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: String,
    pub end: String,
}

impl HourRange {
    /// Parse `HH:MM` to minutes since midnight. `None` on malformed input
    /// (schema validation rejects such policies before evaluation).
    pub fn minutes(&self) -> Option<(u16, u16)> {
        Some((parse_hhmm(&self.start)?, parse_hhmm(&self.end)?))
    }
}

/// Strict `HH:MM`: two digits, colon, two digits, hour < 24, minute < 60.
pub fn parse_hhmm(s: &str) -> Option<u16> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
        || !bytes[4].is_ascii_digit()
    {
        return None;
    }
    let hour = (bytes[0] - b'0') as u16 * 10 + (bytes[1] - b'0') as u16;
    let min = (bytes[3] - b'0') as u16 * 10 + (bytes[4] - b'0') as u16;
    if hour > 23 || min > 59 {
        return None;
    }
    Some(hour * 60 + min)
}

/// When a rule applies: weekday set, daily hour range, and the timezone the
/// request time is converted into before comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub days: Vec<Weekday>,
    pub hours: HourRange,
    pub timezone: String,
}

impl TimeWindow {
    /// Whether `t` falls inside the window once converted to the window's
    /// timezone. Comparison is at minute granularity against `[start, end)`:
    /// an instant exactly at `end` does not match. Malformed fields (which
    /// schema validation rejects up front) never match.
    pub fn contains(&self, t: chrono::DateTime<chrono::Utc>) -> bool {
        use chrono::{Datelike, Timelike};
        let Ok(tz) = self.timezone.parse::<chrono_tz::Tz>() else {
            return false;
        };
        let Some((start, end)) = self.hours.minutes() else {
            return false;
        };
        let local = t.with_timezone(&tz);
        if !self.days.iter().any(|d| d.to_chrono() == local.weekday()) {
            return false;
        }
        let minutes = (local.hour() * 60 + local.minute()) as u16;
        start <= minutes && minutes < end
    }
}

// ── Device conditions ────────────────────────────────────────────────────────

/// Posture requirements attached to a rule. Every specified condition must
/// hold against a resolved posture; a rule carrying conditions never matches
/// when posture is unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConditions {
    #[serde(default)]
    pub require_mdm: bool,
    #[serde(default)]
    pub require_encryption: bool,
    #[serde(default)]
    pub require_mdm_compliant: bool,
    #[serde(default)]
    pub min_os_version: Option<String>,
}

impl DeviceConditions {
    pub fn is_empty(&self) -> bool {
        !self.require_mdm
            && !self.require_encryption
            && !self.require_mdm_compliant
            && self.min_os_version.is_none()
    }
}

// ── Rule ─────────────────────────────────────────────────────────────────────

fn default_max_duration() -> Duration {
    Duration::from_secs(3600)
}

/// The atomic matching unit. Empty predicate sets are wildcards; string
/// matching is case-sensitive and exact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub modes: Vec<Mode>,
    #[serde(default)]
    pub time: Option<TimeWindow>,
    #[serde(default)]
    pub device_conditions: Option<DeviceConditions>,
    pub effect: Effect,
    #[serde(default = "default_max_duration", with = "serde_duration")]
    pub max_duration: Duration,
    #[serde(default, with = "serde_opt_duration")]
    pub max_server_duration: Option<Duration>,
}

impl Rule {
    /// True when the rule constrains nothing at all. Such rules are a schema
    /// error: an unconditional rule must still say so via explicit wildcards
    /// on at least one predicate axis.
    pub fn has_predicates(&self) -> bool {
        !self.users.is_empty()
            || !self.profiles.is_empty()
            || !self.modes.is_empty()
            || self.time.is_some()
            || self
                .device_conditions
                .as_ref()
                .is_some_and(|c| !c.is_empty())
    }

    /// Effective ceiling for server-mode issuance.
    pub fn server_ceiling(&self) -> Duration {
        match self.max_server_duration {
            Some(d) => d.min(self.max_duration),
            None => self.max_duration,
        }
    }
}

// ── Companion: approval ──────────────────────────────────────────────────────

fn default_approval_ttl() -> Duration {
    sentinel_core::constants::DEFAULT_APPROVAL_TTL
}

/// Auto-approve condition: a pending request matching one of these is
/// short-circuited to `approved` at request time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoApproveRule {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub time: Option<TimeWindow>,
}

/// Companion document for the `require_approval` effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Who may approve. Empty = anyone except the requester.
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default)]
    pub auto_approve: Vec<AutoApproveRule>,
    /// How long a granted approval authorizes issuance.
    #[serde(default = "default_approval_ttl", with = "serde_duration")]
    pub ttl: Duration,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            approvers: Vec::new(),
            auto_approve: Vec::new(),
            ttl: default_approval_ttl(),
        }
    }
}

// ── Companion: break-glass ───────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// Companion document bounding emergency access for the profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakGlassPolicy {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Who may invoke. Empty = anyone the decision engine already admits.
    #[serde(default)]
    pub allowed_invokers: Vec<String>,
    /// Optional tightening of the 4 h hard cap.
    #[serde(default, with = "serde_opt_duration")]
    pub max_duration: Option<Duration>,
    #[serde(default)]
    pub require_mfa: bool,
    #[serde(default)]
    pub mfa_methods: Vec<MfaMethod>,
}

impl Default for BreakGlassPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_invokers: Vec::new(),
            max_duration: None,
            require_mfa: false,
            mfa_methods: Vec::new(),
        }
    }
}

// ── Companion: rate limits ───────────────────────────────────────────────────

/// One rate-limit rule, matched by profile wildcard (`*` matches any
/// sequence). A matched rule may declare any subset of the limits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Profile patterns, e.g. `["prod*"]`. Empty = matches every profile.
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default, with = "serde_opt_duration")]
    pub cooldown: Option<Duration>,
    #[serde(default)]
    pub max_per_user: Option<u32>,
    #[serde(default)]
    pub max_per_profile: Option<u32>,
    #[serde(default)]
    pub escalation_threshold: Option<u32>,
    #[serde(default, with = "serde_opt_duration")]
    pub quota_window: Option<Duration>,
}

impl RateLimitRule {
    /// First rule whose profile pattern matches wins.
    pub fn matches_profile(&self, profile: &str) -> bool {
        self.profiles.is_empty() || self.profiles.iter().any(|p| wildcard_match(p, profile))
    }
}

/// Companion document for break-glass rate limiting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    #[serde(default)]
    pub rules: Vec<RateLimitRule>,
}

impl RateLimitPolicy {
    pub fn rule_for(&self, profile: &str) -> Option<&RateLimitRule> {
        self.rules.iter().find(|r| r.matches_profile(profile))
    }
}

/// Glob-lite: `*` matches any (possibly empty) character sequence; every
/// other character matches itself exactly.
pub fn wildcard_match(pattern: &str, s: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == s,
        Some((prefix, rest)) => {
            let Some(remainder) = s.strip_prefix(prefix) else {
                return false;
            };
            if rest.is_empty() {
                return true;
            }
            // Try every split point for the remainder of the pattern.
            (0..=remainder.len())
                .any(|i| remainder.is_char_boundary(i) && wildcard_match(rest, &remainder[i..]))
        }
    }
}

// ── Policy ───────────────────────────────────────────────────────────────────

/// A versioned policy document for one profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub version: String,
    pub rules: Vec<Rule>,
    /// Fail-closed switch: when set, posture-resolution errors deny the
    /// request instead of evaluating rules without posture.
    #[serde(default)]
    pub require_device_posture: bool,
    #[serde(default)]
    pub approval: Option<ApprovalPolicy>,
    #[serde(default)]
    pub break_glass: Option<BreakGlassPolicy>,
    #[serde(default)]
    pub rate_limits: Option<RateLimitPolicy>,
}

impl Policy {
    /// Whether any rule in the document carries device conditions.
    pub fn needs_posture(&self) -> bool {
        self.require_device_posture
            || self
                .rules
                .iter()
                .any(|r| r.device_conditions.as_ref().is_some_and(|c| !c.is_empty()))
    }
}
