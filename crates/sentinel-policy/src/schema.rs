//! Schema validation for parsed policy documents.
//!
//! Parsing (serde) already rejects structural problems: unknown effects,
//! unknown weekdays, unknown MFA methods, unknown device-condition keys,
//! malformed durations. This pass enforces the semantic constraints that
//! serde cannot see.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use sentinel_core::constants::{
    BREAK_GLASS_MAX_DURATION, MAX_RULE_DURATION, SUPPORTED_POLICY_VERSIONS,
};
use sentinel_core::error::SentinelError;

use crate::model::{parse_hhmm, Policy, TimeWindow};

/// Parse policy bytes as YAML and validate the result.
pub fn parse_policy(bytes: &[u8]) -> Result<Policy, SentinelError> {
    let policy: Policy = serde_yaml::from_slice(bytes)
        .map_err(|e| SentinelError::PolicyInvalid(e.to_string()))?;
    validate(&policy)?;
    Ok(policy)
}

/// Validate semantic constraints on a parsed policy.
pub fn validate(policy: &Policy) -> Result<(), SentinelError> {
    if !SUPPORTED_POLICY_VERSIONS.contains(&policy.version.as_str()) {
        return Err(SentinelError::UnsupportedSchemaVersion(
            policy.version.clone(),
        ));
    }
    if policy.rules.is_empty() {
        return Err(SentinelError::EmptyPolicy);
    }

    let mut names = HashSet::new();
    for rule in &policy.rules {
        if !names.insert(rule.name.as_str()) {
            return Err(SentinelError::DuplicateRuleName(rule.name.clone()));
        }
        if !rule.has_predicates() {
            return Err(SentinelError::RuleWithoutPredicates(rule.name.clone()));
        }
        if let Some(window) = &rule.time {
            validate_window(window)?;
        }
        validate_rule_duration(&rule.name, rule.max_duration)?;
        if let Some(server) = rule.max_server_duration {
            validate_rule_duration(&rule.name, server)?;
            if server > rule.max_duration {
                return Err(SentinelError::ServerDurationExceedsMax(rule.name.clone()));
            }
        }
    }

    if let Some(bg) = &policy.break_glass {
        if let Some(max) = bg.max_duration {
            if max.is_zero() || max > BREAK_GLASS_MAX_DURATION {
                return Err(SentinelError::BreakGlassDurationTooLong {
                    max_secs: BREAK_GLASS_MAX_DURATION.as_secs(),
                });
            }
        }
    }

    if let Some(approval) = &policy.approval {
        if approval.ttl.is_zero() {
            return Err(SentinelError::PolicyInvalid(
                "approval ttl must be positive".to_string(),
            ));
        }
        for auto in &approval.auto_approve {
            if let Some(window) = &auto.time {
                validate_window(window)?;
            }
        }
    }

    if let Some(limits) = &policy.rate_limits {
        for (i, rule) in limits.rules.iter().enumerate() {
            let has_quota = rule.max_per_user.is_some()
                || rule.max_per_profile.is_some()
                || rule.escalation_threshold.is_some();
            if has_quota && rule.quota_window.is_none() {
                return Err(SentinelError::PolicyInvalid(format!(
                    "rate-limit rule {i} declares a quota without quota_window"
                )));
            }
            if rule.cooldown.is_some_and(|c| c.is_zero()) {
                return Err(SentinelError::PolicyInvalid(format!(
                    "rate-limit rule {i} has a zero cooldown"
                )));
            }
        }
    }

    Ok(())
}

fn validate_rule_duration(rule: &str, d: Duration) -> Result<(), SentinelError> {
    if d.is_zero() || d > MAX_RULE_DURATION {
        return Err(SentinelError::RuleDurationTooLong {
            rule: rule.to_string(),
            got_secs: d.as_secs(),
            max_secs: MAX_RULE_DURATION.as_secs(),
        });
    }
    Ok(())
}

fn validate_window(window: &TimeWindow) -> Result<(), SentinelError> {
    let start = parse_hhmm(&window.hours.start)
        .ok_or_else(|| SentinelError::InvalidHourFormat(window.hours.start.clone()))?;
    let end = parse_hhmm(&window.hours.end)
        .ok_or_else(|| SentinelError::InvalidHourFormat(window.hours.end.clone()))?;
    if start >= end {
        return Err(SentinelError::InvalidTimeWindow {
            start: window.hours.start.clone(),
            end: window.hours.end.clone(),
        });
    }
    if window.days.is_empty() {
        return Err(SentinelError::PolicyInvalid(
            "time window has an empty day set".to_string(),
        ));
    }
    chrono_tz::Tz::from_str(&window.timezone)
        .map_err(|_| SentinelError::UnknownTimezone(window.timezone.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_yaml() -> &'static str {
        r#"
version: "1"
rules:
  - name: business-hours
    users: [alice]
    profiles: [staging]
    time:
      days: [Mon, Tue, Wed, Thu, Fri]
      hours: {start: "09:00", end: "18:00"}
      timezone: "America/New_York"
    effect: allow
    max_duration: 1h
"#
    }

    #[test]
    fn accepts_well_formed_policy() {
        assert!(parse_policy(base_yaml().as_bytes()).is_ok());
    }

    #[test]
    fn rejects_unsupported_version() {
        let yaml = base_yaml().replace("version: \"1\"", "version: \"99\"");
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::UnsupportedSchemaVersion(v)) if v == "99"
        ));
    }

    #[test]
    fn rejects_empty_rule_list() {
        let yaml = "version: \"1\"\nrules: []\n";
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::EmptyPolicy)
        ));
    }

    #[test]
    fn rejects_duplicate_rule_names() {
        let yaml = r#"
version: "1"
rules:
  - name: r1
    users: [alice]
    effect: allow
  - name: r1
    users: [bob]
    effect: deny
"#;
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::DuplicateRuleName(n)) if n == "r1"
        ));
    }

    #[test]
    fn rejects_rule_without_predicates() {
        let yaml = r#"
version: "1"
rules:
  - name: anything-goes
    effect: allow
"#;
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::RuleWithoutPredicates(_))
        ));
    }

    #[test]
    fn rejects_inverted_window() {
        let yaml = base_yaml().replace("start: \"09:00\", end: \"18:00\"", "start: \"18:00\", end: \"09:00\"");
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::InvalidTimeWindow { .. })
        ));
    }

    #[test]
    fn rejects_malformed_hours() {
        let yaml = base_yaml().replace("\"09:00\"", "\"9:00\"");
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::InvalidHourFormat(_))
        ));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let yaml = base_yaml().replace("America/New_York", "Mars/Olympus_Mons");
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn rejects_excessive_duration() {
        let yaml = base_yaml().replace("max_duration: 1h", "max_duration: 13h");
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::RuleDurationTooLong { .. })
        ));
    }

    #[test]
    fn rejects_server_duration_above_max() {
        let yaml = base_yaml().replace(
            "max_duration: 1h",
            "max_duration: 1h\n    max_server_duration: 2h",
        );
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::ServerDurationExceedsMax(_))
        ));
    }

    #[test]
    fn rejects_quota_without_window() {
        let yaml = format!(
            "{}rate_limits:\n  rules:\n    - profiles: [\"*\"]\n      max_per_user: 5\n",
            base_yaml()
        );
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::PolicyInvalid(_))
        ));
    }

    #[test]
    fn rejects_break_glass_above_hard_cap() {
        let yaml = format!("{}break_glass:\n  max_duration: 5h\n", base_yaml());
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::BreakGlassDurationTooLong { .. })
        ));
    }

    #[test]
    fn rejects_unknown_mfa_method() {
        let yaml = format!(
            "{}break_glass:\n  require_mfa: true\n  mfa_methods: [carrier_pigeon]\n",
            base_yaml()
        );
        assert!(matches!(
            parse_policy(yaml.as_bytes()),
            Err(SentinelError::PolicyInvalid(_))
        ));
    }
}
