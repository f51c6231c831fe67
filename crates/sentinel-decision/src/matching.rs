//! Rule predicate matching.
//!
//! Empty predicate sets are wildcards. String matching is exact and
//! case-sensitive. A rule carrying device conditions only matches when
//! posture is known — the rule-level device check is strict regardless of
//! the policy-level fail-open setting.

use sentinel_core::posture::DevicePosture;
use sentinel_core::types::{Mode, Timestamp};
use sentinel_policy::{DeviceConditions, Rule};

pub fn rule_matches(
    rule: &Rule,
    username: &str,
    profile: &str,
    mode: Mode,
    at: Timestamp,
    posture: Option<&DevicePosture>,
) -> bool {
    if !rule.users.is_empty() && !rule.users.iter().any(|u| u == username) {
        return false;
    }
    if !rule.profiles.is_empty() && !rule.profiles.iter().any(|p| p == profile) {
        return false;
    }
    if !rule.modes.is_empty() && !rule.modes.contains(&mode) {
        return false;
    }
    if let Some(window) = &rule.time {
        if !window.contains(at) {
            return false;
        }
    }
    if let Some(conditions) = &rule.device_conditions {
        if !conditions.is_empty() {
            match posture {
                Some(posture) => {
                    if !conditions_hold(conditions, posture) {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }
    true
}

/// Every specified condition must hold. Tri-state posture attributes only
/// satisfy a requirement when affirmatively true; "not checked" fails.
fn conditions_hold(conditions: &DeviceConditions, posture: &DevicePosture) -> bool {
    if conditions.require_mdm && posture.mdm_enrolled != Some(true) {
        return false;
    }
    if conditions.require_encryption && posture.disk_encrypted != Some(true) {
        return false;
    }
    if conditions.require_mdm_compliant && posture.mdm_compliant != Some(true) {
        return false;
    }
    if let Some(min) = &conditions.min_os_version {
        match &posture.os_version {
            Some(actual) => {
                if !version_at_least(actual, min) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

/// Dotted-numeric version comparison: `14.2.1 >= 14.2`, `13.9 < 14.0`.
/// Non-numeric segments compare as zero.
pub fn version_at_least(actual: &str, min: &str) -> bool {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|seg| seg.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let a = parse(actual);
    let b = parse(min);
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sentinel_core::types::{DeviceId, Effect};
    use sentinel_policy::{HourRange, TimeWindow, Weekday};
    use std::time::Duration;

    fn rule() -> Rule {
        Rule {
            name: "business-hours".to_string(),
            users: vec!["alice".to_string()],
            profiles: vec!["staging".to_string()],
            modes: vec![],
            time: Some(TimeWindow {
                days: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                ],
                hours: HourRange {
                    start: "09:00".to_string(),
                    end: "18:00".to_string(),
                },
                timezone: "America/New_York".to_string(),
            }),
            device_conditions: None,
            effect: Effect::Allow,
            max_duration: Duration::from_secs(3600),
            max_server_duration: None,
        }
    }

    /// 2026-03-02 is a Monday; 15:30 UTC is 10:30 in New York.
    fn monday_1030_ny() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0).unwrap()
    }

    /// 2026-03-07 is a Saturday.
    fn saturday_1030_ny() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 7, 15, 30, 0).unwrap()
    }

    fn posture(enrolled: Option<bool>, encrypted: Option<bool>) -> DevicePosture {
        let mut p = DevicePosture::unknown(DeviceId::from_digest([1; 32]), Utc::now(), "test");
        p.mdm_enrolled = enrolled;
        p.disk_encrypted = encrypted;
        p
    }

    #[test]
    fn full_predicate_match() {
        assert!(rule_matches(&rule(), "alice", "staging", Mode::Cli, monday_1030_ny(), None));
    }

    #[test]
    fn user_mismatch_is_case_sensitive() {
        assert!(!rule_matches(&rule(), "Alice", "staging", Mode::Cli, monday_1030_ny(), None));
        assert!(!rule_matches(&rule(), "bob", "staging", Mode::Cli, monday_1030_ny(), None));
    }

    #[test]
    fn profile_match_is_exact() {
        assert!(!rule_matches(&rule(), "alice", "staging-eu", Mode::Cli, monday_1030_ny(), None));
    }

    #[test]
    fn weekend_does_not_match() {
        assert!(!rule_matches(&rule(), "alice", "staging", Mode::Cli, saturday_1030_ny(), None));
    }

    #[test]
    fn window_boundaries_half_open() {
        // 09:00 New York == 14:00 UTC on 2026-03-02 (EST). Matches.
        let opening = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        assert!(rule_matches(&rule(), "alice", "staging", Mode::Cli, opening, None));
        // One minute before opening does not.
        let before = Utc.with_ymd_and_hms(2026, 3, 2, 13, 59, 0).unwrap();
        assert!(!rule_matches(&rule(), "alice", "staging", Mode::Cli, before, None));
        // 18:00 exactly does not match.
        let closing = Utc.with_ymd_and_hms(2026, 3, 2, 23, 0, 0).unwrap();
        assert!(!rule_matches(&rule(), "alice", "staging", Mode::Cli, closing, None));
        // 17:59 does.
        let last_minute = Utc.with_ymd_and_hms(2026, 3, 2, 22, 59, 0).unwrap();
        assert!(rule_matches(&rule(), "alice", "staging", Mode::Cli, last_minute, None));
    }

    #[test]
    fn mode_set_restricts() {
        let mut r = rule();
        r.modes = vec![Mode::Server];
        assert!(!rule_matches(&r, "alice", "staging", Mode::Cli, monday_1030_ny(), None));
        assert!(rule_matches(&r, "alice", "staging", Mode::Server, monday_1030_ny(), None));
    }

    #[test]
    fn empty_sets_are_wildcards() {
        let r = Rule {
            name: "wildcard".to_string(),
            users: vec![],
            profiles: vec!["staging".to_string()],
            modes: vec![],
            time: None,
            device_conditions: None,
            effect: Effect::Allow,
            max_duration: Duration::from_secs(3600),
            max_server_duration: None,
        };
        assert!(rule_matches(&r, "anyone", "staging", Mode::CredentialProcess, monday_1030_ny(), None));
    }

    #[test]
    fn device_conditions_fail_without_posture() {
        let mut r = rule();
        r.device_conditions = Some(DeviceConditions {
            require_mdm: true,
            ..Default::default()
        });
        assert!(!rule_matches(&r, "alice", "staging", Mode::Cli, monday_1030_ny(), None));
    }

    #[test]
    fn device_conditions_tri_state() {
        let mut r = rule();
        r.device_conditions = Some(DeviceConditions {
            require_mdm: true,
            require_encryption: true,
            ..Default::default()
        });
        let t = monday_1030_ny();
        // Checked and true: matches.
        assert!(rule_matches(&r, "alice", "staging", Mode::Cli, t, Some(&posture(Some(true), Some(true)))));
        // Checked and false: fails.
        assert!(!rule_matches(&r, "alice", "staging", Mode::Cli, t, Some(&posture(Some(true), Some(false)))));
        // Not checked: fails the same way.
        assert!(!rule_matches(&r, "alice", "staging", Mode::Cli, t, Some(&posture(Some(true), None))));
    }

    #[test]
    fn min_os_version_comparison() {
        assert!(version_at_least("14.2.1", "14.2"));
        assert!(version_at_least("14.2", "14.2"));
        assert!(version_at_least("15.0", "14.9"));
        assert!(!version_at_least("13.9", "14.0"));
        assert!(!version_at_least("14", "14.0.1"));
    }
}
