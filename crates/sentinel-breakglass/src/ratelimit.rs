//! Break-glass rate limiting.
//!
//! The checker holds no in-process state: every cooldown read and quota
//! count goes to the store, so limits hold across all client machines
//! sharing a policy. The check order is fixed — cooldown, then per-user
//! quota, then per-profile quota, then the escalation threshold — and the
//! first blocking check short-circuits the rest.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sentinel_core::error::SentinelError;
use sentinel_core::types::Timestamp;
use sentinel_policy::RateLimitPolicy;
use sentinel_store::BreakGlassStore;

/// Which check blocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitReason {
    Cooldown,
    UserQuota,
    ProfileQuota,
}

impl fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateLimitReason::Cooldown => "cooldown",
            RateLimitReason::UserQuota => "user_quota",
            RateLimitReason::ProfileQuota => "profile_quota",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitResult {
    pub blocked: bool,
    pub reason: Option<RateLimitReason>,
    /// Set for cooldown blocks.
    pub retry_after: Option<Duration>,
    /// Escalation does not block; the notifier layer acts on this flag.
    pub should_escalate: bool,
}

impl RateLimitResult {
    fn clear() -> Self {
        Self {
            blocked: false,
            reason: None,
            retry_after: None,
            should_escalate: false,
        }
    }

    fn blocked_by(reason: RateLimitReason, retry_after: Option<Duration>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason),
            retry_after,
            should_escalate: false,
        }
    }
}

pub struct RateLimitChecker {
    store: Arc<dyn BreakGlassStore>,
}

impl RateLimitChecker {
    pub fn new(store: Arc<dyn BreakGlassStore>) -> Self {
        Self { store }
    }

    pub async fn check(
        &self,
        policy: &RateLimitPolicy,
        invoker: &str,
        profile: &str,
        now: Timestamp,
    ) -> Result<RateLimitResult, SentinelError> {
        let Some(rule) = policy.rule_for(profile) else {
            return Ok(RateLimitResult::clear());
        };

        // 1. Cooldown. Elapsed exactly equal to the cooldown still blocks.
        if let Some(cooldown) = rule.cooldown {
            if let Some(last) = self.store.last_event(invoker, profile).await? {
                let elapsed = (now - last.created_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                if elapsed <= cooldown {
                    return Ok(RateLimitResult::blocked_by(
                        RateLimitReason::Cooldown,
                        Some(cooldown - elapsed),
                    ));
                }
            }
        }

        let window = rule.quota_window;
        let user_count = match (window, rule.max_per_user.or(rule.escalation_threshold)) {
            (Some(window), Some(_)) => {
                let since = now
                    - chrono::Duration::from_std(window)
                        .map_err(|e| SentinelError::Internal(e.to_string()))?;
                self.store
                    .events_for_invoker_since(invoker, since)
                    .await?
                    .len() as u32
            }
            _ => 0,
        };

        // 2. Per-user quota. A count equal to the limit blocks.
        if let Some(max) = rule.max_per_user {
            if user_count >= max {
                return Ok(RateLimitResult::blocked_by(RateLimitReason::UserQuota, None));
            }
        }

        // 3. Per-profile quota.
        if let (Some(max), Some(window)) = (rule.max_per_profile, window) {
            let since = now
                - chrono::Duration::from_std(window)
                    .map_err(|e| SentinelError::Internal(e.to_string()))?;
            let profile_count = self
                .store
                .events_for_profile_since(profile, since)
                .await?
                .len() as u32;
            if profile_count >= max {
                return Ok(RateLimitResult::blocked_by(
                    RateLimitReason::ProfileQuota,
                    None,
                ));
            }
        }

        // 4. Escalation threshold: flag, never block.
        let mut result = RateLimitResult::clear();
        if let Some(threshold) = rule.escalation_threshold {
            if user_count >= threshold {
                result.should_escalate = true;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use sentinel_core::breakglass::{BreakGlassEvent, BreakGlassStatus, ReasonCode};
    use sentinel_policy::RateLimitRule;

    /// Store fake serving canned events; only the read paths the checker
    /// uses are implemented.
    struct CannedStore {
        events: Vec<BreakGlassEvent>,
    }

    #[async_trait]
    impl BreakGlassStore for CannedStore {
        async fn create(&self, _e: &BreakGlassEvent) -> Result<(), SentinelError> {
            unimplemented!("not used by the checker")
        }
        async fn get(&self, _id: &str) -> Result<Option<BreakGlassEvent>, SentinelError> {
            unimplemented!("not used by the checker")
        }
        async fn update(
            &self,
            _e: &BreakGlassEvent,
            _t: Timestamp,
        ) -> Result<(), SentinelError> {
            unimplemented!("not used by the checker")
        }
        async fn find_active(
            &self,
            _invoker: &str,
            _profile: &str,
            _now: Timestamp,
        ) -> Result<Option<BreakGlassEvent>, SentinelError> {
            Ok(None)
        }
        async fn last_event(
            &self,
            invoker: &str,
            profile: &str,
        ) -> Result<Option<BreakGlassEvent>, SentinelError> {
            Ok(self
                .events
                .iter()
                .filter(|e| e.invoker == invoker && e.profile == profile)
                .max_by_key(|e| e.created_at)
                .cloned())
        }
        async fn events_for_invoker_since(
            &self,
            invoker: &str,
            since: Timestamp,
        ) -> Result<Vec<BreakGlassEvent>, SentinelError> {
            Ok(self
                .events
                .iter()
                .filter(|e| e.invoker == invoker && e.created_at >= since)
                .cloned()
                .collect())
        }
        async fn events_for_profile_since(
            &self,
            profile: &str,
            since: Timestamp,
        ) -> Result<Vec<BreakGlassEvent>, SentinelError> {
            Ok(self
                .events
                .iter()
                .filter(|e| e.profile == profile && e.created_at >= since)
                .cloned()
                .collect())
        }
        async fn expire_due(&self, _now: Timestamp) -> Result<Vec<String>, SentinelError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _id: &str) -> Result<(), SentinelError> {
            Ok(())
        }
    }

    fn event_at(invoker: &str, profile: &str, created_at: Timestamp) -> BreakGlassEvent {
        BreakGlassEvent {
            id: format!("{:016x}", created_at.timestamp_millis() as u64),
            invoker: invoker.to_string(),
            profile: profile.to_string(),
            reason_code: ReasonCode::Incident,
            justification: "a justification long enough to pass checks".to_string(),
            requested_duration: Duration::from_secs(600),
            status: BreakGlassStatus::Closed,
            created_at,
            updated_at: created_at,
            expires_at: created_at + ChronoDuration::seconds(600),
            closed_by: None,
            closed_reason: None,
            request_id: None,
            ttl: (created_at + ChronoDuration::seconds(600)).timestamp(),
        }
    }

    fn checker_with(events: Vec<BreakGlassEvent>) -> RateLimitChecker {
        RateLimitChecker::new(Arc::new(CannedStore { events }))
    }

    fn policy(rule: RateLimitRule) -> RateLimitPolicy {
        RateLimitPolicy { rules: vec![rule] }
    }

    #[tokio::test]
    async fn no_matching_rule_is_clear() {
        let checker = checker_with(vec![]);
        let p = policy(RateLimitRule {
            profiles: vec!["prod*".to_string()],
            cooldown: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let res = checker.check(&p, "alice", "staging", Utc::now()).await.unwrap();
        assert!(!res.blocked);
    }

    #[tokio::test]
    async fn cooldown_blocks_before_quota_is_checked() {
        // Last event 30m ago, cooldown 1h, and the user is far over quota:
        // the fixed order must report `cooldown`, not `user_quota`.
        let now = Utc::now();
        let mut events: Vec<_> = (0..10)
            .map(|i| event_at("alice", "prod", now - ChronoDuration::hours(2) - ChronoDuration::minutes(i)))
            .collect();
        events.push(event_at("alice", "prod", now - ChronoDuration::minutes(30)));
        let checker = checker_with(events);

        let p = policy(RateLimitRule {
            cooldown: Some(Duration::from_secs(3600)),
            max_per_user: Some(5),
            quota_window: Some(Duration::from_secs(24 * 3600)),
            ..Default::default()
        });
        let res = checker.check(&p, "alice", "prod", now).await.unwrap();
        assert!(res.blocked);
        assert_eq!(res.reason, Some(RateLimitReason::Cooldown));
        assert_eq!(res.retry_after, Some(Duration::from_secs(1800)));
    }

    #[tokio::test]
    async fn cooldown_exactly_at_expiry_still_blocks() {
        let now = Utc::now();
        let checker = checker_with(vec![event_at("alice", "prod", now - ChronoDuration::hours(1))]);
        let p = policy(RateLimitRule {
            cooldown: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let res = checker.check(&p, "alice", "prod", now).await.unwrap();
        assert!(res.blocked);
        assert_eq!(res.reason, Some(RateLimitReason::Cooldown));
    }

    #[tokio::test]
    async fn cooldown_past_expiry_allows() {
        let now = Utc::now();
        let checker = checker_with(vec![event_at(
            "alice",
            "prod",
            now - ChronoDuration::hours(1) - ChronoDuration::seconds(1),
        )]);
        let p = policy(RateLimitRule {
            cooldown: Some(Duration::from_secs(3600)),
            ..Default::default()
        });
        let res = checker.check(&p, "alice", "prod", now).await.unwrap();
        assert!(!res.blocked);
    }

    #[tokio::test]
    async fn user_quota_boundary() {
        let now = Utc::now();
        let events: Vec<_> = (0..5)
            .map(|i| event_at("alice", "prod", now - ChronoDuration::hours(2 + i)))
            .collect();
        let checker = checker_with(events);
        let p = policy(RateLimitRule {
            max_per_user: Some(5),
            quota_window: Some(Duration::from_secs(24 * 3600)),
            ..Default::default()
        });
        // count == max blocks
        let res = checker.check(&p, "alice", "prod", now).await.unwrap();
        assert_eq!(res.reason, Some(RateLimitReason::UserQuota));

        // count == max - 1 allows
        let p6 = policy(RateLimitRule {
            max_per_user: Some(6),
            quota_window: Some(Duration::from_secs(24 * 3600)),
            ..Default::default()
        });
        let res = checker.check(&p6, "alice", "prod", now).await.unwrap();
        assert!(!res.blocked);
    }

    #[tokio::test]
    async fn profile_quota_counts_all_users() {
        let now = Utc::now();
        let events = vec![
            event_at("alice", "prod", now - ChronoDuration::hours(2)),
            event_at("bob", "prod", now - ChronoDuration::hours(3)),
            event_at("carol", "prod", now - ChronoDuration::hours(4)),
        ];
        let checker = checker_with(events);
        let p = policy(RateLimitRule {
            max_per_profile: Some(3),
            quota_window: Some(Duration::from_secs(24 * 3600)),
            ..Default::default()
        });
        let res = checker.check(&p, "dave", "prod", now).await.unwrap();
        assert_eq!(res.reason, Some(RateLimitReason::ProfileQuota));
    }

    #[tokio::test]
    async fn escalation_flags_without_blocking() {
        let now = Utc::now();
        let events: Vec<_> = (0..3)
            .map(|i| event_at("alice", "prod", now - ChronoDuration::hours(2 + i)))
            .collect();
        let checker = checker_with(events);
        let p = policy(RateLimitRule {
            max_per_user: Some(10),
            escalation_threshold: Some(3),
            quota_window: Some(Duration::from_secs(24 * 3600)),
            ..Default::default()
        });
        let res = checker.check(&p, "alice", "prod", now).await.unwrap();
        assert!(!res.blocked);
        assert!(res.should_escalate);
    }
}
