//! The fingerprinted credential vendor.
//!
//! Every issuance generates a fresh request id and stamps
//! `sentinel:<short-user>:<request-id>` as the session's source identity.
//! The vendor never accepts a caller-supplied source identity, so no two
//! issuances share a provenance token.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use sentinel_core::constants::STS_TIMEOUT;
use sentinel_core::error::SentinelError;
use sentinel_core::types::{RequestId, SourceIdentity};
use sentinel_crypto::new_request_id;
use sentinel_decision::Decision;

use crate::sts::{AssumeRoleRequest, BaseCredentials, StsClient, TemporaryCredentials};

/// The target role and its documented session-duration ceiling.
#[derive(Clone, Debug)]
pub struct RoleSpec {
    pub role_arn: String,
    pub max_session: Duration,
}

/// What one issuance produced: credentials plus the provenance stamped into
/// them, for the session registry and the decision log.
#[derive(Clone, Debug)]
pub struct IssuedCredentials {
    pub credentials: TemporaryCredentials,
    pub source_identity: SourceIdentity,
    pub request_id: RequestId,
    pub duration: Duration,
}

pub struct CredentialVendor {
    sts: Arc<dyn StsClient>,
}

impl CredentialVendor {
    pub fn new(sts: Arc<dyn StsClient>) -> Self {
        Self { sts }
    }

    /// Assume `role` with the decision's bounds applied.
    ///
    /// The effective duration is the smallest of: the caller's request, the
    /// decision's bound, the role's ceiling, and — when the decision rode a
    /// break-glass event — the remaining break-glass window.
    pub async fn issue(
        &self,
        base: &BaseCredentials,
        role: &RoleSpec,
        username: &str,
        requested: Duration,
        decision: &Decision,
        session_tags: Vec<(String, String)>,
    ) -> Result<IssuedCredentials, SentinelError> {
        if !decision.allow {
            return Err(SentinelError::Denied {
                reason: decision
                    .reasons
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "denied".to_string()),
            });
        }

        let mut duration = requested.min(decision.max_duration).min(role.max_session);
        if let Some(remaining) = decision.break_glass_remaining {
            duration = duration.min(remaining);
        }
        if duration.is_zero() {
            return Err(SentinelError::Denied {
                reason: "effective session duration is zero".to_string(),
            });
        }

        let request_id = new_request_id();
        let source_identity = SourceIdentity::new(username, &request_id);

        let request = AssumeRoleRequest {
            role_arn: role.role_arn.clone(),
            role_session_name: format!("sentinel-{username}"),
            duration,
            source_identity: source_identity.clone(),
            session_tags,
        };

        let credentials =
            match tokio::time::timeout(STS_TIMEOUT, self.sts.assume_role(base, &request)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(SentinelError::DeadlineExceeded {
                        operation: format!("assume role {}", role.role_arn),
                    })
                }
            };

        info!(
            role = %role.role_arn,
            source_identity = %source_identity,
            duration_s = duration.as_secs(),
            "credentials issued"
        );
        Ok(IssuedCredentials {
            credentials,
            source_identity,
            request_id,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records every assume-role call and returns canned credentials.
    struct RecordingSts {
        calls: Mutex<Vec<AssumeRoleRequest>>,
    }

    impl RecordingSts {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl StsClient for RecordingSts {
        async fn assume_role(
            &self,
            _base: &BaseCredentials,
            request: &AssumeRoleRequest,
        ) -> Result<TemporaryCredentials, SentinelError> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(TemporaryCredentials {
                access_key_id: "ASIATESTKEY".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: "token".to_string(),
                expiration: Utc::now() + chrono::Duration::from_std(request.duration).unwrap(),
            })
        }
    }

    fn base() -> BaseCredentials {
        BaseCredentials {
            access_key_id: "AKIABASE".to_string(),
            secret_access_key: "basesecret".to_string(),
            session_token: None,
        }
    }

    fn role() -> RoleSpec {
        RoleSpec {
            role_arn: "arn:aws:iam::123456789012:role/deploy".to_string(),
            max_session: Duration::from_secs(3600),
        }
    }

    fn allow_decision(max: Duration) -> Decision {
        Decision {
            allow: true,
            matched_rule: Some("r".to_string()),
            effect: Some(sentinel_core::types::Effect::Allow),
            max_duration: max,
            reasons: vec![],
            break_glass: false,
            break_glass_remaining: None,
            device_bound: false,
        }
    }

    #[tokio::test]
    async fn stamps_fresh_source_identity_per_call() {
        let sts = RecordingSts::new();
        let vendor = CredentialVendor::new(Arc::clone(&sts) as Arc<dyn StsClient>);
        let decision = allow_decision(Duration::from_secs(3600));

        let a = vendor
            .issue(&base(), &role(), "alice", Duration::from_secs(900), &decision, vec![])
            .await
            .unwrap();
        let b = vendor
            .issue(&base(), &role(), "alice", Duration::from_secs(900), &decision, vec![])
            .await
            .unwrap();

        assert_ne!(a.request_id, b.request_id);
        assert_ne!(a.source_identity, b.source_identity);
        assert!(a.source_identity.as_str().starts_with("sentinel:alice:"));
        assert!(a.source_identity.as_str().len() <= 64);

        let calls = sts.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].source_identity, a.source_identity);
    }

    #[tokio::test]
    async fn clamps_to_decision_bound() {
        let vendor = CredentialVendor::new(RecordingSts::new());
        let decision = allow_decision(Duration::from_secs(600));
        let issued = vendor
            .issue(&base(), &role(), "alice", Duration::from_secs(3600), &decision, vec![])
            .await
            .unwrap();
        assert_eq!(issued.duration, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn clamps_to_role_ceiling() {
        let vendor = CredentialVendor::new(RecordingSts::new());
        let decision = allow_decision(Duration::from_secs(12 * 3600));
        let issued = vendor
            .issue(&base(), &role(), "alice", Duration::from_secs(12 * 3600), &decision, vec![])
            .await
            .unwrap();
        assert_eq!(issued.duration, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn clamps_to_break_glass_remaining() {
        let vendor = CredentialVendor::new(RecordingSts::new());
        let mut decision = allow_decision(Duration::from_secs(3600));
        decision.break_glass = true;
        decision.break_glass_remaining = Some(Duration::from_secs(300));
        let issued = vendor
            .issue(&base(), &role(), "alice", Duration::from_secs(3600), &decision, vec![])
            .await
            .unwrap();
        assert_eq!(issued.duration, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn denied_decision_never_reaches_sts() {
        let sts = RecordingSts::new();
        let vendor = CredentialVendor::new(Arc::clone(&sts) as Arc<dyn StsClient>);
        let decision = Decision::denied("no rule matched");
        assert!(matches!(
            vendor
                .issue(&base(), &role(), "alice", Duration::from_secs(900), &decision, vec![])
                .await,
            Err(SentinelError::Denied { .. })
        ));
        assert!(sts.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_tags_pass_through() {
        let sts = RecordingSts::new();
        let vendor = CredentialVendor::new(Arc::clone(&sts) as Arc<dyn StsClient>);
        let decision = allow_decision(Duration::from_secs(3600));
        vendor
            .issue(
                &base(),
                &role(),
                "alice",
                Duration::from_secs(900),
                &decision,
                vec![("team".to_string(), "platform".to_string())],
            )
            .await
            .unwrap();
        let calls = sts.calls.lock().unwrap();
        assert_eq!(calls[0].session_tags, vec![("team".to_string(), "platform".to_string())]);
    }
}
