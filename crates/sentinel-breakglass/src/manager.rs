//! The break-glass manager: validation, policy gates, rate limiting, and
//! the one-way state machine over the store.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use sentinel_core::breakglass::{BreakGlassEvent, BreakGlassStatus, ReasonCode};
use sentinel_core::constants::{
    BREAK_GLASS_MAX_DURATION, JUSTIFICATION_MAX_CHARS, JUSTIFICATION_MIN_CHARS,
};
use sentinel_core::error::SentinelError;
use sentinel_core::types::{MfaMethod, RequestId, Timestamp};
use sentinel_policy::{BreakGlassPolicy, RateLimitPolicy};
use sentinel_store::BreakGlassStore;

use crate::mfa::MfaVerifier;
use crate::notify::{Notification, Notifier, Severity};
use crate::ratelimit::RateLimitChecker;

/// Parameters of one break-glass invocation.
#[derive(Clone, Debug)]
pub struct InvokeRequest {
    pub invoker: String,
    pub profile: String,
    pub reason_code: ReasonCode,
    pub justification: String,
    pub duration: Duration,
    /// Second factor, when the profile's policy demands one.
    pub mfa: Option<(MfaMethod, String)>,
    /// Correlation id of the credential request that triggered this.
    pub request_id: Option<RequestId>,
}

pub struct BreakGlassManager {
    store: Arc<dyn BreakGlassStore>,
    checker: RateLimitChecker,
    notifier: Arc<dyn Notifier>,
    mfa: Option<Arc<dyn MfaVerifier>>,
}

impl BreakGlassManager {
    pub fn new(
        store: Arc<dyn BreakGlassStore>,
        notifier: Arc<dyn Notifier>,
        mfa: Option<Arc<dyn MfaVerifier>>,
    ) -> Self {
        let checker = RateLimitChecker::new(Arc::clone(&store));
        Self {
            store,
            checker,
            notifier,
            mfa,
        }
    }

    /// Grant emergency access. Validation order: justification, duration,
    /// policy gates, MFA, rate limits, single-active check, create.
    pub async fn invoke(
        &self,
        request: InvokeRequest,
        policy: Option<&BreakGlassPolicy>,
        rate_limits: Option<&RateLimitPolicy>,
        now: Timestamp,
    ) -> Result<BreakGlassEvent, SentinelError> {
        let chars = request.justification.chars().count();
        if chars < JUSTIFICATION_MIN_CHARS {
            return Err(SentinelError::JustificationTooShort {
                min: JUSTIFICATION_MIN_CHARS,
                got: chars,
            });
        }
        if chars > JUSTIFICATION_MAX_CHARS {
            return Err(SentinelError::JustificationTooLong {
                max: JUSTIFICATION_MAX_CHARS,
                got: chars,
            });
        }

        let max_duration = policy
            .and_then(|p| p.max_duration)
            .unwrap_or(BREAK_GLASS_MAX_DURATION)
            .min(BREAK_GLASS_MAX_DURATION);
        if request.duration.is_zero() || request.duration > max_duration {
            return Err(SentinelError::BreakGlassDurationTooLong {
                max_secs: max_duration.as_secs(),
            });
        }

        if let Some(policy) = policy {
            if !policy.enabled {
                return Err(SentinelError::BreakGlassDisabled);
            }
            if !policy.allowed_invokers.is_empty()
                && !policy.allowed_invokers.iter().any(|u| u == &request.invoker)
            {
                return Err(SentinelError::InvokerNotAllowed(request.invoker.clone()));
            }
            if policy.require_mfa {
                self.check_mfa(policy, &request).await?;
            }
        }

        if let Some(limits) = rate_limits {
            let result = self
                .checker
                .check(limits, &request.invoker, &request.profile, now)
                .await?;
            if result.blocked {
                warn!(
                    invoker = %request.invoker,
                    profile = %request.profile,
                    reason = %result.reason.map(|r| r.to_string()).unwrap_or_default(),
                    "break-glass invocation rate limited"
                );
                return Err(SentinelError::RateLimited {
                    retry_after: result.retry_after.unwrap_or(Duration::ZERO),
                });
            }
            if result.should_escalate {
                self.send(Notification {
                    severity: Severity::Escalation,
                    title: format!("break-glass usage by {} crossed threshold", request.invoker),
                    body: request.justification.clone(),
                    profile: request.profile.clone(),
                    invoker: request.invoker.clone(),
                })
                .await;
            }
        }

        if let Some(existing) = self
            .store
            .find_active(&request.invoker, &request.profile, now)
            .await?
        {
            return Err(SentinelError::AlreadyActive {
                invoker: existing.invoker,
                profile: existing.profile,
            });
        }

        let expires_at = now
            + ChronoDuration::from_std(request.duration)
                .map_err(|e| SentinelError::Internal(e.to_string()))?;
        let event = BreakGlassEvent {
            id: sentinel_crypto::new_event_id(),
            invoker: request.invoker.clone(),
            profile: request.profile.clone(),
            reason_code: request.reason_code,
            justification: request.justification.clone(),
            requested_duration: request.duration,
            status: BreakGlassStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at,
            closed_by: None,
            closed_reason: None,
            request_id: request.request_id.clone(),
            ttl: expires_at.timestamp(),
        };
        self.store.create(&event).await?;

        info!(
            id = %event.id,
            invoker = %event.invoker,
            profile = %event.profile,
            reason = %event.reason_code,
            expires_at = %event.expires_at,
            "break-glass invoked"
        );
        self.send(Notification {
            severity: Severity::High,
            title: format!(
                "break-glass invoked by {} on {} ({})",
                event.invoker, event.profile, event.reason_code
            ),
            body: event.justification.clone(),
            profile: event.profile.clone(),
            invoker: event.invoker.clone(),
        })
        .await;

        Ok(event)
    }

    /// `active → closed`, atomically.
    pub async fn close(
        &self,
        id: &str,
        closer: &str,
        reason: &str,
        now: Timestamp,
    ) -> Result<BreakGlassEvent, SentinelError> {
        let current = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| SentinelError::NotFound(id.to_string()))?;

        let mut closed = current.clone();
        closed.status = BreakGlassStatus::Closed;
        closed.closed_by = Some(closer.to_string());
        closed.closed_reason = Some(reason.to_string());
        closed.updated_at = now;
        self.store.update(&closed, current.updated_at).await?;

        info!(id = %id, closer = %closer, "break-glass closed");
        Ok(closed)
    }

    /// `active → expired`. Driven by the TTL sweep, not by operators.
    pub async fn expire(&self, id: &str, now: Timestamp) -> Result<(), SentinelError> {
        let current = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| SentinelError::NotFound(id.to_string()))?;

        let mut expired = current.clone();
        expired.status = BreakGlassStatus::Expired;
        expired.updated_at = now;
        self.store.update(&expired, current.updated_at).await
    }

    /// The unique active, non-expired event for (invoker, profile).
    pub async fn find_active(
        &self,
        invoker: &str,
        profile: &str,
        now: Timestamp,
    ) -> Result<Option<BreakGlassEvent>, SentinelError> {
        self.store.find_active(invoker, profile, now).await
    }

    async fn check_mfa(
        &self,
        policy: &BreakGlassPolicy,
        request: &InvokeRequest,
    ) -> Result<(), SentinelError> {
        let Some(verifier) = &self.mfa else {
            return Err(SentinelError::MfaRequired);
        };
        let Some((method, code)) = &request.mfa else {
            return Err(SentinelError::MfaRequired);
        };
        if !policy.mfa_methods.is_empty() && !policy.mfa_methods.contains(method) {
            return Err(SentinelError::MfaFailed);
        }
        match verifier.verify(&request.invoker, *method, code).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SentinelError::MfaFailed),
            Err(_) => Err(SentinelError::MfaFailed),
        }
    }

    async fn send(&self, notification: Notification) {
        // Fail-open: a dead notifier must not block emergency access.
        if let Err(e) = self.notifier.notify(&notification).await {
            error!(error = %e, severity = %notification.severity, "notification delivery failed");
        }
    }
}
