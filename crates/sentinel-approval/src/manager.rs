use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use sentinel_core::approval::{ApprovalRequest, ApprovalStatus};
use sentinel_core::constants::DEFAULT_APPROVAL_PENDING_TTL;
use sentinel_core::error::SentinelError;
use sentinel_core::types::Timestamp;
use sentinel_policy::ApprovalPolicy;
use sentinel_store::ApprovalStore;

/// Orchestrates the approval workflow over the store. Auto-approve rules
/// from the profile's `ApprovalPolicy` short-circuit a matching request to
/// `approved` at creation time; everything else waits for a human.
pub struct ApprovalManager {
    store: Arc<dyn ApprovalStore>,
}

impl ApprovalManager {
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self { store }
    }

    /// Create a request. Returns it in `pending`, or already `approved`
    /// when an auto-approve condition matches.
    pub async fn request(
        &self,
        requester: &str,
        profile: &str,
        duration: Duration,
        justification: &str,
        policy: Option<&ApprovalPolicy>,
        now: Timestamp,
    ) -> Result<ApprovalRequest, SentinelError> {
        let pending_ttl = chrono_duration(DEFAULT_APPROVAL_PENDING_TTL)?;
        let mut request = ApprovalRequest {
            id: sentinel_crypto::new_event_id(),
            requester: requester.to_string(),
            profile: profile.to_string(),
            requested_duration: duration,
            justification: justification.to_string(),
            status: ApprovalStatus::Pending,
            approver: None,
            approved_at: None,
            denial_reason: None,
            created_at: now,
            updated_at: now,
            expires_at: now + pending_ttl,
            ttl: (now + pending_ttl).timestamp(),
        };

        if let Some(policy) = policy {
            let auto = policy
                .auto_approve
                .iter()
                .any(|rule| auto_approve_matches(rule, requester, profile, now));
            if auto {
                let grant_ttl = chrono_duration(policy.ttl)?;
                request.status = ApprovalStatus::Approved;
                request.approver = Some("auto-approve".to_string());
                request.approved_at = Some(now);
                request.expires_at = now + grant_ttl;
                request.ttl = (now + grant_ttl).timestamp();
                info!(id = %request.id, requester, profile, "approval auto-granted");
            }
        }

        self.store.create(&request).await?;
        Ok(request)
    }

    /// `pending → approved`. The approver must be allowed by the policy and
    /// may never be the requester.
    pub async fn approve(
        &self,
        id: &str,
        approver: &str,
        policy: Option<&ApprovalPolicy>,
        now: Timestamp,
    ) -> Result<ApprovalRequest, SentinelError> {
        let current = self.fetch(id).await?;
        if approver == current.requester {
            return Err(SentinelError::SelfApproval);
        }
        if let Some(policy) = policy {
            if !policy.approvers.is_empty()
                && !policy.approvers.iter().any(|a| a == approver)
            {
                return Err(SentinelError::ApproverNotAllowed(approver.to_string()));
            }
        }

        let grant_ttl = chrono_duration(
            policy.map(|p| p.ttl).unwrap_or(sentinel_core::constants::DEFAULT_APPROVAL_TTL),
        )?;
        let mut approved = current.clone();
        approved.status = ApprovalStatus::Approved;
        approved.approver = Some(approver.to_string());
        approved.approved_at = Some(now);
        approved.updated_at = now;
        approved.expires_at = now + grant_ttl;
        approved.ttl = (now + grant_ttl).timestamp();
        self.store.update(&approved, current.updated_at).await?;

        info!(id = %id, approver, "approval granted");
        Ok(approved)
    }

    /// `pending → denied`.
    pub async fn deny(
        &self,
        id: &str,
        approver: &str,
        reason: &str,
        now: Timestamp,
    ) -> Result<ApprovalRequest, SentinelError> {
        let current = self.fetch(id).await?;
        let mut denied = current.clone();
        denied.status = ApprovalStatus::Denied;
        denied.approver = Some(approver.to_string());
        denied.denial_reason = Some(reason.to_string());
        denied.updated_at = now;
        self.store.update(&denied, current.updated_at).await?;

        info!(id = %id, approver, "approval denied");
        Ok(denied)
    }

    /// `pending → cancelled`, by the original requester only.
    pub async fn cancel(
        &self,
        id: &str,
        requester: &str,
        now: Timestamp,
    ) -> Result<ApprovalRequest, SentinelError> {
        let current = self.fetch(id).await?;
        if current.requester != requester {
            return Err(SentinelError::NotRequestOwner);
        }
        let mut cancelled = current.clone();
        cancelled.status = ApprovalStatus::Cancelled;
        cancelled.updated_at = now;
        self.store.update(&cancelled, current.updated_at).await?;
        Ok(cancelled)
    }

    /// `pending → expired`, driven by the TTL sweep.
    pub async fn expire(&self, id: &str, now: Timestamp) -> Result<(), SentinelError> {
        let current = self.fetch(id).await?;
        let mut expired = current.clone();
        expired.status = ApprovalStatus::Expired;
        expired.updated_at = now;
        self.store.update(&expired, current.updated_at).await
    }

    /// Active-grant lookup used by the decision engine.
    pub async fn find_approved(
        &self,
        requester: &str,
        profile: &str,
        now: Timestamp,
    ) -> Result<Option<ApprovalRequest>, SentinelError> {
        self.store.find_approved(requester, profile, now).await
    }

    async fn fetch(&self, id: &str) -> Result<ApprovalRequest, SentinelError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| SentinelError::NotFound(id.to_string()))
    }
}

fn auto_approve_matches(
    rule: &sentinel_policy::AutoApproveRule,
    requester: &str,
    profile: &str,
    now: Timestamp,
) -> bool {
    if !rule.users.is_empty() && !rule.users.iter().any(|u| u == requester) {
        return false;
    }
    if !rule.profiles.is_empty() && !rule.profiles.iter().any(|p| p == profile) {
        return false;
    }
    if let Some(window) = &rule.time {
        if !window.contains(now) {
            return false;
        }
    }
    true
}

fn chrono_duration(d: Duration) -> Result<ChronoDuration, SentinelError> {
    ChronoDuration::from_std(d).map_err(|e| SentinelError::Internal(e.to_string()))
}
