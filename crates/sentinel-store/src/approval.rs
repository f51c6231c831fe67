//! Approval request storage. Same conditional-write discipline as the
//! break-glass store: `pending` is the only mutable state.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use sentinel_core::approval::{ApprovalRequest, ApprovalStatus};
use sentinel_core::error::SentinelError;
use sentinel_core::types::Timestamp;

use crate::db::{decode, encode, index_key, scan_ids_desc, storage, StoreDb};

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Persist a new request. Fails with `AlreadyExists` on id collision.
    async fn create(&self, request: &ApprovalRequest) -> Result<(), SentinelError>;

    async fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, SentinelError>;

    /// Persist a `pending → *` transition under the optimistic lock.
    async fn update(
        &self,
        updated: &ApprovalRequest,
        expected_updated_at: Timestamp,
    ) -> Result<(), SentinelError>;

    /// Most recent approved, unexpired request for (requester, profile).
    async fn find_approved(
        &self,
        requester: &str,
        profile: &str,
        now: Timestamp,
    ) -> Result<Option<ApprovalRequest>, SentinelError>;

    /// Most recent pending request for (requester, profile), if any.
    async fn find_pending(
        &self,
        requester: &str,
        profile: &str,
    ) -> Result<Option<ApprovalRequest>, SentinelError>;

    /// Expire every pending request whose wait window has passed. Returns
    /// the ids that were expired.
    async fn expire_due(&self, now: Timestamp) -> Result<Vec<String>, SentinelError>;

    /// Idempotent delete.
    async fn delete(&self, id: &str) -> Result<(), SentinelError>;
}

// ── Sled implementation ──────────────────────────────────────────────────────

pub struct SledApprovalStore {
    db: Arc<StoreDb>,
}

impl SledApprovalStore {
    pub fn new(db: Arc<StoreDb>) -> Self {
        Self { db }
    }

    fn read(&self, id: &str) -> Result<Option<ApprovalRequest>, SentinelError> {
        match self.db.approvals.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn requests_for_requester(
        &self,
        requester: &str,
    ) -> Result<Vec<ApprovalRequest>, SentinelError> {
        let ids = scan_ids_desc(&self.db.ap_by_requester, requester)?;
        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(request) = self.read(&id)? {
                requests.push(request);
            }
        }
        Ok(requests)
    }
}

#[async_trait]
impl ApprovalStore for SledApprovalStore {
    async fn create(&self, request: &ApprovalRequest) -> Result<(), SentinelError> {
        let bytes = encode(request)?;
        self.db
            .approvals
            .compare_and_swap(request.id.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(storage)?
            .map_err(|_| SentinelError::AlreadyExists(request.id.clone()))?;
        self.db
            .ap_by_requester
            .insert(
                index_key(&request.requester, request.created_at, &request.id),
                request.id.as_bytes(),
            )
            .map_err(storage)?;
        info!(id = %request.id, requester = %request.requester, profile = %request.profile, status = %request.status, "approval request created");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, SentinelError> {
        self.read(id)
    }

    async fn update(
        &self,
        updated: &ApprovalRequest,
        expected_updated_at: Timestamp,
    ) -> Result<(), SentinelError> {
        let prior = self
            .read(&updated.id)?
            .ok_or_else(|| SentinelError::NotFound(updated.id.clone()))?;

        if prior.updated_at != expected_updated_at {
            return Err(SentinelError::ConcurrentModification(updated.id.clone()));
        }
        // Only pending may move, and only to a terminal state.
        if prior.status.is_terminal()
            || updated.status == ApprovalStatus::Pending
        {
            return Err(SentinelError::InvalidStateTransition {
                from: prior.status.to_string(),
                to: updated.status.to_string(),
            });
        }

        let prior_bytes = encode(&prior)?;
        let new_bytes = encode(updated)?;
        self.db
            .approvals
            .compare_and_swap(updated.id.as_bytes(), Some(prior_bytes), Some(new_bytes))
            .map_err(storage)?
            .map_err(|_| SentinelError::ConcurrentModification(updated.id.clone()))?;
        info!(id = %updated.id, from = %prior.status, to = %updated.status, "approval transition");
        Ok(())
    }

    async fn find_approved(
        &self,
        requester: &str,
        profile: &str,
        now: Timestamp,
    ) -> Result<Option<ApprovalRequest>, SentinelError> {
        Ok(self
            .requests_for_requester(requester)?
            .into_iter()
            .find(|r| r.profile == profile && r.grants(now)))
    }

    async fn find_pending(
        &self,
        requester: &str,
        profile: &str,
    ) -> Result<Option<ApprovalRequest>, SentinelError> {
        Ok(self
            .requests_for_requester(requester)?
            .into_iter()
            .find(|r| r.profile == profile && r.status == ApprovalStatus::Pending))
    }

    async fn expire_due(&self, now: Timestamp) -> Result<Vec<String>, SentinelError> {
        let mut expired = Vec::new();
        for item in self.db.approvals.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let request: ApprovalRequest = decode(&bytes)?;
            if request.status == ApprovalStatus::Pending && now >= request.expires_at {
                let mut updated = request.clone();
                updated.status = ApprovalStatus::Expired;
                updated.updated_at = now;
                match self.update(&updated, request.updated_at).await {
                    Ok(()) => expired.push(request.id),
                    Err(SentinelError::ConcurrentModification(_))
                    | Err(SentinelError::InvalidStateTransition { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(expired)
    }

    async fn delete(&self, id: &str) -> Result<(), SentinelError> {
        if let Some(request) = self.read(id)? {
            self.db
                .ap_by_requester
                .remove(index_key(&request.requester, request.created_at, &request.id))
                .map_err(storage)?;
        }
        self.db.approvals.remove(id.as_bytes()).map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn temp_store(name: &str) -> SledApprovalStore {
        let dir = std::env::temp_dir().join(format!("sentinel_ap_store_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        SledApprovalStore::new(Arc::new(StoreDb::open(&dir).expect("open temp db")))
    }

    fn request(id: &str, requester: &str, profile: &str) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: id.to_string(),
            requester: requester.to_string(),
            profile: profile.to_string(),
            requested_duration: Duration::from_secs(3600),
            justification: "deploying the release during the change window".to_string(),
            status: ApprovalStatus::Pending,
            approver: None,
            approved_at: None,
            denial_reason: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ChronoDuration::hours(24),
            ttl: (now + ChronoDuration::hours(24)).timestamp(),
        }
    }

    #[tokio::test]
    async fn approve_then_find_approved() {
        let store = temp_store("approve");
        let r = request("bbbb000000000001", "bob", "staging");
        store.create(&r).await.unwrap();

        let now = Utc::now();
        let mut approved = r.clone();
        approved.status = ApprovalStatus::Approved;
        approved.approver = Some("alice".to_string());
        approved.approved_at = Some(now);
        approved.updated_at = now;
        approved.expires_at = now + ChronoDuration::hours(1);
        store.update(&approved, r.updated_at).await.unwrap();

        let found = store
            .find_approved("bob", "staging", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, r.id);
        assert!(store.find_approved("bob", "prod", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminal_states_are_immutable() {
        let store = temp_store("terminal");
        let r = request("bbbb000000000001", "bob", "staging");
        store.create(&r).await.unwrap();

        let mut denied = r.clone();
        denied.status = ApprovalStatus::Denied;
        denied.updated_at = Utc::now();
        store.update(&denied, r.updated_at).await.unwrap();

        let mut flip = denied.clone();
        flip.status = ApprovalStatus::Approved;
        assert!(matches!(
            store.update(&flip, denied.updated_at).await,
            Err(SentinelError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn pending_to_pending_rejected() {
        let store = temp_store("pend_loop");
        let r = request("bbbb000000000001", "bob", "staging");
        store.create(&r).await.unwrap();
        let mut same = r.clone();
        same.updated_at = Utc::now();
        assert!(matches!(
            store.update(&same, r.updated_at).await,
            Err(SentinelError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn expired_grant_does_not_authorize() {
        let store = temp_store("expired_grant");
        let r = request("bbbb000000000001", "bob", "staging");
        store.create(&r).await.unwrap();

        let past = Utc::now() - ChronoDuration::hours(2);
        let mut approved = r.clone();
        approved.status = ApprovalStatus::Approved;
        approved.updated_at = past;
        approved.expires_at = past + ChronoDuration::hours(1);
        store.update(&approved, r.updated_at).await.unwrap();

        assert!(store
            .find_approved("bob", "staging", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expire_due_sweeps_stale_pending() {
        let store = temp_store("expire");
        let mut stale = request("bbbb000000000001", "bob", "staging");
        stale.expires_at = Utc::now() - ChronoDuration::minutes(1);
        store.create(&stale).await.unwrap();
        store.create(&request("bbbb000000000002", "bob", "prod")).await.unwrap();

        let expired = store.expire_due(Utc::now()).await.unwrap();
        assert_eq!(expired, vec!["bbbb000000000001".to_string()]);
        assert_eq!(
            store.get("bbbb000000000001").await.unwrap().unwrap().status,
            ApprovalStatus::Expired
        );
    }
}
