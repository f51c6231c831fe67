//! Break-glass event storage.
//!
//! All mutations are conditional writes: `create` asserts the id does not
//! exist, every transition asserts the prior `updated_at` token and a
//! non-terminal prior status, then swaps the exact prior bytes. Invariants
//! that span requests (one active event per invoker/profile pair, immutable
//! terminal states) live here, not in process memory.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use sentinel_core::breakglass::{BreakGlassEvent, BreakGlassStatus};
use sentinel_core::error::SentinelError;
use sentinel_core::types::Timestamp;

use crate::db::{decode, encode, index_key, scan_ids_desc, storage, StoreDb};

#[async_trait]
pub trait BreakGlassStore: Send + Sync {
    /// Persist a new event. Fails with `AlreadyExists` on id collision.
    async fn create(&self, event: &BreakGlassEvent) -> Result<(), SentinelError>;

    async fn get(&self, id: &str) -> Result<Option<BreakGlassEvent>, SentinelError>;

    /// Persist a state transition. `expected_updated_at` is the optimistic
    /// lock token from the caller's last read.
    async fn update(
        &self,
        updated: &BreakGlassEvent,
        expected_updated_at: Timestamp,
    ) -> Result<(), SentinelError>;

    /// The unique active, non-expired event for (invoker, profile), if any.
    async fn find_active(
        &self,
        invoker: &str,
        profile: &str,
        now: Timestamp,
    ) -> Result<Option<BreakGlassEvent>, SentinelError>;

    /// Most recent event for (invoker, profile) regardless of status.
    async fn last_event(
        &self,
        invoker: &str,
        profile: &str,
    ) -> Result<Option<BreakGlassEvent>, SentinelError>;

    /// Events created by `invoker` at or after `since`, newest first.
    async fn events_for_invoker_since(
        &self,
        invoker: &str,
        since: Timestamp,
    ) -> Result<Vec<BreakGlassEvent>, SentinelError>;

    /// Events on `profile` created at or after `since`, newest first.
    async fn events_for_profile_since(
        &self,
        profile: &str,
        since: Timestamp,
    ) -> Result<Vec<BreakGlassEvent>, SentinelError>;

    /// Transition every active event whose window has passed to `expired`.
    /// Returns the ids that were expired.
    async fn expire_due(&self, now: Timestamp) -> Result<Vec<String>, SentinelError>;

    /// Idempotent delete.
    async fn delete(&self, id: &str) -> Result<(), SentinelError>;
}

// ── Sled implementation ──────────────────────────────────────────────────────

pub struct SledBreakGlassStore {
    db: Arc<StoreDb>,
}

impl SledBreakGlassStore {
    pub fn new(db: Arc<StoreDb>) -> Self {
        Self { db }
    }

    fn read(&self, id: &str) -> Result<Option<BreakGlassEvent>, SentinelError> {
        match self.db.breakglass.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn insert_indexes(&self, event: &BreakGlassEvent) -> Result<(), SentinelError> {
        let id = event.id.as_bytes();
        self.db
            .bg_by_invoker
            .insert(index_key(&event.invoker, event.created_at, &event.id), id)
            .map_err(storage)?;
        self.db
            .bg_by_profile
            .insert(index_key(&event.profile, event.created_at, &event.id), id)
            .map_err(storage)?;
        self.db
            .bg_by_status
            .insert(
                index_key(&event.status.to_string(), event.created_at, &event.id),
                id,
            )
            .map_err(storage)?;
        Ok(())
    }

    fn move_status_index(
        &self,
        prior: &BreakGlassEvent,
        updated: &BreakGlassEvent,
    ) -> Result<(), SentinelError> {
        self.db
            .bg_by_status
            .remove(index_key(&prior.status.to_string(), prior.created_at, &prior.id))
            .map_err(storage)?;
        self.db
            .bg_by_status
            .insert(
                index_key(&updated.status.to_string(), updated.created_at, &updated.id),
                updated.id.as_bytes(),
            )
            .map_err(storage)?;
        Ok(())
    }

    fn events_by_ids(&self, ids: &[String]) -> Result<Vec<BreakGlassEvent>, SentinelError> {
        let mut events = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(event) = self.read(id)? {
                events.push(event);
            }
        }
        Ok(events)
    }
}

/// The only legal transitions. Everything else, including `active → active`
/// and any move out of a terminal state, is rejected.
fn transition_allowed(from: BreakGlassStatus, to: BreakGlassStatus) -> bool {
    matches!(
        (from, to),
        (BreakGlassStatus::Active, BreakGlassStatus::Closed)
            | (BreakGlassStatus::Active, BreakGlassStatus::Expired)
    )
}

#[async_trait]
impl BreakGlassStore for SledBreakGlassStore {
    async fn create(&self, event: &BreakGlassEvent) -> Result<(), SentinelError> {
        let bytes = encode(event)?;
        self.db
            .breakglass
            .compare_and_swap(event.id.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(storage)?
            .map_err(|_| SentinelError::AlreadyExists(event.id.clone()))?;
        self.insert_indexes(event)?;
        info!(id = %event.id, invoker = %event.invoker, profile = %event.profile, "break-glass event created");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<BreakGlassEvent>, SentinelError> {
        self.read(id)
    }

    async fn update(
        &self,
        updated: &BreakGlassEvent,
        expected_updated_at: Timestamp,
    ) -> Result<(), SentinelError> {
        let prior = self
            .read(&updated.id)?
            .ok_or_else(|| SentinelError::NotFound(updated.id.clone()))?;

        if prior.updated_at != expected_updated_at {
            return Err(SentinelError::ConcurrentModification(updated.id.clone()));
        }
        if prior.status.is_terminal() || !transition_allowed(prior.status, updated.status) {
            return Err(SentinelError::InvalidStateTransition {
                from: prior.status.to_string(),
                to: updated.status.to_string(),
            });
        }

        let prior_bytes = encode(&prior)?;
        let new_bytes = encode(updated)?;
        self.db
            .breakglass
            .compare_and_swap(updated.id.as_bytes(), Some(prior_bytes), Some(new_bytes))
            .map_err(storage)?
            .map_err(|_| SentinelError::ConcurrentModification(updated.id.clone()))?;
        self.move_status_index(&prior, updated)?;
        info!(id = %updated.id, from = %prior.status, to = %updated.status, "break-glass transition");
        Ok(())
    }

    async fn find_active(
        &self,
        invoker: &str,
        profile: &str,
        now: Timestamp,
    ) -> Result<Option<BreakGlassEvent>, SentinelError> {
        let ids = scan_ids_desc(&self.db.bg_by_invoker, invoker)?;
        for event in self.events_by_ids(&ids)? {
            if event.profile == profile && event.authorizes(now) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    async fn last_event(
        &self,
        invoker: &str,
        profile: &str,
    ) -> Result<Option<BreakGlassEvent>, SentinelError> {
        let ids = scan_ids_desc(&self.db.bg_by_invoker, invoker)?;
        for event in self.events_by_ids(&ids)? {
            if event.profile == profile {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    async fn events_for_invoker_since(
        &self,
        invoker: &str,
        since: Timestamp,
    ) -> Result<Vec<BreakGlassEvent>, SentinelError> {
        let ids = scan_ids_desc(&self.db.bg_by_invoker, invoker)?;
        Ok(self
            .events_by_ids(&ids)?
            .into_iter()
            .filter(|e| e.created_at >= since)
            .collect())
    }

    async fn events_for_profile_since(
        &self,
        profile: &str,
        since: Timestamp,
    ) -> Result<Vec<BreakGlassEvent>, SentinelError> {
        let ids = scan_ids_desc(&self.db.bg_by_profile, profile)?;
        Ok(self
            .events_by_ids(&ids)?
            .into_iter()
            .filter(|e| e.created_at >= since)
            .collect())
    }

    async fn expire_due(&self, now: Timestamp) -> Result<Vec<String>, SentinelError> {
        let ids = scan_ids_desc(&self.db.bg_by_status, "active")?;
        let mut expired = Vec::new();
        for event in self.events_by_ids(&ids)? {
            if event.status == BreakGlassStatus::Active && now >= event.expires_at {
                let mut updated = event.clone();
                updated.status = BreakGlassStatus::Expired;
                updated.updated_at = now;
                match self.update(&updated, event.updated_at).await {
                    Ok(()) => expired.push(event.id),
                    // Raced with a close or another sweeper; either way the
                    // event left `active`, which is all the sweep wants.
                    Err(SentinelError::ConcurrentModification(_))
                    | Err(SentinelError::InvalidStateTransition { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(expired)
    }

    async fn delete(&self, id: &str) -> Result<(), SentinelError> {
        if let Some(event) = self.read(id)? {
            self.db
                .bg_by_invoker
                .remove(index_key(&event.invoker, event.created_at, &event.id))
                .map_err(storage)?;
            self.db
                .bg_by_profile
                .remove(index_key(&event.profile, event.created_at, &event.id))
                .map_err(storage)?;
            self.db
                .bg_by_status
                .remove(index_key(&event.status.to_string(), event.created_at, &event.id))
                .map_err(storage)?;
        }
        self.db.breakglass.remove(id.as_bytes()).map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use sentinel_core::breakglass::ReasonCode;
    use std::time::Duration;

    fn temp_store(name: &str) -> SledBreakGlassStore {
        let dir = std::env::temp_dir().join(format!("sentinel_bg_store_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        SledBreakGlassStore::new(Arc::new(StoreDb::open(&dir).expect("open temp db")))
    }

    fn event(id: &str, invoker: &str, profile: &str, offset_secs: i64) -> BreakGlassEvent {
        let created = Utc::now() + ChronoDuration::seconds(offset_secs);
        let expires = created + ChronoDuration::seconds(1800);
        BreakGlassEvent {
            id: id.to_string(),
            invoker: invoker.to_string(),
            profile: profile.to_string(),
            reason_code: ReasonCode::Incident,
            justification: "emergency failover during regional outage".to_string(),
            requested_duration: Duration::from_secs(1800),
            status: BreakGlassStatus::Active,
            created_at: created,
            updated_at: created,
            expires_at: expires,
            closed_by: None,
            closed_reason: None,
            request_id: None,
            ttl: expires.timestamp(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = temp_store("round_trip");
        let e = event("aaaa111122223333", "alice", "production", 0);
        store.create(&e).await.unwrap();
        assert_eq!(store.get(&e.id).await.unwrap().unwrap(), e);
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let store = temp_store("dup");
        let e = event("aaaa111122223333", "alice", "production", 0);
        store.create(&e).await.unwrap();
        assert!(matches!(
            store.create(&e).await,
            Err(SentinelError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn close_transition_persists() {
        let store = temp_store("close");
        let e = event("aaaa111122223333", "alice", "production", 0);
        store.create(&e).await.unwrap();

        let mut closed = e.clone();
        closed.status = BreakGlassStatus::Closed;
        closed.closed_by = Some("bob".to_string());
        closed.closed_reason = Some("incident resolved".to_string());
        closed.updated_at = Utc::now();
        store.update(&closed, e.updated_at).await.unwrap();

        let stored = store.get(&e.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BreakGlassStatus::Closed);
        assert_eq!(stored.closed_by.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn reactivation_of_closed_event_rejected() {
        let store = temp_store("reactivate");
        let e = event("aaaa111122223333", "alice", "production", 0);
        store.create(&e).await.unwrap();

        let mut closed = e.clone();
        closed.status = BreakGlassStatus::Closed;
        closed.updated_at = Utc::now();
        store.update(&closed, e.updated_at).await.unwrap();

        // Attack: flip the terminal record back to active.
        let mut reopened = closed.clone();
        reopened.status = BreakGlassStatus::Active;
        let err = store.update(&reopened, closed.updated_at).await.unwrap_err();
        assert!(matches!(err, SentinelError::InvalidStateTransition { .. }));

        // Nothing was persisted.
        let stored = store.get(&e.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BreakGlassStatus::Closed);
    }

    #[tokio::test]
    async fn active_to_active_rejected() {
        let store = temp_store("self_loop");
        let e = event("aaaa111122223333", "alice", "production", 0);
        store.create(&e).await.unwrap();

        let mut same = e.clone();
        same.updated_at = Utc::now();
        assert!(matches!(
            store.update(&same, e.updated_at).await,
            Err(SentinelError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn stale_lock_token_is_concurrent_modification() {
        let store = temp_store("stale_token");
        let e = event("aaaa111122223333", "alice", "production", 0);
        store.create(&e).await.unwrap();

        let mut expired = e.clone();
        expired.status = BreakGlassStatus::Expired;
        expired.updated_at = Utc::now();
        let stale = e.updated_at - ChronoDuration::seconds(10);
        assert!(matches!(
            store.update(&expired, stale).await,
            Err(SentinelError::ConcurrentModification(_))
        ));
    }

    #[tokio::test]
    async fn find_active_matches_pair_exactly() {
        let store = temp_store("find_active");
        store.create(&event("aaaa000000000001", "alice", "prod", 0)).await.unwrap();
        store.create(&event("aaaa000000000002", "alice", "production", 1)).await.unwrap();
        store.create(&event("aaaa000000000003", "bob", "prod", 2)).await.unwrap();

        let now = Utc::now() + ChronoDuration::seconds(5);
        let found = store.find_active("alice", "prod", now).await.unwrap().unwrap();
        assert_eq!(found.id, "aaaa000000000001");
        // `prod` does not authorize `production` and vice versa.
        let found = store.find_active("alice", "production", now).await.unwrap().unwrap();
        assert_eq!(found.id, "aaaa000000000002");
        assert!(store.find_active("bob", "production", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_event_is_newest_first() {
        let store = temp_store("last_event");
        store.create(&event("aaaa000000000001", "alice", "prod", -120)).await.unwrap();
        store.create(&event("aaaa000000000002", "alice", "prod", -60)).await.unwrap();
        let last = store.last_event("alice", "prod").await.unwrap().unwrap();
        assert_eq!(last.id, "aaaa000000000002");
    }

    #[tokio::test]
    async fn window_counts_filter_by_since() {
        let store = temp_store("counts");
        store.create(&event("aaaa000000000001", "alice", "prod", -7200)).await.unwrap();
        store.create(&event("aaaa000000000002", "alice", "prod", -60)).await.unwrap();
        store.create(&event("aaaa000000000003", "alice", "staging", -30)).await.unwrap();

        let since = Utc::now() - ChronoDuration::seconds(3600);
        let user_events = store.events_for_invoker_since("alice", since).await.unwrap();
        assert_eq!(user_events.len(), 2);
        let profile_events = store.events_for_profile_since("prod", since).await.unwrap();
        assert_eq!(profile_events.len(), 1);
    }

    #[tokio::test]
    async fn expire_due_sweeps_only_past_windows() {
        let store = temp_store("expire_due");
        let mut due = event("aaaa000000000001", "alice", "prod", -7200);
        due.expires_at = Utc::now() - ChronoDuration::seconds(3600);
        store.create(&due).await.unwrap();
        store.create(&event("aaaa000000000002", "alice", "staging", 0)).await.unwrap();

        let expired = store.expire_due(Utc::now()).await.unwrap();
        assert_eq!(expired, vec!["aaaa000000000001".to_string()]);
        assert_eq!(
            store.get("aaaa000000000001").await.unwrap().unwrap().status,
            BreakGlassStatus::Expired
        );
        assert_eq!(
            store.get("aaaa000000000002").await.unwrap().unwrap().status,
            BreakGlassStatus::Active
        );
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = temp_store("delete");
        let e = event("aaaa111122223333", "alice", "prod", 0);
        store.create(&e).await.unwrap();
        store.delete(&e.id).await.unwrap();
        store.delete(&e.id).await.unwrap();
        assert!(store.get(&e.id).await.unwrap().is_none());
        assert!(store.last_event("alice", "prod").await.unwrap().is_none());
    }
}
