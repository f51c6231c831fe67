//! Server-session storage backing the session registry. Revocation is the
//! only mutation and it is one-way.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use sentinel_core::error::SentinelError;
use sentinel_core::session::ServerSession;
use sentinel_core::types::{DeviceId, Timestamp};

use crate::db::{decode, encode, index_key, scan_ids_desc, storage, StoreDb};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session record. Fails with `AlreadyExists` on id
    /// collision.
    async fn create(&self, session: &ServerSession) -> Result<(), SentinelError>;

    async fn get(&self, id: &str) -> Result<Option<ServerSession>, SentinelError>;

    /// Set the revoked flag under the optimistic lock. Revoking an already
    /// revoked session is a no-op.
    async fn revoke(
        &self,
        id: &str,
        expected_updated_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), SentinelError>;

    /// Sessions for a principal, newest first.
    async fn find_by_principal(&self, principal: &str)
        -> Result<Vec<ServerSession>, SentinelError>;

    /// Sessions for a profile, newest first.
    async fn find_by_profile(&self, profile: &str) -> Result<Vec<ServerSession>, SentinelError>;

    /// Sessions issued to a device, newest first.
    async fn find_by_device(&self, device: &DeviceId)
        -> Result<Vec<ServerSession>, SentinelError>;

    /// Idempotent delete.
    async fn delete(&self, id: &str) -> Result<(), SentinelError>;
}

// ── Sled implementation ──────────────────────────────────────────────────────

pub struct SledSessionStore {
    db: Arc<StoreDb>,
}

impl SledSessionStore {
    pub fn new(db: Arc<StoreDb>) -> Self {
        Self { db }
    }

    fn read(&self, id: &str) -> Result<Option<ServerSession>, SentinelError> {
        match self.db.sessions.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn sessions_by_ids(&self, ids: &[String]) -> Result<Vec<ServerSession>, SentinelError> {
        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(session) = self.read(id)? {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for SledSessionStore {
    async fn create(&self, session: &ServerSession) -> Result<(), SentinelError> {
        let bytes = encode(session)?;
        self.db
            .sessions
            .compare_and_swap(session.id.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(storage)?
            .map_err(|_| SentinelError::AlreadyExists(session.id.clone()))?;
        self.db
            .sess_by_principal
            .insert(
                index_key(&session.principal, session.issued_at, &session.id),
                session.id.as_bytes(),
            )
            .map_err(storage)?;
        self.db
            .sess_by_profile
            .insert(
                index_key(&session.profile, session.issued_at, &session.id),
                session.id.as_bytes(),
            )
            .map_err(storage)?;
        if let Some(device) = &session.device_id {
            self.db
                .sess_by_device
                .insert(
                    index_key(device.as_str(), session.issued_at, &session.id),
                    session.id.as_bytes(),
                )
                .map_err(storage)?;
        }
        info!(id = %session.id, principal = %session.principal, profile = %session.profile, "session recorded");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ServerSession>, SentinelError> {
        self.read(id)
    }

    async fn revoke(
        &self,
        id: &str,
        expected_updated_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), SentinelError> {
        let prior = self
            .read(id)?
            .ok_or_else(|| SentinelError::NotFound(id.to_string()))?;
        if prior.revoked {
            return Ok(());
        }
        if prior.updated_at != expected_updated_at {
            return Err(SentinelError::ConcurrentModification(id.to_string()));
        }

        let mut updated = prior.clone();
        updated.revoked = true;
        updated.updated_at = now;

        let prior_bytes = encode(&prior)?;
        let new_bytes = encode(&updated)?;
        self.db
            .sessions
            .compare_and_swap(id.as_bytes(), Some(prior_bytes), Some(new_bytes))
            .map_err(storage)?
            .map_err(|_| SentinelError::ConcurrentModification(id.to_string()))?;
        info!(id = %id, "session revoked");
        Ok(())
    }

    async fn find_by_principal(
        &self,
        principal: &str,
    ) -> Result<Vec<ServerSession>, SentinelError> {
        let ids = scan_ids_desc(&self.db.sess_by_principal, principal)?;
        self.sessions_by_ids(&ids)
    }

    async fn find_by_profile(&self, profile: &str) -> Result<Vec<ServerSession>, SentinelError> {
        let ids = scan_ids_desc(&self.db.sess_by_profile, profile)?;
        self.sessions_by_ids(&ids)
    }

    async fn find_by_device(
        &self,
        device: &DeviceId,
    ) -> Result<Vec<ServerSession>, SentinelError> {
        let ids = scan_ids_desc(&self.db.sess_by_device, device.as_str())?;
        self.sessions_by_ids(&ids)
    }

    async fn delete(&self, id: &str) -> Result<(), SentinelError> {
        if let Some(session) = self.read(id)? {
            self.db
                .sess_by_principal
                .remove(index_key(&session.principal, session.issued_at, &session.id))
                .map_err(storage)?;
            self.db
                .sess_by_profile
                .remove(index_key(&session.profile, session.issued_at, &session.id))
                .map_err(storage)?;
            if let Some(device) = &session.device_id {
                self.db
                    .sess_by_device
                    .remove(index_key(device.as_str(), session.issued_at, &session.id))
                    .map_err(storage)?;
            }
        }
        self.db.sessions.remove(id.as_bytes()).map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use sentinel_core::types::{RequestId, SourceIdentity};

    fn temp_store(name: &str) -> SledSessionStore {
        let dir = std::env::temp_dir().join(format!("sentinel_sess_store_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        SledSessionStore::new(Arc::new(StoreDb::open(&dir).expect("open temp db")))
    }

    fn session(id: &str, principal: &str, profile: &str, device: Option<DeviceId>) -> ServerSession {
        let now = Utc::now();
        let rid = RequestId::from_entropy([7; 8]);
        ServerSession {
            id: id.to_string(),
            principal: principal.to_string(),
            profile: profile.to_string(),
            device_id: device,
            issued_at: now,
            expires_at: now + ChronoDuration::hours(1),
            revoked: false,
            source_identity: SourceIdentity::new(principal, &rid),
            updated_at: now,
            ttl: (now + ChronoDuration::hours(1)).timestamp(),
        }
    }

    #[tokio::test]
    async fn create_and_lookup_by_indexes() {
        let store = temp_store("indexes");
        let device = DeviceId::from_digest([0xcd; 32]);
        store
            .create(&session("cccc000000000001", "alice", "prod", Some(device.clone())))
            .await
            .unwrap();
        store
            .create(&session("cccc000000000002", "alice", "staging", None))
            .await
            .unwrap();

        assert_eq!(store.find_by_principal("alice").await.unwrap().len(), 2);
        assert_eq!(store.find_by_profile("prod").await.unwrap().len(), 1);
        assert_eq!(store.find_by_device(&device).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn revoke_is_one_way_and_idempotent() {
        let store = temp_store("revoke");
        let s = session("cccc000000000001", "alice", "prod", None);
        store.create(&s).await.unwrap();

        let now = Utc::now();
        store.revoke(&s.id, s.updated_at, now).await.unwrap();
        let stored = store.get(&s.id).await.unwrap().unwrap();
        assert!(stored.revoked);
        assert!(!stored.is_active(Utc::now()));

        // Second revoke is a no-op even with a stale token.
        store.revoke(&s.id, s.updated_at, Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_with_stale_token_conflicts() {
        let store = temp_store("revoke_stale");
        let s = session("cccc000000000001", "alice", "prod", None);
        store.create(&s).await.unwrap();

        let stale = s.updated_at - ChronoDuration::seconds(30);
        assert!(matches!(
            store.revoke(&s.id, stale, Utc::now()).await,
            Err(SentinelError::ConcurrentModification(_))
        ));
    }

    #[tokio::test]
    async fn revoke_missing_session_is_not_found() {
        let store = temp_store("revoke_missing");
        assert!(matches!(
            store.revoke("cccc000000000009", Utc::now(), Utc::now()).await,
            Err(SentinelError::NotFound(_))
        ));
    }
}
