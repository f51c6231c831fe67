//! The session registry: one record per issued server-mode credential set,
//! with real-time revocation.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tracing::info;

use sentinel_core::error::SentinelError;
use sentinel_core::session::ServerSession;
use sentinel_core::types::{DeviceId, Timestamp};
use sentinel_store::SessionStore;

/// What the registry needs to know about an issuance. Kept separate from
/// the vendor's return type so the registry does not depend on the vendor.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub principal: String,
    pub profile: String,
    pub source_identity: sentinel_core::types::SourceIdentity,
    pub request_id: sentinel_core::types::RequestId,
    pub duration: std::time::Duration,
}

pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Record an issuance. The session id is the issuance's request id, so
    /// the registry, the decision log, and the cloud audit trail all
    /// correlate on the same token.
    pub async fn record(
        &self,
        issued: &IssuedSession,
        device_id: Option<DeviceId>,
        now: Timestamp,
    ) -> Result<ServerSession, SentinelError> {
        let expires_at = now
            + ChronoDuration::from_std(issued.duration)
                .map_err(|e| SentinelError::Internal(e.to_string()))?;
        let session = ServerSession {
            id: issued.request_id.to_string(),
            principal: issued.principal.clone(),
            profile: issued.profile.clone(),
            device_id,
            issued_at: now,
            expires_at,
            revoked: false,
            source_identity: issued.source_identity.clone(),
            updated_at: now,
            ttl: expires_at.timestamp(),
        };
        self.store.create(&session).await?;
        Ok(session)
    }

    /// Revoke a session. Subsequent requests referencing it fail. Retries
    /// once on an optimistic-lock conflict, then surfaces the conflict.
    pub async fn revoke(&self, session_id: &str, now: Timestamp) -> Result<(), SentinelError> {
        for attempt in 0..2 {
            let session = self
                .store
                .get(session_id)
                .await?
                .ok_or_else(|| SentinelError::NotFound(session_id.to_string()))?;
            match self.store.revoke(session_id, session.updated_at, now).await {
                Ok(()) => {
                    info!(session = %session_id, "session revoked");
                    return Ok(());
                }
                Err(SentinelError::ConcurrentModification(_)) if attempt == 0 => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SentinelError::ConcurrentModification(session_id.to_string()))
    }

    /// Fails when the referenced session is revoked, expired, or unknown.
    pub async fn assert_active(
        &self,
        session_id: &str,
        now: Timestamp,
    ) -> Result<ServerSession, SentinelError> {
        let session = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| SentinelError::SessionRevoked(session_id.to_string()))?;
        if !session.is_active(now) {
            return Err(SentinelError::SessionRevoked(session_id.to_string()));
        }
        Ok(session)
    }

    /// Sessions currently issued to a principal.
    pub async fn sessions_for_principal(
        &self,
        principal: &str,
    ) -> Result<Vec<ServerSession>, SentinelError> {
        self.store.find_by_principal(principal).await
    }
}
