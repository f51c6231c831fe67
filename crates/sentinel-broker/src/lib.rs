//! sentinel-broker
//!
//! End-to-end composition of the credential path: resolve the caller's
//! identity, run the decision orchestrator, vend fingerprinted credentials,
//! record the server session, and append the signed decision-log entry.
//! Everything network-facing behind it is a capability; the broker itself
//! is stateless across requests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sentinel_audit::{DecisionLog, DecisionLogEntry, IssuedSession, SessionRegistry};
use sentinel_core::error::SentinelError;
use sentinel_core::identity::Identity;
use sentinel_core::session::ServerSession;
use sentinel_core::types::{DeviceId, Mode, RequestId, SourceIdentity, Timestamp};
use sentinel_decision::{Decision, DecisionOrchestrator, DecisionRequest};
use sentinel_vendor::{BaseCredentials, CredentialVendor, RoleSpec, TemporaryCredentials};

/// Resolves who is calling, via the cloud's authenticated identity endpoint.
/// Identity is re-derived per request and never trusted from client input.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self) -> Result<Identity, SentinelError>;
}

/// Supplies the long-term base credentials for the assumption chain. The
/// keyring-backed implementation lives outside the core.
#[async_trait]
pub trait BaseCredentialsProvider: Send + Sync {
    async fn base_credentials(&self) -> Result<BaseCredentials, SentinelError>;
}

/// One inbound credential request.
#[derive(Clone, Debug)]
pub struct BrokerRequest {
    pub profile: String,
    pub mode: Mode,
    pub requested_duration: Duration,
    pub device_id: Option<DeviceId>,
    pub role: RoleSpec,
    pub session_tags: Vec<(String, String)>,
    /// Server-mode requests referencing an existing session must present
    /// its id; a revoked session fails the request outright.
    pub session_ref: Option<String>,
    pub correlation_id: Option<String>,
}

/// What a granted request produced.
#[derive(Clone, Debug)]
pub struct BrokerResponse {
    pub credentials: TemporaryCredentials,
    pub source_identity: SourceIdentity,
    pub request_id: RequestId,
    pub decision: Decision,
    pub session: Option<ServerSession>,
}

pub struct Broker {
    identity: Arc<dyn IdentityResolver>,
    base: Arc<dyn BaseCredentialsProvider>,
    orchestrator: DecisionOrchestrator,
    vendor: CredentialVendor,
    registry: Option<Arc<SessionRegistry>>,
    log: DecisionLog,
}

impl Broker {
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        base: Arc<dyn BaseCredentialsProvider>,
        orchestrator: DecisionOrchestrator,
        vendor: CredentialVendor,
        registry: Option<Arc<SessionRegistry>>,
        log: DecisionLog,
    ) -> Self {
        Self {
            identity,
            base,
            orchestrator,
            vendor,
            registry,
            log,
        }
    }

    /// Run one request through the full path. Denials surface as
    /// `SentinelError::Denied` after the decision-log entry is written.
    pub async fn handle(
        &self,
        request: BrokerRequest,
        now: Timestamp,
    ) -> Result<BrokerResponse, SentinelError> {
        let identity = self.identity.resolve().await?;

        if let (Some(session_ref), Some(registry)) = (&request.session_ref, &self.registry) {
            registry.assert_active(session_ref, now).await?;
        }

        let decision = self
            .orchestrator
            .decide(&DecisionRequest {
                identity: identity.clone(),
                profile: request.profile.clone(),
                mode: request.mode,
                requested_duration: request.requested_duration,
                request_time: now,
                device_id: request.device_id.clone(),
            })
            .await;

        if !decision.allow {
            let reason = decision
                .reasons
                .first()
                .cloned()
                .unwrap_or_else(|| "denied".to_string());
            self.record(&decision, &identity, &request, &sentinel_crypto::new_request_id(), None, now)
                .await;
            info!(profile = %request.profile, user = %identity.username, reason = %reason, "request denied");
            return Err(SentinelError::Denied { reason });
        }

        let base = self.base.base_credentials().await?;
        let issued = self
            .vendor
            .issue(
                &base,
                &request.role,
                &identity.username,
                request.requested_duration,
                &decision,
                request.session_tags.clone(),
            )
            .await?;

        let session = match (&self.registry, request.mode) {
            (Some(registry), Mode::Server) => Some(
                registry
                    .record(
                        &IssuedSession {
                            principal: identity.username.clone(),
                            profile: request.profile.clone(),
                            source_identity: issued.source_identity.clone(),
                            request_id: issued.request_id.clone(),
                            duration: issued.duration,
                        },
                        request.device_id.clone(),
                        now,
                    )
                    .await?,
            ),
            _ => None,
        };

        self.record(
            &decision,
            &identity,
            &request,
            &issued.request_id,
            Some(&issued.source_identity),
            now,
        )
        .await;

        Ok(BrokerResponse {
            credentials: issued.credentials,
            source_identity: issued.source_identity,
            request_id: issued.request_id,
            decision,
            session,
        })
    }

    /// Expire overdue break-glass events and approval requests. Run
    /// periodically by whatever hosts the broker.
    pub async fn sweep_expired(
        breakglass: &dyn sentinel_store::BreakGlassStore,
        approvals: &dyn sentinel_store::ApprovalStore,
        now: Timestamp,
    ) -> Result<(), SentinelError> {
        let expired = breakglass.expire_due(now).await?;
        if !expired.is_empty() {
            warn!(count = expired.len(), "expired break-glass events");
        }
        let expired = approvals.expire_due(now).await?;
        if !expired.is_empty() {
            info!(count = expired.len(), "expired approval requests");
        }
        Ok(())
    }

    async fn record(
        &self,
        decision: &Decision,
        identity: &Identity,
        request: &BrokerRequest,
        request_id: &RequestId,
        source_identity: Option<&SourceIdentity>,
        now: Timestamp,
    ) {
        let correlation_id = request
            .correlation_id
            .clone()
            .or_else(|| request.session_ref.clone());
        let entry = DecisionLogEntry::new(
            decision,
            identity,
            &request.profile,
            request.mode,
            request_id,
            source_identity,
            correlation_id,
            now,
        );
        // Fail-open: issuance never blocks on logging.
        self.log.record(&entry).await;
    }
}
