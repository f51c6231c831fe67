//! STS role-assumption capability and credential records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use sentinel_core::error::SentinelError;
use sentinel_core::types::{SourceIdentity, Timestamp};

/// Long-term credentials from the local credential store, used only as the
/// base of the assumption chain. Never returned to callers.
#[derive(Clone, Debug)]
pub struct BaseCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Short-lived credentials returned by a role assumption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Timestamp,
}

/// One role-assumption call.
#[derive(Clone, Debug)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub duration: Duration,
    pub source_identity: SourceIdentity,
    pub session_tags: Vec<(String, String)>,
}

/// The cloud STS surface the vendor needs.
#[async_trait]
pub trait StsClient: Send + Sync {
    async fn assume_role(
        &self,
        base: &BaseCredentials,
        request: &AssumeRoleRequest,
    ) -> Result<TemporaryCredentials, SentinelError>;
}
