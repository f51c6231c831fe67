//! Caller identity as resolved from the cloud provider's authenticated
//! identity endpoint (`GetCallerIdentity`).
//!
//! Identities are re-derived per request and never trusted from client
//! input; nothing here is persisted.

use serde::{Deserialize, Serialize};

use crate::error::SentinelError;

/// The flavour of principal behind the raw ARN.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    AssumedRole,
    Federated,
    Root,
}

/// Who is making the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Raw principal ARN exactly as returned by the identity endpoint.
    pub arn: String,
    pub principal_type: PrincipalType,
    pub account_id: String,
    /// Short username used for policy matching and the source identity.
    pub username: String,
}

impl Identity {
    /// Derive an identity from a principal ARN.
    ///
    /// Recognised shapes:
    ///   arn:aws:iam::<acct>:user/<name>
    ///   arn:aws:iam::<acct>:root
    ///   arn:aws:sts::<acct>:assumed-role/<role>/<session>
    ///   arn:aws:sts::<acct>:federated-user/<name>
    pub fn from_arn(arn: &str) -> Result<Self, SentinelError> {
        let parts: Vec<&str> = arn.split(':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return Err(SentinelError::InvalidArn(arn.to_string()));
        }
        let account_id = parts[4].to_string();
        let resource = parts[5];

        let (principal_type, username) = if resource == "root" {
            (PrincipalType::Root, "root".to_string())
        } else if let Some(name) = resource.strip_prefix("user/") {
            (PrincipalType::User, leaf(name).to_string())
        } else if let Some(rest) = resource.strip_prefix("assumed-role/") {
            // The session name identifies the human; the role name does not.
            let mut segs = rest.split('/');
            let _role = segs.next();
            let session = segs
                .next()
                .ok_or_else(|| SentinelError::InvalidArn(arn.to_string()))?;
            (PrincipalType::AssumedRole, session.to_string())
        } else if let Some(name) = resource.strip_prefix("federated-user/") {
            (PrincipalType::Federated, name.to_string())
        } else {
            return Err(SentinelError::InvalidArn(arn.to_string()));
        };

        if username.is_empty() {
            return Err(SentinelError::InvalidArn(arn.to_string()));
        }

        Ok(Self {
            arn: arn.to_string(),
            principal_type,
            account_id,
            username,
        })
    }
}

/// Last path segment of a resource name (IAM paths like `user/ops/alice`).
fn leaf(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
