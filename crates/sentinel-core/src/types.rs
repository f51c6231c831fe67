use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    DEVICE_ID_LEN, REQUEST_ID_LEN, SOURCE_IDENTITY_MAX_LEN, SOURCE_IDENTITY_PREFIX,
};
use crate::error::SentinelError;

/// Instant in UTC. All persisted timestamps are serialised as RFC 3339.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ── RequestId ────────────────────────────────────────────────────────────────

/// 16-lowercase-hex-char request identifier (64 bits of entropy).
///
/// Stamped into the session's source identity; one fresh id per issuance so
/// that no two issued credential sets share a provenance token.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Validate an externally supplied request id.
    pub fn new(s: impl Into<String>) -> Result<Self, SentinelError> {
        let s = s.into();
        if s.len() != REQUEST_ID_LEN || !is_lower_hex(&s) {
            return Err(SentinelError::InvalidRequestId(s));
        }
        Ok(Self(s))
    }

    /// Build a request id from 8 bytes of entropy. Infallible: the hex
    /// rendering always satisfies the format.
    pub fn from_entropy(bytes: [u8; 8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

// ── DeviceId ─────────────────────────────────────────────────────────────────

/// 64-lowercase-hex-char device identifier: HMAC-SHA256 of a stable hardware
/// id under an app-scoped key. Never derived from client-supplied claims.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(s: impl Into<String>) -> Result<Self, SentinelError> {
        let s = s.into();
        if s.len() != DEVICE_ID_LEN || !is_lower_hex(&s) {
            return Err(SentinelError::InvalidDeviceId(s));
        }
        Ok(Self(s))
    }

    /// Build a device id from a 32-byte HMAC digest. Infallible.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({}…)", &self.0[..8])
    }
}

// ── SourceIdentity ───────────────────────────────────────────────────────────

/// Provenance token stamped into every issued session:
/// `sentinel:<short-user>:<request-id>`, at most 64 characters.
///
/// The username segment is truncated when the total would exceed the cloud
/// provider's limit on the SourceIdentity field; the request id is never
/// truncated since it carries the provenance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceIdentity(String);

impl SourceIdentity {
    pub fn new(username: &str, request_id: &RequestId) -> Self {
        // prefix + ':' + ':' + request id
        let overhead = SOURCE_IDENTITY_PREFIX.len() + 2 + REQUEST_ID_LEN;
        let max_user = SOURCE_IDENTITY_MAX_LEN - overhead;
        let user: String = username.chars().take(max_user).collect();
        Self(format!("{SOURCE_IDENTITY_PREFIX}:{user}:{request_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The request-id segment, used to correlate cloud audit-trail records
    /// back to a decision-log entry.
    pub fn request_id(&self) -> Option<RequestId> {
        let id = self.0.rsplit(':').next()?;
        RequestId::new(id).ok()
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceIdentity({})", self.0)
    }
}

// ── Mode ─────────────────────────────────────────────────────────────────────

/// How the credentials were requested. The decision engine is mode-agnostic:
/// the same rules serve a CLI invocation, a credential-process helper, and a
/// server-side vending endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Server,
    Cli,
    CredentialProcess,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Server => "server",
            Mode::Cli => "cli",
            Mode::CredentialProcess => "credential_process",
        };
        write!(f, "{s}")
    }
}

// ── Effect ───────────────────────────────────────────────────────────────────

/// Outcome attached to a matched policy rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
    RequireApproval,
    RequireServer,
    RequireServerSession,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
            Effect::RequireApproval => "require_approval",
            Effect::RequireServer => "require_server",
            Effect::RequireServerSession => "require_server_session",
        };
        write!(f, "{s}")
    }
}

// ── MfaMethod ────────────────────────────────────────────────────────────────

/// MFA methods a break-glass policy may require.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfaMethod {
    Totp,
    Sms,
}

impl fmt::Display for MfaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MfaMethod::Totp => "totp",
            MfaMethod::Sms => "sms",
        };
        write!(f, "{s}")
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn is_lower_hex(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
