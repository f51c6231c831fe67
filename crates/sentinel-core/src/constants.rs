//! ─── Sentinel Protocol Constants ────────────────────────────────────────────
//!
//! Bounds and defaults shared across the broker. Anything a policy document
//! may tighten (but never loosen) lives here.

use std::time::Duration;

// ── Policy ───────────────────────────────────────────────────────────────────

/// Schema versions the loader accepts. Updates append; removal is a breaking
/// change for every signed policy in the parameter store.
pub const SUPPORTED_POLICY_VERSIONS: &[&str] = &["1"];

/// How long a decoded policy stays in the in-process cache.
pub const POLICY_CACHE_TTL: Duration = Duration::from_secs(300);

/// Hard ceiling on any rule's `max_duration`. Requests above this are a
/// schema error, not a runtime clamp.
pub const MAX_RULE_DURATION: Duration = Duration::from_secs(12 * 3600);

/// Default parameter-store root under which policies are addressed.
pub const DEFAULT_POLICY_ROOT: &str = "/sentinel/policies";

// ── Break-glass ──────────────────────────────────────────────────────────────

/// Hard ceiling on emergency access duration. A `BreakGlassPolicy` may set a
/// lower bound but never a higher one.
pub const BREAK_GLASS_MAX_DURATION: Duration = Duration::from_secs(4 * 3600);

/// Justification length bounds (characters).
pub const JUSTIFICATION_MIN_CHARS: usize = 20;
pub const JUSTIFICATION_MAX_CHARS: usize = 1000;

// ── Approval ─────────────────────────────────────────────────────────────────

/// How long a granted approval authorizes credential issuance when the
/// `ApprovalPolicy` does not say otherwise.
pub const DEFAULT_APPROVAL_TTL: Duration = Duration::from_secs(3600);

/// How long a pending approval request waits before auto-expiry.
pub const DEFAULT_APPROVAL_PENDING_TTL: Duration = Duration::from_secs(24 * 3600);

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Request ids are 16 lowercase hex chars (64 bits of entropy).
pub const REQUEST_ID_LEN: usize = 16;

/// Device ids are 64 lowercase hex chars (HMAC-SHA256 of a hardware id).
pub const DEVICE_ID_LEN: usize = 64;

/// Prefix stamped into every issued session's source identity.
pub const SOURCE_IDENTITY_PREFIX: &str = "sentinel";

/// Cloud-provider limit on the SourceIdentity field.
pub const SOURCE_IDENTITY_MAX_LEN: usize = 64;

// ── Audit log ────────────────────────────────────────────────────────────────

/// Minimum HMAC signing key length for the decision log.
pub const MIN_LOG_SIGNING_KEY_BYTES: usize = 32;

// ── External-call deadlines ──────────────────────────────────────────────────

/// KV store operations (break-glass / approval / session records).
pub const KV_TIMEOUT: Duration = Duration::from_secs(5);

/// STS role assumption.
pub const STS_TIMEOUT: Duration = Duration::from_secs(10);

/// MDM device-posture lookups.
pub const MDM_TIMEOUT: Duration = Duration::from_secs(3);
