use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    // ── Policy loading ───────────────────────────────────────────────────────
    #[error("policy not found for profile: {0}")]
    PolicyNotFound(String),

    #[error("policy schema invalid: {0}")]
    PolicyInvalid(String),

    #[error("policy signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("unsupported policy schema version: {0}")]
    UnsupportedSchemaVersion(String),

    #[error("policy has no rules")]
    EmptyPolicy,

    #[error("duplicate rule name: {0}")]
    DuplicateRuleName(String),

    #[error("rule {0} specifies no predicates")]
    RuleWithoutPredicates(String),

    #[error("invalid hour format (expected HH:MM): {0}")]
    InvalidHourFormat(String),

    #[error("invalid time window: start {start} must be before end {end}")]
    InvalidTimeWindow { start: String, end: String },

    #[error("unknown weekday: {0}")]
    UnknownWeekday(String),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("rule {rule}: duration {got_secs}s exceeds maximum {max_secs}s")]
    RuleDurationTooLong {
        rule: String,
        got_secs: u64,
        max_secs: u64,
    },

    #[error("rule {0}: max_server_duration exceeds max_duration")]
    ServerDurationExceedsMax(String),

    // ── Decisions ────────────────────────────────────────────────────────────
    #[error("denied: {reason}")]
    Denied { reason: String },

    // ── Break-glass ──────────────────────────────────────────────────────────
    #[error("rate limited; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("break-glass already active for {invoker} on {profile}; close it first")]
    AlreadyActive { invoker: String, profile: String },

    #[error("justification too short: need at least {min} characters, got {got}")]
    JustificationTooShort { min: usize, got: usize },

    #[error("justification too long: maximum {max} characters, got {got}")]
    JustificationTooLong { max: usize, got: usize },

    #[error("requested duration exceeds break-glass maximum of {max_secs}s")]
    BreakGlassDurationTooLong { max_secs: u64 },

    #[error("break-glass is disabled for this profile")]
    BreakGlassDisabled,

    #[error("invoker {0} is not permitted to break glass on this profile")]
    InvokerNotAllowed(String),

    // ── MFA ──────────────────────────────────────────────────────────────────
    #[error("MFA required but no verifier is configured")]
    MfaRequired,

    #[error("MFA verification failed")]
    MfaFailed,

    // ── State machines / storage ─────────────────────────────────────────────
    #[error("invalid state transition: {from} → {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("concurrent modification of record {0}; refetch and retry")]
    ConcurrentModification(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    // ── Approval ─────────────────────────────────────────────────────────────
    #[error("only the original requester may cancel an approval request")]
    NotRequestOwner,

    #[error("{0} is not in the approver list for this profile")]
    ApproverNotAllowed(String),

    #[error("requesters may not approve their own requests")]
    SelfApproval,

    // ── Identity ─────────────────────────────────────────────────────────────
    #[error("identity resolution failed: {0}")]
    Unauthorized(String),

    #[error("malformed principal ARN: {0}")]
    InvalidArn(String),

    // ── Identifiers ──────────────────────────────────────────────────────────
    #[error("invalid request id (expected 16 lowercase hex chars): {0}")]
    InvalidRequestId(String),

    #[error("invalid device id (expected 64 lowercase hex chars): {0}")]
    InvalidDeviceId(String),

    // ── Vending ──────────────────────────────────────────────────────────────
    #[error("role assumption failed: {0}")]
    AssumeRoleFailed(String),

    #[error("session has been revoked: {0}")]
    SessionRevoked(String),

    // ── Audit log ────────────────────────────────────────────────────────────
    #[error("log signing key too short: need at least {min} bytes, got {got}")]
    SigningKeyTooShort { min: usize, got: usize },

    #[error("decision log line failed verification: {0}")]
    LogVerificationFailed(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Errors that represent a security decision rather than a fault. These
    /// are recovered locally into structured denials and never propagate as
    /// opaque failures.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            SentinelError::Denied { .. }
                | SentinelError::SignatureInvalid(_)
                | SentinelError::RateLimited { .. }
                | SentinelError::MfaRequired
                | SentinelError::MfaFailed
                | SentinelError::SessionRevoked(_)
        )
    }
}
