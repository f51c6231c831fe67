//! Notification capability. Concrete SNS/webhook transports live outside
//! the core; delivery failures never block the operation being notified
//! about.

use async_trait::async_trait;
use std::fmt;

use sentinel_core::error::SentinelError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    High,
    Escalation,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::High => "high",
            Severity::Escalation => "escalation",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub profile: String,
    pub invoker: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), SentinelError>;
}

/// Discards notifications. Used when no transport is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), SentinelError> {
        Ok(())
    }
}
