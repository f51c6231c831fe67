//! MDM provider capability and the built-in compositions.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use sentinel_core::error::SentinelError;
use sentinel_core::posture::DevicePosture;
use sentinel_core::types::DeviceId;

/// Answers "what does the MDM currently know about this device".
///
/// `Ok(None)` means the provider answered and does not know the device;
/// `Err` means the provider could not answer at all.
#[async_trait]
pub trait MdmProvider: Send + Sync {
    async fn lookup(&self, device_id: &DeviceId)
        -> Result<Option<DevicePosture>, SentinelError>;

    /// Stable identifier recorded in resolved postures and logs.
    fn name(&self) -> &str;
}

// ── NoopProvider ─────────────────────────────────────────────────────────────

/// Stands in when no MDM is configured: every lookup yields an unknown
/// posture (device acknowledged, nothing checked). Rules with device
/// conditions therefore never match, which is the safe default.
pub struct NoopProvider;

#[async_trait]
impl MdmProvider for NoopProvider {
    async fn lookup(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<DevicePosture>, SentinelError> {
        Ok(Some(DevicePosture::unknown(
            device_id.clone(),
            Utc::now(),
            self.name(),
        )))
    }

    fn name(&self) -> &str {
        "noop"
    }
}

// ── MultiProvider ────────────────────────────────────────────────────────────

/// Chains providers; the first successful, non-empty lookup wins. Provider
/// errors are logged and the chain continues — a dead provider must not make
/// every device invisible when another one knows it.
pub struct MultiProvider {
    providers: Vec<Box<dyn MdmProvider>>,
}

impl MultiProvider {
    pub fn new(providers: Vec<Box<dyn MdmProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl MdmProvider for MultiProvider {
    async fn lookup(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<DevicePosture>, SentinelError> {
        let mut answered = false;
        let mut last_err = None;
        for provider in &self.providers {
            match provider.lookup(device_id).await {
                Ok(Some(posture)) => {
                    debug!(provider = provider.name(), device = %device_id, "posture resolved");
                    return Ok(Some(posture));
                }
                Ok(None) => answered = true,
                Err(e) => {
                    warn!(provider = provider.name(), device = %device_id, error = %e, "provider lookup failed; trying next");
                    last_err = Some(e);
                }
            }
        }
        // Unknown device when at least one provider answered; an error only
        // when every provider failed.
        match last_err {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "multi"
    }
}
