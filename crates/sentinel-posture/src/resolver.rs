//! Posture resolution with the policy-level fail rule applied.

use std::sync::Arc;
use tracing::warn;

use sentinel_core::constants::MDM_TIMEOUT;
use sentinel_core::error::SentinelError;
use sentinel_core::posture::DevicePosture;
use sentinel_core::types::DeviceId;

use crate::provider::MdmProvider;

/// Resolves device posture for the decision engine.
///
/// The fail rule is policy-level: with `fail_closed`, a resolution error
/// denies the request; otherwise it yields `None` and rules without device
/// conditions still evaluate. Rule-level matching against a `None` posture
/// is strict regardless — that check lives in the decision engine.
pub struct PostureResolver {
    provider: Arc<dyn MdmProvider>,
}

impl PostureResolver {
    pub fn new(provider: Arc<dyn MdmProvider>) -> Self {
        Self { provider }
    }

    pub async fn resolve(
        &self,
        device_id: &DeviceId,
        fail_closed: bool,
    ) -> Result<Option<DevicePosture>, SentinelError> {
        let lookup = tokio::time::timeout(MDM_TIMEOUT, self.provider.lookup(device_id)).await;
        let outcome = match lookup {
            Ok(result) => result,
            Err(_) => Err(SentinelError::DeadlineExceeded {
                operation: format!("mdm lookup via {}", self.provider.name()),
            }),
        };
        match outcome {
            Ok(posture) => Ok(posture),
            Err(e) if fail_closed => {
                warn!(device = %device_id, error = %e, "posture resolution failed; policy requires posture — denying");
                Err(SentinelError::Denied {
                    reason: "device-posture-unavailable".to_string(),
                })
            }
            Err(e) => {
                warn!(device = %device_id, error = %e, "posture resolution failed; continuing without posture");
                Ok(None)
            }
        }
    }
}
