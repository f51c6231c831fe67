//! MFA verification capability for break-glass policies that require a
//! second factor. The TOTP/SMS backends live outside the core.

use async_trait::async_trait;

use sentinel_core::error::SentinelError;
use sentinel_core::types::MfaMethod;

#[async_trait]
pub trait MfaVerifier: Send + Sync {
    /// `Ok(true)` when the code verifies for the user under the method.
    async fn verify(
        &self,
        user: &str,
        method: MfaMethod,
        code: &str,
    ) -> Result<bool, SentinelError>;
}
