//! Asymmetric signature verification capability.
//!
//! Policy payloads are signed out-of-band by a KMS key; the broker only ever
//! verifies. The concrete KMS client lives outside the core — anything that
//! can answer "does this signature cover these raw bytes under this key id"
//! satisfies the contract. Verification failures and transport errors are
//! both fail-closed at the call site.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use sentinel_core::error::SentinelError;

/// Signing algorithms accepted in signature envelopes. Closed set; envelopes
/// naming anything else are rejected during parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[serde(rename = "RSASSA_PKCS1_V1_5_SHA_256")]
    RsassaPkcs1V15Sha256,
    #[serde(rename = "RSASSA_PSS_SHA_256")]
    RsassaPssSha256,
    #[serde(rename = "ECDSA_SHA_256")]
    EcdsaSha256,
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SigningAlgorithm::RsassaPkcs1V15Sha256 => "RSASSA_PKCS1_V1_5_SHA_256",
            SigningAlgorithm::RsassaPssSha256 => "RSASSA_PSS_SHA_256",
            SigningAlgorithm::EcdsaSha256 => "ECDSA_SHA_256",
        };
        write!(f, "{s}")
    }
}

/// Verifies a detached signature over raw message bytes (`MessageType=RAW`).
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// `Ok(true)` means the signature is valid. `Ok(false)` means the key
    /// answered and rejected it. `Err` means no answer was obtained; callers
    /// must treat this the same as rejection.
    async fn verify(
        &self,
        key_id: &str,
        algorithm: SigningAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SentinelError>;
}
