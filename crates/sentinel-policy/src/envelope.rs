//! JSON signature envelope wrapping signed policy payloads.
//!
//! The signed bytes are the raw (non-Base64) payload; verifiers hand them to
//! the signature capability as `MessageType=RAW`. Any malformation is a
//! `SignatureInvalid` — a broken envelope and a rejected signature get the
//! same fail-closed treatment.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use sentinel_core::error::SentinelError;
use sentinel_core::types::Timestamp;
use sentinel_crypto::SigningAlgorithm;

/// `{"payload": "<base64 YAML>", "kms_key_id": "arn:...", "algorithm": ...,
///   "signature": "<base64>", "signed_at": "RFC3339"}`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub payload: String,
    pub kms_key_id: String,
    pub algorithm: SigningAlgorithm,
    pub signature: String,
    pub signed_at: Timestamp,
}

impl SignatureEnvelope {
    pub fn parse(bytes: &[u8]) -> Result<Self, SentinelError> {
        serde_json::from_slice(bytes)
            .map_err(|e| SentinelError::SignatureInvalid(format!("malformed envelope: {e}")))
    }

    /// The exact bytes the signature covers.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, SentinelError> {
        BASE64
            .decode(&self.payload)
            .map_err(|e| SentinelError::SignatureInvalid(format!("payload not base64: {e}")))
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, SentinelError> {
        BASE64
            .decode(&self.signature)
            .map_err(|e| SentinelError::SignatureInvalid(format!("signature not base64: {e}")))
    }
}
