//! HMAC-SHA256 signing for decision-log lines.
//!
//! The signature covers `entry_bytes ‖ timestamp ‖ key_id` so that a line
//! cannot be re-dated or re-keyed without detection. Verification is
//! timing-safe.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use sentinel_core::constants::MIN_LOG_SIGNING_KEY_BYTES;
use sentinel_core::error::SentinelError;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies decision-log lines. Key material is wiped on drop.
pub struct LogSigner {
    key: Zeroizing<Vec<u8>>,
    key_id: String,
}

impl std::fmt::Debug for LogSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSigner")
            .field("key", &"<redacted>")
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl LogSigner {
    /// Create a signer. Keys shorter than 32 bytes are refused.
    pub fn new(key: Vec<u8>, key_id: impl Into<String>) -> Result<Self, SentinelError> {
        if key.len() < MIN_LOG_SIGNING_KEY_BYTES {
            return Err(SentinelError::SigningKeyTooShort {
                min: MIN_LOG_SIGNING_KEY_BYTES,
                got: key.len(),
            });
        }
        Ok(Self {
            key: Zeroizing::new(key),
            key_id: key_id.into(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Base64 HMAC-SHA256 over `entry_bytes ‖ timestamp ‖ key_id`.
    pub fn sign(&self, entry_bytes: &[u8], timestamp: &str) -> String {
        BASE64.encode(self.mac(entry_bytes, timestamp))
    }

    /// Timing-safe verification of a Base64 signature.
    pub fn verify(&self, entry_bytes: &[u8], timestamp: &str, sig_b64: &str) -> bool {
        let Ok(sig) = BASE64.decode(sig_b64) else {
            return false;
        };
        let expected = self.mac(entry_bytes, timestamp);
        expected.as_slice().ct_eq(&sig).into()
    }

    fn mac(&self, entry_bytes: &[u8], timestamp: &str) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(entry_bytes);
        mac.update(timestamp.as_bytes());
        mac.update(self.key_id.as_bytes());
        mac.finalize().into_bytes().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> LogSigner {
        LogSigner::new(vec![0x42; 32], "audit-key-1").unwrap()
    }

    #[test]
    fn short_key_refused() {
        let err = LogSigner::new(vec![0x42; 16], "k").unwrap_err();
        assert!(matches!(
            err,
            SentinelError::SigningKeyTooShort { min: 32, got: 16 }
        ));
    }

    #[test]
    fn sign_verify_round_trip() {
        let s = signer();
        let sig = s.sign(b"{\"effect\":\"allow\"}", "2026-03-01T12:00:00Z");
        assert!(s.verify(b"{\"effect\":\"allow\"}", "2026-03-01T12:00:00Z", &sig));
    }

    #[test]
    fn tampered_entry_fails() {
        let s = signer();
        let sig = s.sign(b"{\"effect\":\"allow\"}", "2026-03-01T12:00:00Z");
        assert!(!s.verify(b"{\"effect\":\"deny\"}", "2026-03-01T12:00:00Z", &sig));
    }

    #[test]
    fn tampered_timestamp_fails() {
        let s = signer();
        let sig = s.sign(b"{}", "2026-03-01T12:00:00Z");
        assert!(!s.verify(b"{}", "2026-03-01T12:00:01Z", &sig));
    }

    #[test]
    fn wrong_key_id_fails() {
        let a = LogSigner::new(vec![0x42; 32], "key-a").unwrap();
        let b = LogSigner::new(vec![0x42; 32], "key-b").unwrap();
        let sig = a.sign(b"{}", "2026-03-01T12:00:00Z");
        assert!(!b.verify(b"{}", "2026-03-01T12:00:00Z", &sig));
    }

    #[test]
    fn malformed_base64_fails_closed() {
        let s = signer();
        assert!(!s.verify(b"{}", "2026-03-01T12:00:00Z", "not base64!!"));
    }
}
