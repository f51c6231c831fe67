//! Identifier generation.
//!
//! Request ids and break-glass event ids carry 64 bits of crypto-random
//! entropy each; device ids are deterministic HMAC-SHA256 digests of a
//! stable hardware id under an app-scoped key.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use sentinel_core::types::{DeviceId, RequestId};

type HmacSha256 = Hmac<Sha256>;

/// Fresh request id: 16 lowercase hex chars from the OS CSPRNG.
pub fn new_request_id() -> RequestId {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    RequestId::from_entropy(bytes)
}

/// Fresh break-glass event id. Same format as a request id; collisions
/// surface as `AlreadyExists` at the store's conditional create.
pub fn new_event_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive a device id from a stable hardware identifier under an app-scoped
/// key: 64 lowercase hex chars of HMAC-SHA256.
pub fn derive_device_id(hardware_id: &str, app_key: &[u8]) -> DeviceId {
    let mut mac =
        HmacSha256::new_from_slice(app_key).expect("HMAC accepts keys of any length");
    mac.update(hardware_id.as_bytes());
    let digest: [u8; 32] = mac.finalize().into_bytes().into();
    DeviceId::from_digest(digest)
}
