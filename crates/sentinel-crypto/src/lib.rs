pub mod ids;
pub mod logsign;
pub mod verify;

pub use ids::{derive_device_id, new_event_id, new_request_id};
pub use logsign::LogSigner;
pub use verify::{SignatureVerifier, SigningAlgorithm};
