pub mod approval;
pub mod breakglass;
pub mod constants;
pub mod error;
pub mod identity;
pub mod posture;
pub mod session;
pub mod types;

pub use approval::{ApprovalRequest, ApprovalStatus};
pub use breakglass::{BreakGlassEvent, BreakGlassStatus, ReasonCode};
pub use constants::*;
pub use error::SentinelError;
pub use identity::{Identity, PrincipalType};
pub use posture::DevicePosture;
pub use session::ServerSession;
pub use types::*;
