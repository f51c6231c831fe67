//! sentinel-store
//!
//! Persistent record storage for break-glass events, approval requests, and
//! server sessions: a sled database with named record trees, secondary index
//! trees, conditional creates, and optimistic-concurrency transitions. The
//! typed store traits are the capability surface; nothing above this crate
//! touches sled directly.

pub mod approval;
pub mod breakglass;
pub mod db;
pub mod session;

pub use approval::{ApprovalStore, SledApprovalStore};
pub use breakglass::{BreakGlassStore, SledBreakGlassStore};
pub use db::StoreDb;
pub use session::{SessionStore, SledSessionStore};
