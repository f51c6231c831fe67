//! sentinel-approval
//!
//! Out-of-band human approval backing the `require_approval` policy effect:
//! request, approve/deny/cancel, TTL expiry, and the active-grant lookup the
//! decision engine consults. Only `pending` requests move; the store's
//! conditional writes make terminal states immutable.

pub mod manager;

pub use manager::ApprovalManager;
