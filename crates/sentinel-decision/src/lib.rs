//! sentinel-decision
//!
//! Rule matching and the decision orchestrator. Given an identity, profile,
//! mode, request time, and optionally a device, produce an allow/deny with a
//! bound maximum session duration — first match wins, default deny, active
//! break-glass events override.

pub mod decision;
pub mod matching;
pub mod orchestrator;

pub use decision::{Decision, DecisionRequest};
pub use matching::rule_matches;
pub use orchestrator::DecisionOrchestrator;
