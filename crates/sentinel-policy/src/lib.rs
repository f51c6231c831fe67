//! sentinel-policy
//!
//! Policy documents and the loader chain that produces them: fetch from the
//! parameter store, verify the signature envelope, parse and validate the
//! YAML schema, cache briefly. Production composition is
//! `CachedLoader<VerifyingLoader<RawLoader>>`.

pub mod duration;
pub mod envelope;
pub mod loader;
pub mod model;
pub mod schema;
pub mod store;

pub use duration::{format_duration, parse_duration};
pub use envelope::SignatureEnvelope;
pub use loader::{CachedLoader, PolicyLoader, RawLoader, VerifyingLoader};
pub use model::{
    ApprovalPolicy, AutoApproveRule, BreakGlassPolicy, DeviceConditions, HourRange, Policy,
    RateLimitPolicy, RateLimitRule, Rule, TimeWindow, Weekday,
};
pub use schema::{parse_policy, validate};
pub use store::{FsParameterStore, Parameter, ParameterStore};
