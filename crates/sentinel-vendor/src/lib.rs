//! sentinel-vendor
//!
//! Fingerprinted credential vending: chained role assumption that stamps a
//! unique provenance token onto every issued session and clamps the session
//! duration to the decision's bounds.

pub mod sts;
pub mod vendor;

pub use sts::{AssumeRoleRequest, BaseCredentials, StsClient, TemporaryCredentials};
pub use vendor::{CredentialVendor, IssuedCredentials, RoleSpec};
