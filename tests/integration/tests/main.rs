//! End-to-end handler chain scenarios.
//!
//! Each scenario drives an identity provider chain and a service provider
//! chain through the public API, with real keys and serialized documents
//! in between.

mod common;
mod idp_flows;
mod registry;
mod sp_validation;
mod sso_roundtrip;
