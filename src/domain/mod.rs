//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `subscription` - Mirrored billing record, entitlement and error taxonomy

pub mod foundation;
pub mod subscription;
