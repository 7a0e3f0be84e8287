//! Foundation module - Shared domain primitives.
//!
//! Contains the identifiers, timestamps and error types shared by the
//! subscription domain and its adapters.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::UserId;
pub use timestamp::Timestamp;
