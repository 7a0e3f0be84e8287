//! UserDirectory port - read access to platform user profiles.
//!
//! Checkout needs the user's display name and email to create the billing
//! customer. Profiles are owned by the auth side of the platform; this port
//! only reads them.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

/// The parts of a user profile billing cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    /// Name and email, if both are present and non-blank.
    pub fn billing_identity(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().filter(|s| !s.trim().is_empty())?;
        let email = self.email.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((name, email))
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError>;
}
