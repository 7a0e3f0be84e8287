//! In-memory user directory.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{UserDirectory, UserProfile};

use super::lock_poisoned;

#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    profiles: Arc<RwLock<HashMap<UserId, UserProfile>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile.
    pub fn insert(&self, profile: UserProfile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.user_id.clone(), profile);
        }
    }

    /// Add a user with both name and email set.
    pub fn add_user(&self, user_id: &UserId, name: &str, email: &str) {
        self.insert(UserProfile {
            user_id: user_id.clone(),
            name: Some(name.to_string()),
            email: Some(email.to_string()),
        });
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| lock_poisoned("user directory"))?;
        Ok(profiles.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_added_user() {
        let directory = InMemoryUserDirectory::new();
        let user_id = UserId::new("u1").unwrap();
        directory.add_user(&user_id, "Ada", "ada@example.com");

        let profile = directory.find_profile(&user_id).await.unwrap().unwrap();
        assert_eq!(profile.billing_identity(), Some(("Ada", "ada@example.com")));
        assert!(directory
            .find_profile(&UserId::new("u2").unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
