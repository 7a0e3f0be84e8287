//! PostgreSQL implementation of UserDirectory over the platform's `users` table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{UserDirectory, UserProfile};

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    name: Option<String>,
    email: Option<String>,
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT name, email FROM users WHERE id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("find user", e))?;

        Ok(row.map(|row| UserProfile {
            user_id: user_id.clone(),
            name: row.name,
            email: row.email,
        }))
    }
}
