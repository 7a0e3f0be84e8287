//! Postgres settings for the subscription mirror and webhook ledger

use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use super::error::ValidationError;

/// Upper bound on pooled connections for a single process.
const MAX_POOL_SIZE: u32 = 100;

/// Connection settings read from `PREMIUM_SYNC__DATABASE__*`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. Required.
    pub url: String,

    /// Pool ceiling shared by the store and the ledger.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a request may wait for a free connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Apply `migrations/` at startup.
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Pool options for `PgPoolOptions::connect`.
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("DATABASE_URL"));
        }
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if self.max_connections == 0 {
            return Err(ValidationError::EmptyPool);
        }
        if self.max_connections > MAX_POOL_SIZE {
            return Err(ValidationError::PoolSizeTooLarge);
        }
        Ok(())
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_run_migrations() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            run_migrations: default_run_migrations(),
        }
    }

    #[test]
    fn accepts_both_postgres_schemes() {
        assert!(database("postgres://localhost/premium").validate().is_ok());
        assert!(database("postgresql://sync@db:5432/premium").validate().is_ok());
    }

    #[test]
    fn empty_url_is_missing() {
        assert_eq!(
            database("").validate(),
            Err(ValidationError::MissingRequired("DATABASE_URL"))
        );
    }

    #[test]
    fn non_postgres_url_is_rejected() {
        assert_eq!(
            database("mysql://localhost/premium").validate(),
            Err(ValidationError::InvalidDatabaseUrl)
        );
    }

    #[test]
    fn pool_must_hold_between_one_and_a_hundred_connections() {
        let mut config = database("postgres://localhost/premium");

        config.max_connections = 0;
        assert_eq!(config.validate(), Err(ValidationError::EmptyPool));

        config.max_connections = MAX_POOL_SIZE + 1;
        assert_eq!(config.validate(), Err(ValidationError::PoolSizeTooLarge));

        config.max_connections = MAX_POOL_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn acquire_timeout_is_in_seconds() {
        let mut config = database("postgres://localhost/premium");
        config.acquire_timeout_secs = 12;
        assert_eq!(config.acquire_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn pool_options_carry_the_configured_bounds() {
        let mut config = database("postgres://localhost/premium");
        config.max_connections = 4;
        config.acquire_timeout_secs = 3;

        let options = config.pool_options();

        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(3));
    }
}
