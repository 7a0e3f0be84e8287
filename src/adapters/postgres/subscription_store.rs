//! PostgreSQL implementation of SubscriptionStore.
//!
//! One row per user in `subscriptions`. Every write is a single statement:
//! inserts rely on the primary key over `user_id`, and patches are applied
//! with a conditional `UPDATE ... RETURNING` so unchanged rows keep their
//! `updated_at`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::subscription::{SubscriptionPatch, SubscriptionRecord, SubscriptionStatus};
use crate::ports::{InsertOutcome, SubscriptionStore};

const SELECT_COLUMNS: &str = "user_id, customer_id, subscription_id, price_id, status, \
     current_period_start, current_period_end, cancel_at_period_end, created_at, updated_at";

/// PostgreSQL implementation of the SubscriptionStore port.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE {} = $1",
            SELECT_COLUMNS, column
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("find subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    /// Apply `patch` to the row matching `column = key`.
    ///
    /// The UPDATE only fires when some mirrored field differs; a miss is
    /// followed by a plain read to tell "unchanged" from "absent".
    async fn patch_where(
        &self,
        column: &'static str,
        key: &str,
        patch: &SubscriptionPatch,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let sql = format!(
            r#"
            UPDATE subscriptions SET
                subscription_id = $2,
                price_id = $3,
                status = $4,
                current_period_start = $5,
                current_period_end = $6,
                cancel_at_period_end = $7,
                updated_at = $8
            WHERE {column} = $1
              AND (subscription_id IS DISTINCT FROM $2
                OR price_id IS DISTINCT FROM $3
                OR status <> $4
                OR current_period_start IS DISTINCT FROM $5
                OR current_period_end IS DISTINCT FROM $6
                OR cancel_at_period_end <> $7)
            RETURNING {columns}
            "#,
            column = column,
            columns = SELECT_COLUMNS,
        );

        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(key)
            .bind(&patch.subscription_id)
            .bind(&patch.price_id)
            .bind(patch.status.as_str())
            .bind(patch.current_period_start.map(|t| *t.as_datetime()))
            .bind(patch.current_period_end.map(|t| *t.as_datetime()))
            .bind(patch.cancel_at_period_end)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("update subscription", e))?;

        match row {
            Some(row) => SubscriptionRecord::try_from(row).map(Some),
            None => self.fetch_where(column, key).await,
        }
    }
}

/// Database row representation of a subscription record.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: String,
    customer_id: String,
    subscription_id: Option<String>,
    price_id: Option<String>,
    status: String,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionRecord {
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            customer_id: row.customer_id,
            subscription_id: row.subscription_id,
            price_id: row.price_id,
            status: SubscriptionStatus::from_provider(&row.status),
            current_period_start: row.current_period_start.map(Timestamp::from_datetime),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn is_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.fetch_where("user_id", user_id.as_str()).await
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.fetch_where("customer_id", customer_id).await
    }

    async fn insert_if_absent(
        &self,
        record: &SubscriptionRecord,
    ) -> Result<InsertOutcome, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO subscriptions (
                user_id, customer_id, subscription_id, price_id, status,
                current_period_start, current_period_end, cancel_at_period_end,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING {}
            "#,
            SELECT_COLUMNS
        );

        let inserted: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(record.user_id.as_str())
            .bind(&record.customer_id)
            .bind(&record.subscription_id)
            .bind(&record.price_id)
            .bind(record.status.as_str())
            .bind(record.current_period_start.map(|t| *t.as_datetime()))
            .bind(record.current_period_end.map(|t| *t.as_datetime()))
            .bind(record.cancel_at_period_end)
            .bind(record.created_at.as_datetime())
            .bind(record.updated_at.as_datetime())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_constraint_violation(&e, "subscriptions_customer_id_key") {
                    return DomainError::new(
                        ErrorCode::SubscriptionExists,
                        "Customer already belongs to another user",
                    );
                }
                DomainError::database("insert subscription", e)
            })?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row.try_into()?));
        }

        // Lost the race: the winner's row is committed by now.
        let existing = self.get(&record.user_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                "Subscription insert conflicted but no row was found",
            )
        })?;
        Ok(InsertOutcome::AlreadyExists(existing))
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        patch: &SubscriptionPatch,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.patch_where("user_id", user_id.as_str(), patch).await
    }

    async fn update_by_customer_id(
        &self,
        customer_id: &str,
        patch: &SubscriptionPatch,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.patch_where("customer_id", customer_id, patch).await
    }
}
