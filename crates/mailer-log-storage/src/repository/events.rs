//! Event repository

use crate::db::DatabasePool;
use crate::models::{CreateEvent, Event};
use async_trait::async_trait;
use chrono::Utc;
use mailer_log_common::types::EmailId;
use mailer_log_common::{Error, Result};
use uuid::Uuid;

/// Event repository trait
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert an event unless one with the same provider event id exists.
    ///
    /// Returns `None` when the provider event id was already stored.
    async fn insert(&self, input: CreateEvent) -> Result<Option<Event>>;

    /// Events of an email, most recent occurrence first
    async fn list_for_email(&self, email_id: EmailId) -> Result<Vec<Event>>;

    /// Count events of an email
    async fn count_for_email(&self, email_id: EmailId) -> Result<i64>;
}

/// PostgreSQL event repository implementation
pub struct DbEventRepository {
    pool: DatabasePool,
}

impl DbEventRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for DbEventRepository {
    async fn insert(&self, input: CreateEvent) -> Result<Option<Event>> {
        let id = Uuid::now_v7();

        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO mailer_log_events (
                id, email_id, event_type, provider_event_id, occurred_at, recipient,
                ip_address, user_agent, device_type, client_name, client_os,
                country, region, city, url, raw_payload, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (provider_event_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.email_id)
        .bind(input.event_type.as_str())
        .bind(&input.provider_event_id)
        .bind(input.occurred_at)
        .bind(&input.recipient)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .bind(&input.device_type)
        .bind(&input.client_name)
        .bind(&input.client_os)
        .bind(&input.country)
        .bind(&input.region)
        .bind(&input.city)
        .bind(&input.url)
        .bind(&input.raw_payload)
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_for_email(&self, email_id: EmailId) -> Result<Vec<Event>> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM mailer_log_events
            WHERE email_id = $1
            ORDER BY occurred_at DESC, id DESC
            "#,
        )
        .bind(email_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_for_email(&self, email_id: EmailId) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM mailer_log_events WHERE email_id = $1")
                .bind(email_id)
                .fetch_one(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }
}
