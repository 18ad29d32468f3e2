//! Email repository

use crate::db::DatabasePool;
use crate::models::{CreateEmail, Email, EmailFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailer_log_common::types::{EmailId, Page, PageRequest, TrackingId};
use mailer_log_common::{Error, Result, StatusTransition};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Email repository trait
#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// Persist a new email record
    async fn create(&self, input: CreateEmail) -> Result<Email>;

    /// Get an email by ID
    async fn get(&self, id: EmailId) -> Result<Option<Email>>;

    /// Exact match on the transport-assigned message id
    async fn find_by_message_id(&self, message_id: &str) -> Result<Option<Email>>;

    /// Exact match on the tracking id injected at send time
    async fn find_by_tracking_id(&self, tracking_id: TrackingId) -> Result<Option<Email>>;

    /// List emails newest first
    async fn list(&self, filter: &EmailFilter, page: PageRequest) -> Result<Page<Email>>;

    /// Distinct non-null mailer classes, sorted
    async fn list_mailers(&self) -> Result<Vec<String>>;

    /// Apply a status transition if its guard holds at write time.
    ///
    /// Returns `true` when the row was updated.
    async fn apply_transition(
        &self,
        id: EmailId,
        transition: &StatusTransition,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Delete emails (and their events) created before `cutoff`
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Check backing store health
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// PostgreSQL email repository implementation
pub struct DbEmailRepository {
    pool: DatabasePool,
}

impl DbEmailRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &EmailFilter) {
        if let Some(recipient) = &filter.recipient {
            builder
                .push(" AND array_to_string(to_addresses, ',') ILIKE ")
                .push_bind(format!("%{}%", recipient));
        }
        if let Some(sender) = &filter.sender {
            builder
                .push(" AND from_address ILIKE ")
                .push_bind(format!("%{}%", sender));
        }
        if let Some(subject) = &filter.subject_search {
            builder
                .push(" AND subject ILIKE ")
                .push_bind(format!("%{}%", subject));
        }
        if let Some(mailer) = &filter.mailer {
            builder.push(" AND mailer_class = ").push_bind(mailer.clone());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = filter.created_from() {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(before) = filter.created_before() {
            builder.push(" AND created_at < ").push_bind(before);
        }
    }
}

#[async_trait]
impl EmailRepository for DbEmailRepository {
    async fn create(&self, input: CreateEmail) -> Result<Email> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let (accountable_type, accountable_id) = match input.owner {
            Some(owner) => (Some(owner.owner_type), Some(owner.owner_id)),
            None => (None, None),
        };

        sqlx::query_as::<_, Email>(
            r#"
            INSERT INTO mailer_log_emails (
                id, tracking_id, message_id, mailer_class, mailer_action, from_address,
                to_addresses, cc_addresses, bcc_addresses, subject, html_body, text_body,
                headers, call_stack, domain, accountable_type, accountable_id, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.tracking_id)
        .bind(&input.message_id)
        .bind(&input.mailer_class)
        .bind(&input.mailer_action)
        .bind(&input.from_address)
        .bind(&input.to_addresses)
        .bind(&input.cc_addresses)
        .bind(&input.bcc_addresses)
        .bind(&input.subject)
        .bind(&input.html_body)
        .bind(&input.text_body)
        .bind(&input.headers)
        .bind(&input.call_stack)
        .bind(&input.domain)
        .bind(accountable_type)
        .bind(accountable_id)
        .bind(input.status.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict(format!("Email already recorded: {}", db.message()))
            }
            _ => Error::Database(e.to_string()),
        })
    }

    async fn get(&self, id: EmailId) -> Result<Option<Email>> {
        sqlx::query_as::<_, Email>("SELECT * FROM mailer_log_emails WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn find_by_message_id(&self, message_id: &str) -> Result<Option<Email>> {
        sqlx::query_as::<_, Email>("SELECT * FROM mailer_log_emails WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn find_by_tracking_id(&self, tracking_id: TrackingId) -> Result<Option<Email>> {
        sqlx::query_as::<_, Email>("SELECT * FROM mailer_log_emails WHERE tracking_id = $1")
            .bind(tracking_id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list(&self, filter: &EmailFilter, page: PageRequest) -> Result<Page<Email>> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM mailer_log_emails WHERE TRUE");
        Self::push_filters(&mut count_query, filter);
        let (total_count,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut list_query =
            QueryBuilder::<Postgres>::new("SELECT * FROM mailer_log_emails WHERE TRUE");
        Self::push_filters(&mut list_query, filter);
        list_query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = list_query
            .build_query_as::<Email>()
            .fetch_all(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Page { items, total_count })
    }

    async fn list_mailers(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT mailer_class FROM mailer_log_emails
            WHERE mailer_class IS NOT NULL
            ORDER BY mailer_class ASC
            "#,
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(mailer,)| mailer).collect())
    }

    async fn apply_transition(
        &self,
        id: EmailId,
        transition: &StatusTransition,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        // Guard and stamp come from closed enums, never from input.
        let stamp = transition
            .stamp
            .map(|stamp| format!(", {} = $3", stamp.column()))
            .unwrap_or_default();
        let sql = format!(
            "UPDATE mailer_log_emails SET status = $2, updated_at = $3{} WHERE id = $1 AND ({})",
            stamp,
            transition.guard.sql_predicate()
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(transition.status.as_str())
            .bind(at)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM mailer_log_emails WHERE created_at < $1")
            .bind(cutoff)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<()> {
        self.pool.health_check().await
    }
}
