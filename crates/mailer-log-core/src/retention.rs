//! Retention Worker - Deletes emails past the retention period

use chrono::{Duration, Utc};
use mailer_log_common::config::RetentionConfig;
use mailer_log_common::Result;
use mailer_log_storage::repository::EmailRepository;
use std::sync::Arc;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info};

/// Periodically deletes old emails; their events go with them
pub struct RetentionWorker {
    emails: Arc<dyn EmailRepository>,
    period_days: u32,
    interval_secs: u64,
}

impl RetentionWorker {
    pub fn new(emails: Arc<dyn EmailRepository>, config: &RetentionConfig) -> Self {
        Self {
            emails,
            period_days: config.period_days,
            interval_secs: config.interval_secs.max(1),
        }
    }

    /// Run the cleanup loop
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.interval_secs));

        info!(
            "Retention worker started (period {} days, every {}s)",
            self.period_days, self.interval_secs
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_once().await {
                error!("Error during retention cleanup: {}", e);
            }
        }
    }

    /// Delete every email created before the retention cutoff
    pub async fn run_once(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(self.period_days));
        let deleted = self.emails.delete_created_before(cutoff).await?;

        if deleted > 0 {
            info!("Retention cleanup deleted {} emails created before {}", deleted, cutoff);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailer_log_common::types::EmailId;
    use mailer_log_common::EmailStatus;
    use mailer_log_storage::models::CreateEmail;
    use mailer_log_storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    async fn email_aged(store: &MemoryStore, days: i64) -> EmailId {
        let email = store
            .create(CreateEmail::new(Uuid::new_v4(), EmailStatus::Sent))
            .await
            .unwrap();
        store
            .set_created_at(email.id, Utc::now() - Duration::days(days))
            .await
            .unwrap();
        email.id
    }

    #[tokio::test]
    async fn test_run_once_deletes_expired_emails() {
        let store = MemoryStore::new();
        let old = email_aged(&store, 400).await;
        let recent = email_aged(&store, 10).await;

        let worker = RetentionWorker::new(Arc::new(store.clone()), &RetentionConfig::default());
        assert_eq!(worker.run_once().await.unwrap(), 1);

        assert!(store.get(old).await.unwrap().is_none());
        assert!(store.get(recent).await.unwrap().is_some());
        assert_eq!(worker.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_period() {
        let store = MemoryStore::new();
        email_aged(&store, 40).await;

        let config = RetentionConfig {
            period_days: 30,
            ..Default::default()
        };
        let worker = RetentionWorker::new(Arc::new(store), &config);
        assert_eq!(worker.run_once().await.unwrap(), 1);
    }
}
