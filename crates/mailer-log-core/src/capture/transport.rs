//! Tracking transport
//!
//! Wraps a mail transport so that every message it sends is tagged and
//! recorded.

use super::context::SendContext;
use super::intercept::{intercept, MailerLabels};
use super::record::{record_delivery, OwnerResolver};
use anyhow::Result;
use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use mailer_log_common::config::CaptureConfig;
use mailer_log_storage::models::Email;
use mailer_log_storage::repository::EmailRepository;
use std::sync::Arc;

/// Sends an already formatted RFC 5322 message
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_raw(&self, envelope: &Envelope, message: &[u8]) -> Result<()>;
}

#[async_trait]
impl MailTransport for AsyncSmtpTransport<Tokio1Executor> {
    async fn send_raw(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        AsyncTransport::send_raw(self, envelope, message).await?;
        Ok(())
    }
}

/// Transport decorator recording every successful send
pub struct TrackingTransport<T: MailTransport> {
    inner: T,
    emails: Arc<dyn EmailRepository>,
    resolver: Option<Arc<dyn OwnerResolver>>,
    capture: CaptureConfig,
}

impl<T: MailTransport> TrackingTransport<T> {
    pub fn new(inner: T, emails: Arc<dyn EmailRepository>, capture: CaptureConfig) -> Self {
        Self {
            inner,
            emails,
            resolver: None,
            capture,
        }
    }

    /// Set the strategy resolving the accountable owner of each email
    pub fn with_owner_resolver(mut self, resolver: Arc<dyn OwnerResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Tag, send and record one message.
    ///
    /// Transport failures are returned; recording failures are only logged,
    /// in which case the result is `Ok(None)`.
    pub async fn send(
        &self,
        envelope: &Envelope,
        message: &[u8],
        labels: &MailerLabels,
    ) -> Result<Option<Email>> {
        let mut ctx = SendContext::new();
        let tagged = intercept(message, envelope, labels, &mut ctx, &self.capture);

        self.inner.send_raw(envelope, &tagged).await?;

        Ok(record_delivery(&mut ctx, self.emails.as_ref(), self.resolver.as_deref()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailer_log_common::types::TRACKING_HEADER;
    use mailer_log_storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for Arc<RecordingTransport> {
        async fn send_raw(&self, _envelope: &Envelope, message: &[u8]) -> Result<()> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            self.sent.lock().unwrap().push(message.to_vec());
            Ok(())
        }
    }

    fn envelope() -> Envelope {
        Envelope::new(
            Some("noreply@example.com".parse().unwrap()),
            vec!["alice@example.com".parse().unwrap()],
        )
        .unwrap()
    }

    const MESSAGE: &[u8] = b"From: noreply@example.com\r\nTo: alice@example.com\r\nSubject: Hi\r\n\r\nBody\r\n";

    #[tokio::test]
    async fn test_send_tags_and_records() {
        let store = MemoryStore::new();
        let inner = Arc::new(RecordingTransport::default());
        let transport =
            TrackingTransport::new(inner.clone(), Arc::new(store.clone()), CaptureConfig::default());

        let email = transport
            .send(&envelope(), MESSAGE, &MailerLabels::default())
            .await
            .unwrap()
            .unwrap();

        let header = format!("{}: {}\r\n", TRACKING_HEADER, email.tracking_id);
        assert!(inner.sent.lock().unwrap()[0].starts_with(header.as_bytes()));

        let stored = store.find_by_tracking_id(email.tracking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, "sent");
        assert_eq!(stored.subject.as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_failed_send_records_nothing() {
        let store = MemoryStore::new();
        let inner = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let transport = TrackingTransport::new(inner, Arc::new(store.clone()), CaptureConfig::default());

        let result = transport
            .send(&envelope(), MESSAGE, &MailerLabels::default())
            .await;
        assert!(result.is_err());

        let page = store
            .list(&Default::default(), Default::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 0);
    }
}
