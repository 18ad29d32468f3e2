//! Webhook ingestor
//!
//! Runs one provider delivery through the pipeline. Only signature failures
//! surface as errors; every other failure is reported and swallowed so the
//! provider never retries a payload that would fail again.

use super::correlate::{find_email, CorrelationKeys};
use super::dedupe::{IdempotencyCache, MemoryIdempotencyCache};
use super::normalize::{event_data, normalize, provider_event_id};
use super::signature::{SignatureBlock, SignatureVerifier};
use super::transition::{apply_event, TransitionResult};
use super::WebhookError;
use chrono::Utc;
use mailer_log_common::config::WebhookConfig;
use mailer_log_common::types::{EmailId, EventId};
use mailer_log_storage::repository::{EmailRepository, EventRepository};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Benign result of an authenticated webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event stored against an email
    Recorded {
        email_id: EmailId,
        event_id: EventId,
        transition: TransitionResult,
    },
    /// Provider event id already seen by the cache or the store
    DuplicateEvent,
    /// No email matches the event's message id or tracking id
    EmailNotFound,
    /// Event name outside the known event types
    Ignored { event: String },
    /// Processing failed; the failure was reported
    Failed,
}

/// External error-reporting collaborator
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &WebhookError, provider_event_id: Option<&str>);
}

/// Reports errors to the log
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &WebhookError, provider_event_id: Option<&str>) {
        error!(
            provider_event_id = ?provider_event_id,
            "Webhook processing error: {}", error
        );
    }
}

/// Webhook ingestion pipeline
pub struct WebhookIngestor {
    verifier: SignatureVerifier,
    cache: Arc<dyn IdempotencyCache>,
    emails: Arc<dyn EmailRepository>,
    events: Arc<dyn EventRepository>,
    reporter: Arc<dyn ErrorReporter>,
}

impl WebhookIngestor {
    pub fn new(
        verifier: SignatureVerifier,
        cache: Arc<dyn IdempotencyCache>,
        emails: Arc<dyn EmailRepository>,
        events: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            verifier,
            cache,
            emails,
            events,
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Build an ingestor with an in-memory duplicate cache
    pub fn from_config(
        config: &WebhookConfig,
        emails: Arc<dyn EmailRepository>,
        events: Arc<dyn EventRepository>,
    ) -> Self {
        Self::new(
            SignatureVerifier::from_config(config),
            Arc::new(MemoryIdempotencyCache::from_config(config)),
            emails,
            events,
        )
    }

    /// Replace the error reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Whether a signing key is configured; without one every delivery is rejected
    pub fn signing_configured(&self) -> bool {
        self.verifier.is_configured()
    }

    /// Ingest one webhook document.
    ///
    /// Returns `Err` only for [`WebhookError::Unauthorized`].
    pub async fn ingest(&self, document: &Value) -> Result<IngestOutcome, WebhookError> {
        let signature = SignatureBlock::from_document(document);
        if let Err(e) = self.verifier.verify(signature.as_ref()) {
            warn!("Rejected webhook: {}", e);
            return Err(e);
        }

        let data = event_data(document);
        let event_id = provider_event_id(&data);

        if let Some(id) = &event_id {
            if !self.cache.check_and_mark(id).await {
                info!(provider_event_id = %id, "Duplicate webhook event suppressed");
                return Ok(IngestOutcome::DuplicateEvent);
            }
        }

        match self.process(&data).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.reporter.report(&e, event_id.as_deref());
                Ok(IngestOutcome::Failed)
            }
        }
    }

    async fn process(&self, data: &Value) -> Result<IngestOutcome, WebhookError> {
        let normalized = normalize(data)?;

        let Some(event_type) = normalized.event_type() else {
            warn!(event = %normalized.event, "Ignoring unknown webhook event type");
            return Ok(IngestOutcome::Ignored {
                event: normalized.event,
            });
        };

        let keys = CorrelationKeys::from_event_data(data);
        let Some(email) = find_email(self.emails.as_ref(), &keys).await? else {
            info!(
                message_id = ?keys.message_id,
                tracking_id = ?keys.tracking_id,
                "Email not found for webhook event"
            );
            return Ok(IngestOutcome::EmailNotFound);
        };

        let received_at = Utc::now();
        let input = normalized.into_create_event(email.id, event_type, received_at);
        let Some(event) = self.events.insert(input).await? else {
            info!(email_id = %email.id, "Duplicate webhook event already stored");
            return Ok(IngestOutcome::DuplicateEvent);
        };

        let transition =
            apply_event(self.emails.as_ref(), email.id, event_type, received_at).await?;

        info!(
            email_id = %email.id,
            event_id = %event.id,
            event_type = %event_type,
            "Recorded webhook event"
        );

        Ok(IngestOutcome::Recorded {
            email_id: email.id,
            event_id: event.id,
            transition,
        })
    }
}
