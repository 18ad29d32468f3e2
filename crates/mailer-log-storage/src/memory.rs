//! In-process store
//!
//! Implements both repository traits over a single lock so that the same
//! guarantees hold as in PostgreSQL: unique tracking/message/provider event
//! ids, guarded status updates evaluated under the write lock, and cascade
//! deletion of events with their email.

use crate::models::{CreateEmail, CreateEvent, Email, EmailFilter, Event};
use crate::repository::{EmailRepository, EventRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailer_log_common::types::{EmailId, Page, PageRequest, TrackingId};
use mailer_log_common::{Error, Result, StatusTransition, TransitionStamp};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    emails: Vec<Email>,
    events: Vec<Event>,
}

/// Email and event store kept in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Overwrite the creation time of an email
    pub async fn set_created_at(&self, id: EmailId, created_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let email = state
            .emails
            .iter_mut()
            .find(|email| email.id == id)
            .ok_or_else(|| Error::NotFound(format!("Email {}", id)))?;
        email.created_at = created_at;
        Ok(())
    }
}

#[async_trait]
impl EmailRepository for MemoryStore {
    async fn create(&self, input: CreateEmail) -> Result<Email> {
        let mut state = self.state.write().await;

        if state
            .emails
            .iter()
            .any(|email| email.tracking_id == input.tracking_id)
        {
            return Err(Error::Conflict(format!(
                "Email already recorded for tracking id {}",
                input.tracking_id
            )));
        }
        if let Some(message_id) = &input.message_id {
            if state
                .emails
                .iter()
                .any(|email| email.message_id.as_ref() == Some(message_id))
            {
                return Err(Error::Conflict(format!(
                    "Email already recorded for message id {}",
                    message_id
                )));
            }
        }

        let now = Utc::now();
        let (accountable_type, accountable_id) = match input.owner {
            Some(owner) => (Some(owner.owner_type), Some(owner.owner_id)),
            None => (None, None),
        };
        let email = Email {
            id: Uuid::now_v7(),
            tracking_id: input.tracking_id,
            message_id: input.message_id,
            mailer_class: input.mailer_class,
            mailer_action: input.mailer_action,
            from_address: input.from_address,
            to_addresses: input.to_addresses,
            cc_addresses: input.cc_addresses,
            bcc_addresses: input.bcc_addresses,
            subject: input.subject,
            html_body: input.html_body,
            text_body: input.text_body,
            headers: input.headers,
            call_stack: input.call_stack,
            domain: input.domain,
            accountable_type,
            accountable_id,
            status: input.status.as_str().to_string(),
            delivered_at: None,
            opened_at: None,
            clicked_at: None,
            bounced_at: None,
            created_at: now,
            updated_at: now,
        };

        state.emails.push(email.clone());
        Ok(email)
    }

    async fn get(&self, id: EmailId) -> Result<Option<Email>> {
        let state = self.state.read().await;
        Ok(state.emails.iter().find(|email| email.id == id).cloned())
    }

    async fn find_by_message_id(&self, message_id: &str) -> Result<Option<Email>> {
        let state = self.state.read().await;
        Ok(state
            .emails
            .iter()
            .find(|email| email.message_id.as_deref() == Some(message_id))
            .cloned())
    }

    async fn find_by_tracking_id(&self, tracking_id: TrackingId) -> Result<Option<Email>> {
        let state = self.state.read().await;
        Ok(state
            .emails
            .iter()
            .find(|email| email.tracking_id == tracking_id)
            .cloned())
    }

    async fn list(&self, filter: &EmailFilter, page: PageRequest) -> Result<Page<Email>> {
        let state = self.state.read().await;
        let mut matching: Vec<&Email> = state
            .emails
            .iter()
            .filter(|email| filter.matches(email))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total_count = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(Page { items, total_count })
    }

    async fn list_mailers(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let mut mailers: Vec<String> = state
            .emails
            .iter()
            .filter_map(|email| email.mailer_class.clone())
            .collect();
        mailers.sort();
        mailers.dedup();
        Ok(mailers)
    }

    async fn apply_transition(
        &self,
        id: EmailId,
        transition: &StatusTransition,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(email) = state.emails.iter_mut().find(|email| email.id == id) else {
            return Ok(false);
        };

        if !transition.guard.holds(email.opened_at, email.clicked_at) {
            return Ok(false);
        }

        email.status = transition.status.as_str().to_string();
        email.updated_at = at;
        match transition.stamp {
            Some(TransitionStamp::DeliveredAt) => email.delivered_at = Some(at),
            Some(TransitionStamp::OpenedAt) => email.opened_at = Some(at),
            Some(TransitionStamp::ClickedAt) => email.clicked_at = Some(at),
            Some(TransitionStamp::BouncedAt) => email.bounced_at = Some(at),
            None => {}
        }
        Ok(true)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let (expired, kept): (Vec<Email>, Vec<Email>) = std::mem::take(&mut state.emails)
            .into_iter()
            .partition(|email| email.created_at < cutoff);
        state.emails = kept;
        state
            .events
            .retain(|event| !expired.iter().any(|email| email.id == event.email_id));
        Ok(expired.len() as u64)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn insert(&self, input: CreateEvent) -> Result<Option<Event>> {
        let mut state = self.state.write().await;

        if let Some(provider_event_id) = &input.provider_event_id {
            if state
                .events
                .iter()
                .any(|event| event.provider_event_id.as_ref() == Some(provider_event_id))
            {
                return Ok(None);
            }
        }
        if !state.emails.iter().any(|email| email.id == input.email_id) {
            return Err(Error::Database(format!(
                "Email {} does not exist",
                input.email_id
            )));
        }

        let event = Event {
            id: Uuid::now_v7(),
            email_id: input.email_id,
            event_type: input.event_type.as_str().to_string(),
            provider_event_id: input.provider_event_id,
            occurred_at: input.occurred_at,
            recipient: input.recipient,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            device_type: input.device_type,
            client_name: input.client_name,
            client_os: input.client_os,
            country: input.country,
            region: input.region,
            city: input.city,
            url: input.url,
            raw_payload: input.raw_payload,
            created_at: Utc::now(),
        };

        state.events.push(event.clone());
        Ok(Some(event))
    }

    async fn list_for_email(&self, email_id: EmailId) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|event| event.email_id == email_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        Ok(events)
    }

    async fn count_for_email(&self, email_id: EmailId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|event| event.email_id == email_id)
            .count() as i64)
    }
}
