//! Status state machine

use chrono::{DateTime, Utc};
use mailer_log_common::types::EmailId;
use mailer_log_common::{EmailStatus, EventType, Result, StatusTransition};
use mailer_log_storage::repository::EmailRepository;
use tracing::debug;

/// Effect of an event on its email's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// Status moved to the given value
    Applied(EmailStatus),
    /// A more advanced funnel stage was already recorded
    Skipped,
    /// The event type never changes the status
    NoChange,
}

/// Apply the status change implied by `event_type` to an email.
///
/// The guard is evaluated by the store at write time, so concurrent
/// deliveries for the same email cannot regress the funnel.
pub async fn apply_event(
    emails: &dyn EmailRepository,
    email_id: EmailId,
    event_type: EventType,
    at: DateTime<Utc>,
) -> Result<TransitionResult> {
    let Some(transition) = StatusTransition::for_event(event_type) else {
        return Ok(TransitionResult::NoChange);
    };

    if emails.apply_transition(email_id, &transition, at).await? {
        debug!(email_id = %email_id, status = %transition.status, "Email status updated");
        Ok(TransitionResult::Applied(transition.status))
    } else {
        debug!(
            email_id = %email_id,
            event_type = %event_type,
            "Status transition skipped by guard"
        );
        Ok(TransitionResult::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailer_log_storage::models::{CreateEmail, Email};
    use mailer_log_storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    async fn sent_email(store: &MemoryStore) -> Email {
        store
            .create(CreateEmail::new(Uuid::new_v4(), EmailStatus::Sent))
            .await
            .unwrap()
    }

    async fn reload(store: &MemoryStore, id: EmailId) -> Email {
        store.get(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_funnel_progression() {
        let store = MemoryStore::new();
        let email = sent_email(&store).await;
        let now = Utc::now();

        for (event_type, status) in [
            (EventType::Delivered, EmailStatus::Delivered),
            (EventType::Opened, EmailStatus::Opened),
            (EventType::Clicked, EmailStatus::Clicked),
        ] {
            let result = apply_event(&store, email.id, event_type, now).await.unwrap();
            assert_eq!(result, TransitionResult::Applied(status));
        }

        let email = reload(&store, email.id).await;
        assert_eq!(email.status, "clicked");
        assert_eq!(email.delivered_at, Some(now));
        assert_eq!(email.opened_at, Some(now));
        assert_eq!(email.clicked_at, Some(now));
    }

    #[tokio::test]
    async fn test_clicked_email_does_not_regress() {
        let store = MemoryStore::new();
        let email = sent_email(&store).await;
        apply_event(&store, email.id, EventType::Clicked, Utc::now())
            .await
            .unwrap();

        for event_type in [EventType::Delivered, EventType::Opened] {
            let result = apply_event(&store, email.id, event_type, Utc::now())
                .await
                .unwrap();
            assert_eq!(result, TransitionResult::Skipped);
        }

        let email = reload(&store, email.id).await;
        assert_eq!(email.status, "clicked");
        assert_eq!(email.delivered_at, None);
        assert_eq!(email.opened_at, None);
    }

    #[tokio::test]
    async fn test_opened_email_ignores_late_delivery() {
        let store = MemoryStore::new();
        let email = sent_email(&store).await;
        apply_event(&store, email.id, EventType::Opened, Utc::now())
            .await
            .unwrap();

        let result = apply_event(&store, email.id, EventType::Delivered, Utc::now())
            .await
            .unwrap();
        assert_eq!(result, TransitionResult::Skipped);
        assert_eq!(reload(&store, email.id).await.status, "opened");
    }

    #[tokio::test]
    async fn test_bounce_overrides_any_stage() {
        let store = MemoryStore::new();
        let email = sent_email(&store).await;
        let opened_at = Utc::now();
        apply_event(&store, email.id, EventType::Opened, opened_at)
            .await
            .unwrap();
        apply_event(&store, email.id, EventType::Clicked, opened_at)
            .await
            .unwrap();

        let bounced_at = Utc::now();
        let result = apply_event(&store, email.id, EventType::Dropped, bounced_at)
            .await
            .unwrap();
        assert_eq!(result, TransitionResult::Applied(EmailStatus::Bounced));

        let email = reload(&store, email.id).await;
        assert_eq!(email.status, "bounced");
        assert_eq!(email.bounced_at, Some(bounced_at));
        assert_eq!(email.opened_at, Some(opened_at));
    }

    #[tokio::test]
    async fn test_complaint_and_passive_events() {
        let store = MemoryStore::new();
        let email = sent_email(&store).await;

        for event_type in [EventType::Accepted, EventType::Unsubscribed] {
            let result = apply_event(&store, email.id, event_type, Utc::now())
                .await
                .unwrap();
            assert_eq!(result, TransitionResult::NoChange);
        }
        assert_eq!(reload(&store, email.id).await.status, "sent");

        let result = apply_event(&store, email.id, EventType::Complained, Utc::now())
            .await
            .unwrap();
        assert_eq!(result, TransitionResult::Applied(EmailStatus::Complained));
        let email = reload(&store, email.id).await;
        assert_eq!(email.status, "complained");
        assert_eq!(email.bounced_at, None);
    }
}
