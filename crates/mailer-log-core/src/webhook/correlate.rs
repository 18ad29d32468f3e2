//! Email correlation
//!
//! Resolves a provider event to the email it reports on: first by the
//! transport message id, then by the tracking id injected at send time.

use mailer_log_common::Result;
use mailer_log_storage::models::Email;
use mailer_log_storage::repository::EmailRepository;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Correlation keys carried in `message.headers`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationKeys {
    /// Message id without angle brackets
    pub message_id: Option<String>,
    pub tracking_id: Option<String>,
}

impl CorrelationKeys {
    pub fn from_event_data(event_data: &Value) -> Self {
        let headers = event_data.get("message").and_then(|m| m.get("headers"));

        Self {
            message_id: header(headers, "message-id")
                .map(|id| id.replace(['<', '>'], ""))
                .filter(|id| !id.is_empty()),
            tracking_id: header(headers, "x-mailer-log-tracking-id").map(str::to_string),
        }
    }
}

fn header<'a>(headers: Option<&'a Value>, name: &str) -> Option<&'a str> {
    headers?
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Find the email an event refers to.
///
/// `Ok(None)` is a correlation miss, not a failure.
pub async fn find_email(
    emails: &dyn EmailRepository,
    keys: &CorrelationKeys,
) -> Result<Option<Email>> {
    if let Some(message_id) = &keys.message_id {
        if let Some(email) = emails.find_by_message_id(message_id).await? {
            return Ok(Some(email));
        }
    }

    let Some(tracking_id) = &keys.tracking_id else {
        return Ok(None);
    };
    match Uuid::parse_str(tracking_id) {
        Ok(tracking_id) => emails.find_by_tracking_id(tracking_id).await,
        Err(_) => {
            debug!("Ignoring malformed tracking id {:?}", tracking_id);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailer_log_common::EmailStatus;
    use mailer_log_storage::models::CreateEmail;
    use mailer_log_storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn seeded(store: &MemoryStore, message_id: Option<&str>) -> Email {
        let mut input = CreateEmail::new(Uuid::new_v4(), EmailStatus::Sent);
        input.message_id = message_id.map(str::to_string);
        store.create(input).await.unwrap()
    }

    #[test]
    fn test_keys_strip_angle_brackets() {
        let data = json!({"message": {"headers": {
            "message-id": "<20241214.abc@mail.example.com>",
            "x-mailer-log-tracking-id": " 0193c1d2-0000-7000-8000-000000000000 "
        }}});
        let keys = CorrelationKeys::from_event_data(&data);
        assert_eq!(keys.message_id.as_deref(), Some("20241214.abc@mail.example.com"));
        assert_eq!(
            keys.tracking_id.as_deref(),
            Some("0193c1d2-0000-7000-8000-000000000000")
        );

        let keys = CorrelationKeys::from_event_data(&json!({"message": {"headers": {"message-id": "<>"}}}));
        assert_eq!(keys, CorrelationKeys::default());
    }

    #[tokio::test]
    async fn test_message_id_preferred() {
        let store = MemoryStore::new();
        let by_message = seeded(&store, Some("m1")).await;
        let by_tracking = seeded(&store, None).await;

        let keys = CorrelationKeys {
            message_id: Some("m1".to_string()),
            tracking_id: Some(by_tracking.tracking_id.to_string()),
        };
        let found = find_email(&store, &keys).await.unwrap().unwrap();
        assert_eq!(found.id, by_message.id);
    }

    #[tokio::test]
    async fn test_falls_back_to_tracking_id() {
        let store = MemoryStore::new();
        let email = seeded(&store, None).await;

        let keys = CorrelationKeys {
            message_id: Some("unknown@example.com".to_string()),
            tracking_id: Some(email.tracking_id.to_string()),
        };
        let found = find_email(&store, &keys).await.unwrap().unwrap();
        assert_eq!(found.id, email.id);
    }

    #[tokio::test]
    async fn test_miss_is_not_an_error() {
        let store = MemoryStore::new();
        seeded(&store, Some("m1")).await;

        let keys = CorrelationKeys {
            message_id: Some("m2".to_string()),
            tracking_id: Some("not-a-uuid".to_string()),
        };
        assert!(find_email(&store, &keys).await.unwrap().is_none());
        assert!(find_email(&store, &CorrelationKeys::default())
            .await
            .unwrap()
            .is_none());
    }
}
