//! Database models

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use mailer_log_common::types::{EmailId, EventId, OwnerRef, TrackingId};
use mailer_log_common::{EmailStatus, EventType};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Email model, one row per outbound message
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Email {
    pub id: EmailId,
    pub tracking_id: TrackingId,
    pub message_id: Option<String>,
    pub mailer_class: Option<String>,
    pub mailer_action: Option<String>,
    pub from_address: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub headers: serde_json::Value,
    pub call_stack: Vec<String>,
    pub domain: Option<String>,
    pub accountable_type: Option<String>,
    pub accountable_id: Option<String>,
    pub status: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Email {
    /// Get status enum
    pub fn status_enum(&self) -> Option<EmailStatus> {
        self.status.parse().ok()
    }

    /// Accountable owner, when one was resolved at send time
    pub fn owner(&self) -> Option<OwnerRef> {
        match (&self.accountable_type, &self.accountable_id) {
            (Some(owner_type), Some(owner_id)) => Some(OwnerRef::new(owner_type, owner_id)),
            _ => None,
        }
    }

    /// Every distinct recipient across to/cc/bcc, in order of appearance
    pub fn recipients(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        for address in self
            .to_addresses
            .iter()
            .chain(&self.cc_addresses)
            .chain(&self.bcc_addresses)
        {
            if !all.contains(address) {
                all.push(address.clone());
            }
        }
        all
    }
}

/// Create email input
#[derive(Debug, Clone)]
pub struct CreateEmail {
    pub tracking_id: TrackingId,
    pub message_id: Option<String>,
    pub mailer_class: Option<String>,
    pub mailer_action: Option<String>,
    pub from_address: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub headers: serde_json::Value,
    pub call_stack: Vec<String>,
    pub domain: Option<String>,
    pub owner: Option<OwnerRef>,
    pub status: EmailStatus,
}

impl CreateEmail {
    /// Minimal input carrying only the identity of a message
    pub fn new(tracking_id: TrackingId, status: EmailStatus) -> Self {
        Self {
            tracking_id,
            message_id: None,
            mailer_class: None,
            mailer_action: None,
            from_address: None,
            to_addresses: Vec::new(),
            cc_addresses: Vec::new(),
            bcc_addresses: Vec::new(),
            subject: None,
            html_body: None,
            text_body: None,
            headers: serde_json::json!({}),
            call_stack: Vec::new(),
            domain: None,
            owner: None,
            status,
        }
    }
}

/// Event model, one row per accepted webhook occurrence
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub email_id: EmailId,
    pub event_type: String,
    pub provider_event_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub recipient: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub client_name: Option<String>,
    pub client_os: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub url: Option<String>,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Get event type enum
    pub fn event_type_enum(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }
}

/// Create event input
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub email_id: EmailId,
    pub event_type: EventType,
    pub provider_event_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub recipient: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub client_name: Option<String>,
    pub client_os: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub url: Option<String>,
    pub raw_payload: serde_json::Value,
}

/// Filters for email listings
#[derive(Debug, Clone, Default)]
pub struct EmailFilter {
    /// Case-insensitive substring of any To address
    pub recipient: Option<String>,
    /// Case-insensitive substring of the sender
    pub sender: Option<String>,
    /// Case-insensitive substring of the subject
    pub subject_search: Option<String>,
    /// Exact mailer class
    pub mailer: Option<String>,
    pub status: Option<EmailStatus>,
    /// Inclusive first day (UTC)
    pub date_from: Option<NaiveDate>,
    /// Inclusive last day (UTC)
    pub date_to: Option<NaiveDate>,
}

impl EmailFilter {
    /// Lower bound on `created_at`
    pub fn created_from(&self) -> Option<DateTime<Utc>> {
        self.date_from
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
    }

    /// Exclusive upper bound on `created_at`.
    ///
    /// `None` when `date_to` is the last representable day, which bounds nothing.
    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        self.date_to?
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc())
    }

    /// Evaluate the filter in memory, mirroring the SQL used by the database repository
    pub fn matches(&self, email: &Email) -> bool {
        if let Some(needle) = &self.recipient {
            let haystack = email.to_addresses.join(",");
            if !contains_ignore_case(&haystack, needle) {
                return false;
            }
        }
        if let Some(needle) = &self.sender {
            if !email
                .from_address
                .as_deref()
                .is_some_and(|from| contains_ignore_case(from, needle))
            {
                return false;
            }
        }
        if let Some(needle) = &self.subject_search {
            if !email
                .subject
                .as_deref()
                .is_some_and(|subject| contains_ignore_case(subject, needle))
            {
                return false;
            }
        }
        if let Some(mailer) = &self.mailer {
            if email.mailer_class.as_deref() != Some(mailer.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if email.status != status.as_str() {
                return false;
            }
        }
        if let Some(from) = self.created_from() {
            if email.created_at < from {
                return false;
            }
        }
        if let Some(before) = self.created_before() {
            if email.created_at >= before {
                return false;
            }
        }
        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_email() -> Email {
        let now = Utc::now();
        Email {
            id: Uuid::now_v7(),
            tracking_id: Uuid::new_v4(),
            message_id: Some("m1@example.com".to_string()),
            mailer_class: Some("UserMailer".to_string()),
            mailer_action: Some("welcome".to_string()),
            from_address: Some("noreply@example.com".to_string()),
            to_addresses: vec!["Alice@Example.com".to_string()],
            cc_addresses: vec!["bob@example.com".to_string()],
            bcc_addresses: vec!["alice@example.com".to_string(), "bob@example.com".to_string()],
            subject: Some("Welcome aboard".to_string()),
            html_body: None,
            text_body: None,
            headers: serde_json::json!({}),
            call_stack: Vec::new(),
            domain: None,
            accountable_type: None,
            accountable_id: None,
            status: "sent".to_string(),
            delivered_at: None,
            opened_at: None,
            clicked_at: None,
            bounced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_recipients_are_unique() {
        let email = sample_email();
        assert_eq!(
            email.recipients(),
            vec!["Alice@Example.com", "bob@example.com", "alice@example.com"]
        );
    }

    #[test]
    fn test_filter_substring_matching() {
        let email = sample_email();
        let filter = EmailFilter {
            recipient: Some("alice@".to_string()),
            subject_search: Some("WELCOME".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&email));

        let filter = EmailFilter {
            sender: Some("billing".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&email));
    }

    #[test]
    fn test_filter_status_and_mailer() {
        let email = sample_email();
        let filter = EmailFilter {
            status: Some(EmailStatus::Sent),
            mailer: Some("UserMailer".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&email));

        let filter = EmailFilter {
            status: Some(EmailStatus::Bounced),
            ..Default::default()
        };
        assert!(!filter.matches(&email));
    }

    #[test]
    fn test_filter_date_range_is_inclusive() {
        let mut email = sample_email();
        email.created_at = "2024-12-14T23:59:59Z".parse().unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 12, 14).unwrap();
        let filter = EmailFilter {
            date_from: Some(day),
            date_to: Some(day),
            ..Default::default()
        };
        assert!(filter.matches(&email));

        let filter = EmailFilter {
            date_from: day.succ_opt(),
            ..Default::default()
        };
        assert!(!filter.matches(&email));
    }

    #[test]
    fn test_date_to_at_calendar_end_has_no_upper_bound() {
        let filter = EmailFilter {
            date_to: Some(NaiveDate::MAX),
            ..Default::default()
        };
        assert_eq!(filter.created_before(), None);
        assert!(filter.matches(&sample_email()));

        let day = NaiveDate::from_ymd_opt(2024, 12, 14).unwrap();
        let filter = EmailFilter {
            date_to: Some(day),
            ..Default::default()
        };
        assert_eq!(
            filter.created_before(),
            Some("2024-12-15T00:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn test_owner() {
        let mut email = sample_email();
        assert!(email.owner().is_none());
        email.accountable_type = Some("Organization".to_string());
        email.accountable_id = Some("7".to_string());
        assert_eq!(email.owner(), Some(OwnerRef::new("Organization", "7")));
    }
}
