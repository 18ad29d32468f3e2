//! Email lifecycle vocabulary
//!
//! Statuses an email moves through, the event types a delivery provider
//! reports, and the transition each event type applies to an email.
//! Stores evaluate [`StatusTransition::guard`] at write time so that the
//! conditional update is a single atomic operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
}

impl EmailStatus {
    pub const ALL: [EmailStatus; 7] = [
        EmailStatus::Pending,
        EmailStatus::Sent,
        EmailStatus::Delivered,
        EmailStatus::Opened,
        EmailStatus::Clicked,
        EmailStatus::Bounced,
        EmailStatus::Complained,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sent => "sent",
            EmailStatus::Delivered => "delivered",
            EmailStatus::Opened => "opened",
            EmailStatus::Clicked => "clicked",
            EmailStatus::Bounced => "bounced",
            EmailStatus::Complained => "complained",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("Unknown email status: {}", s)))
    }
}

/// Normalized delivery event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Accepted,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Failed,
    Dropped,
    Complained,
    Unsubscribed,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::Accepted,
        EventType::Delivered,
        EventType::Opened,
        EventType::Clicked,
        EventType::Bounced,
        EventType::Failed,
        EventType::Dropped,
        EventType::Complained,
        EventType::Unsubscribed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Accepted => "accepted",
            EventType::Delivered => "delivered",
            EventType::Opened => "opened",
            EventType::Clicked => "clicked",
            EventType::Bounced => "bounced",
            EventType::Failed => "failed",
            EventType::Dropped => "dropped",
            EventType::Complained => "complained",
            EventType::Unsubscribed => "unsubscribed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("Unknown event type: {}", s)))
    }
}

/// Timestamp column set alongside a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStamp {
    DeliveredAt,
    OpenedAt,
    ClickedAt,
    BouncedAt,
}

impl TransitionStamp {
    pub fn column(&self) -> &'static str {
        match self {
            TransitionStamp::DeliveredAt => "delivered_at",
            TransitionStamp::OpenedAt => "opened_at",
            TransitionStamp::ClickedAt => "clicked_at",
            TransitionStamp::BouncedAt => "bounced_at",
        }
    }
}

/// Condition that must hold at write time for a transition to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionGuard {
    Always,
    /// Neither `opened_at` nor `clicked_at` is set
    NotYetOpened,
    /// `clicked_at` is not set
    NotYetClicked,
}

impl TransitionGuard {
    /// Evaluate the guard against the funnel timestamps of an email
    pub fn holds(
        &self,
        opened_at: Option<DateTime<Utc>>,
        clicked_at: Option<DateTime<Utc>>,
    ) -> bool {
        match self {
            TransitionGuard::Always => true,
            TransitionGuard::NotYetOpened => opened_at.is_none() && clicked_at.is_none(),
            TransitionGuard::NotYetClicked => clicked_at.is_none(),
        }
    }

    /// SQL predicate equivalent to [`TransitionGuard::holds`]
    pub fn sql_predicate(&self) -> &'static str {
        match self {
            TransitionGuard::Always => "TRUE",
            TransitionGuard::NotYetOpened => "opened_at IS NULL AND clicked_at IS NULL",
            TransitionGuard::NotYetClicked => "clicked_at IS NULL",
        }
    }
}

/// Status mutation applied to an email when an event is accepted.
///
/// Funnel events (delivered, opened) never regress a more advanced stage;
/// clicks, bounces and complaints override any current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub status: EmailStatus,
    pub stamp: Option<TransitionStamp>,
    pub guard: TransitionGuard,
}

impl StatusTransition {
    /// Transition for a normalized event type, `None` when the event does
    /// not affect the status
    pub fn for_event(event_type: EventType) -> Option<Self> {
        let (status, stamp, guard) = match event_type {
            EventType::Delivered => (
                EmailStatus::Delivered,
                Some(TransitionStamp::DeliveredAt),
                TransitionGuard::NotYetOpened,
            ),
            EventType::Opened => (
                EmailStatus::Opened,
                Some(TransitionStamp::OpenedAt),
                TransitionGuard::NotYetClicked,
            ),
            EventType::Clicked => (
                EmailStatus::Clicked,
                Some(TransitionStamp::ClickedAt),
                TransitionGuard::Always,
            ),
            EventType::Bounced | EventType::Failed | EventType::Dropped => (
                EmailStatus::Bounced,
                Some(TransitionStamp::BouncedAt),
                TransitionGuard::Always,
            ),
            EventType::Complained => (EmailStatus::Complained, None, TransitionGuard::Always),
            EventType::Accepted | EventType::Unsubscribed => return None,
        };

        Some(Self {
            status,
            stamp,
            guard,
        })
    }
}
