//! Common types for MailerLog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for email records
pub type EmailId = Uuid;

/// Unique identifier for event records
pub type EventId = Uuid;

/// System-generated correlation id injected into every outbound message
pub type TrackingId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Header carrying the tracking id on outbound messages
pub const TRACKING_HEADER: &str = "X-Mailer-Log-Tracking-ID";

/// Reference to the entity accountable for an email (tenant, organization, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Kind of owning entity, e.g. "Organization"
    pub owner_type: String,
    /// Identifier of the owning entity within its kind
    pub owner_id: String,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
        }
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}

/// Page request (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Build a page request, clamping the page to at least 1 and the
    /// page size to `1..=max_per_page`
    pub fn clamped(page: Option<u32>, per_page: Option<u32>, default_per: u32, max_per: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per).clamp(1, max_per.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    /// Number of pages needed to hold `total` rows
    pub fn total_pages(&self, total: i64) -> i64 {
        let per = self.per_page as i64;
        (total + per - 1) / per
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamping() {
        let page = PageRequest::clamped(Some(0), Some(500), 25, 100);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 100);
        assert_eq!(page.offset(), 0);

        let page = PageRequest::clamped(Some(3), None, 25, 100);
        assert_eq!(page.per_page, 25);
        assert_eq!(page.offset(), 50);
    }

    #[test]
    fn test_total_pages() {
        let page = PageRequest::clamped(None, Some(10), 25, 100);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
    }

    #[test]
    fn test_owner_ref_display() {
        assert_eq!(OwnerRef::new("Organization", "42").to_string(), "Organization#42");
    }
}
