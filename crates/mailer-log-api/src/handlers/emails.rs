//! Email log handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use mailer_log_common::types::PageRequest;
use mailer_log_common::EmailStatus;
use mailer_log_storage::models::{Email, EmailFilter, Event};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::AppState;

/// List emails query parameters.
///
/// Everything arrives as text so that blank values can be ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ListEmailsQuery {
    pub recipient: Option<String>,
    pub sender: Option<String>,
    pub subject_search: Option<String>,
    pub mailer: Option<String>,
    pub status: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub date_to: Option<String>,
    pub page: Option<String>,
    pub per: Option<String>,
}

impl ListEmailsQuery {
    fn filter(&self) -> Result<EmailFilter, String> {
        let status = match present(&self.status) {
            Some(raw) => Some(raw.parse::<EmailStatus>().map_err(|e| e.to_string())?),
            None => None,
        };

        Ok(EmailFilter {
            recipient: present(&self.recipient).map(str::to_string),
            sender: present(&self.sender).map(str::to_string),
            subject_search: present(&self.subject_search).map(str::to_string),
            mailer: present(&self.mailer).map(str::to_string),
            status,
            date_from: parse_date(&self.date_from, "date_from")?,
            date_to: parse_date(&self.date_to, "date_to")?,
        })
    }

    fn page(&self, default_per: u32, max_per: u32) -> PageRequest {
        let number = |raw: &Option<String>| present(raw).and_then(|v| v.parse::<u32>().ok());
        PageRequest::clamped(number(&self.page), number(&self.per), default_per, max_per)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Four-digit years only; wider dates do not fit a timestamp column
fn parse_date(value: &Option<String>, name: &str) -> Result<Option<NaiveDate>, String> {
    present(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .filter(|date| (1..=9999).contains(&date.year()))
                .ok_or_else(|| format!("Invalid {}: {}", name, raw))
        })
        .transpose()
}

/// Email summary (for list view)
#[derive(Debug, Serialize)]
pub struct EmailSummary {
    pub id: Uuid,
    pub tracking_id: Uuid,
    pub message_id: Option<String>,
    pub mailer_class: Option<String>,
    pub mailer_action: Option<String>,
    pub from_address: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
    pub subject: Option<String>,
    pub domain: Option<String>,
    pub status: String,
    pub delivered_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub bounced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Email> for EmailSummary {
    fn from(email: &Email) -> Self {
        Self {
            id: email.id,
            tracking_id: email.tracking_id,
            message_id: email.message_id.clone(),
            mailer_class: email.mailer_class.clone(),
            mailer_action: email.mailer_action.clone(),
            from_address: email.from_address.clone(),
            to_addresses: email.to_addresses.clone(),
            cc_addresses: email.cc_addresses.clone(),
            bcc_addresses: email.bcc_addresses.clone(),
            subject: email.subject.clone(),
            domain: email.domain.clone(),
            status: email.status.clone(),
            delivered_at: email.delivered_at,
            opened_at: email.opened_at,
            clicked_at: email.clicked_at,
            bounced_at: email.bounced_at,
            created_at: email.created_at,
            updated_at: email.updated_at,
        }
    }
}

/// Full email with content and delivery events
#[derive(Debug, Serialize)]
pub struct EmailDetail {
    #[serde(flatten)]
    pub summary: EmailSummary,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub headers: Value,
    pub call_stack: Vec<String>,
    pub events: Vec<EventView>,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: Uuid,
    pub event_type: String,
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
    pub raw_payload: Value,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            occurred_at: event.occurred_at,
            recipient: event.recipient,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            device_type: event.device_type,
            client_name: event.client_name,
            client_os: event.client_os,
            country: event.country,
            region: event.region,
            city: event.city,
            url: event.url,
            raw_payload: event.raw_payload,
        }
    }
}

/// Email list response
#[derive(Debug, Serialize)]
pub struct EmailListResponse {
    pub emails: Vec<EmailSummary>,
    pub total_count: i64,
    pub total_pages: i64,
    pub current_page: u32,
}

#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub email: EmailDetail,
}

/// List emails, newest first
pub async fn list_emails(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListEmailsQuery>,
) -> Result<Json<EmailListResponse>, StatusCode> {
    let filter = query.filter().map_err(|e| {
        warn!("Rejected email list query: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    let page = query.page(state.api.per_page, state.api.max_per_page);

    let result = state.emails.list(&filter, page).await.map_err(|e| {
        error!("Database error while listing emails: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(EmailListResponse {
        emails: result.items.iter().map(EmailSummary::from).collect(),
        total_count: result.total_count,
        total_pages: page.total_pages(result.total_count),
        current_page: page.page,
    }))
}

/// Get a single email with its events
pub async fn get_email(
    State(state): State<Arc<AppState>>,
    Path(email_id): Path<Uuid>,
) -> Result<Json<EmailResponse>, StatusCode> {
    let email = state
        .emails
        .get(email_id)
        .await
        .map_err(|e| {
            error!("Database error while fetching email: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            warn!("Email {} not found", email_id);
            StatusCode::NOT_FOUND
        })?;

    let events = state.events.list_for_email(email.id).await.map_err(|e| {
        error!("Database error while listing events: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let summary = EmailSummary::from(&email);
    Ok(Json(EmailResponse {
        email: EmailDetail {
            summary,
            html_body: email.html_body,
            text_body: email.text_body,
            headers: email.headers,
            call_stack: email.call_stack,
            events: events.into_iter().map(Into::into).collect(),
        },
    }))
}
