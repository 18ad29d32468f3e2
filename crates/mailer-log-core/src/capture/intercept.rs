//! Outbound message interception
//!
//! Tags every outbound message with a fresh tracking id header and
//! snapshots its content for the email record.

use super::context::{EmailCapture, SendContext};
use lettre::address::Envelope;
use mail_parser::{Address, MessageParser};
use mailer_log_common::config::CaptureConfig;
use mailer_log_common::types::TRACKING_HEADER;
use mailer_log_common::EmailStatus;
use mailer_log_storage::models::CreateEmail;
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use tracing::{debug, warn};
use uuid::Uuid;

/// Labels describing where a message comes from
#[derive(Debug, Clone, Default)]
pub struct MailerLabels {
    /// Sending component, e.g. "UserMailer"
    pub mailer_class: Option<String>,
    /// Operation within the component, e.g. "welcome"
    pub mailer_action: Option<String>,
    pub domain: Option<String>,
    /// Caller-supplied origin; captured from the current stack when empty
    pub call_stack: Vec<String>,
}

/// Prepend the tracking header to `raw` and store a capture in `ctx`.
///
/// Returns the message to hand to the transport. A message that cannot be
/// parsed is still tagged and captured with envelope data only.
pub fn intercept(
    raw: &[u8],
    envelope: &Envelope,
    labels: &MailerLabels,
    ctx: &mut SendContext,
    config: &CaptureConfig,
) -> Vec<u8> {
    let tracking_id = Uuid::new_v4();

    let mut tagged = format!("{}: {}\r\n", TRACKING_HEADER, tracking_id).into_bytes();
    tagged.extend_from_slice(raw);

    let mut email = CreateEmail::new(tracking_id, EmailStatus::Pending);
    email.mailer_class = labels.mailer_class.clone();
    email.mailer_action = labels.mailer_action.clone();
    email.domain = labels.domain.clone();
    email.from_address = envelope.from().map(|a| a.to_string());
    email.call_stack = if !labels.call_stack.is_empty() {
        labels.call_stack.clone()
    } else if config.capture_call_stack {
        call_stack(config.call_stack_depth)
    } else {
        Vec::new()
    };

    match MessageParser::default().parse(tagged.as_slice()) {
        Some(message) => {
            if let Some(from) = message.from().and_then(|a| addresses(a).into_iter().next()) {
                email.from_address = Some(from);
            }
            email.to_addresses = message.to().map(addresses).unwrap_or_default();
            email.cc_addresses = message.cc().map(addresses).unwrap_or_default();
            email.subject = message.subject().map(str::to_string);
            email.message_id = message.message_id().map(str::to_string);
            email.html_body = message.body_html(0).map(|b| b.into_owned());
            email.text_body = message.body_text(0).map(|b| b.into_owned());
            email.headers = headers(&message, &tagged);
        }
        None => {
            warn!(tracking_id = %tracking_id, "Failed to parse outbound message");
            email.to_addresses = envelope.to().iter().map(|a| a.to_string()).collect();
        }
    }

    email.bcc_addresses = blind_recipients(envelope, &email);

    debug!(tracking_id = %tracking_id, "Captured outbound message");
    ctx.begin(EmailCapture { tracking_id, email });
    tagged
}

fn addresses(address: &Address<'_>) -> Vec<String> {
    let list: Vec<&mail_parser::Addr<'_>> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    list.into_iter()
        .filter_map(|addr| addr.address.as_deref())
        .map(str::to_string)
        .collect()
}

/// Envelope recipients not listed in To or Cc
fn blind_recipients(envelope: &Envelope, email: &CreateEmail) -> Vec<String> {
    let visible: Vec<String> = email
        .to_addresses
        .iter()
        .chain(&email.cc_addresses)
        .map(|a| a.to_lowercase())
        .collect();

    let mut bcc: Vec<String> = Vec::new();
    for recipient in envelope.to() {
        let recipient = recipient.to_string();
        let lowered = recipient.to_lowercase();
        if !visible.contains(&lowered) && !bcc.iter().any(|b| b.to_lowercase() == lowered) {
            bcc.push(recipient);
        }
    }
    bcc
}

/// Raw header values by name; repeated headers become arrays
fn headers(message: &mail_parser::Message<'_>, raw: &[u8]) -> Value {
    let mut map = Map::new();
    for header in message.headers() {
        let Some(bytes) = raw.get(header.offset_start as usize..header.offset_end as usize) else {
            continue;
        };
        let value = Value::String(String::from_utf8_lossy(bytes).trim().to_string());
        let name = header.name().to_string();

        match map.get_mut(&name) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(name, value);
            }
        }
    }
    Value::Object(map)
}

/// Symbol names of the calling frames, innermost first
fn call_stack(depth: usize) -> Vec<String> {
    let trace = Backtrace::force_capture().to_string();
    trace
        .lines()
        .filter_map(|line| {
            let (index, symbol) = line.trim().split_once(": ")?;
            index.parse::<usize>().ok()?;
            Some(symbol.to_string())
        })
        .filter(|symbol| {
            !["std::", "core::", "tokio::", "backtrace", "mailer_log_core::capture"]
                .iter()
                .any(|prefix| symbol.starts_with(prefix) || symbol.contains("::backtrace"))
        })
        .take(depth)
        .collect()
}
