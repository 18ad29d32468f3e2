//! MailerLog Core - Delivery tracking pipeline
//!
//! This crate provides webhook ingestion and event correlation, send-side
//! capture of outbound messages, and retention cleanup.

pub mod capture;
pub mod retention;
pub mod webhook;

pub use capture::{MailTransport, MailerLabels, OwnerResolver, SendContext, TrackingTransport};
pub use retention::RetentionWorker;
pub use webhook::{IngestOutcome, WebhookError, WebhookIngestor};
