//! Webhook ingestion pipeline
//!
//! verify signature -> suppress duplicates -> normalize -> correlate ->
//! store event -> apply status transition

pub mod correlate;
pub mod dedupe;
pub mod form;
pub mod ingest;
pub mod normalize;
pub mod signature;
pub mod transition;

pub use correlate::{find_email, CorrelationKeys};
pub use dedupe::{IdempotencyCache, MemoryIdempotencyCache};
pub use form::expand_form_pairs;
pub use ingest::{ErrorReporter, IngestOutcome, TracingReporter, WebhookIngestor};
pub use normalize::{normalize, NormalizedEvent};
pub use signature::{compute_signature, SignatureBlock, SignatureVerifier};
pub use transition::{apply_event, TransitionResult};

use thiserror::Error;

/// Webhook pipeline errors
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Unauthorized webhook: {0}")]
    Unauthorized(String),

    #[error("Webhook event has no event type")]
    MissingEventType,

    #[error("Webhook processing failed: {0}")]
    Processing(#[from] mailer_log_common::Error),
}
