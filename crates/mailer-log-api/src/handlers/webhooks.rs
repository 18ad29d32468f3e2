//! Delivery provider webhook handlers

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    Form,
};
use mailer_log_core::webhook::expand_form_pairs;
use mailer_log_core::WebhookError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::AppState;

/// Receive one Mailgun event.
///
/// Only authentication failures are answered with an error status;
/// processing failures are acknowledged so the provider does not retry.
#[utoipa::path(
    post,
    path = "/webhooks/mailgun",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 401, description = "Missing or invalid signature")
    )
)]
pub async fn mailgun(State(state): State<Arc<AppState>>, request: Request) -> StatusCode {
    let document = read_document(request).await;

    match state.ingestor.ingest(&document).await {
        Ok(outcome) => {
            debug!(outcome = ?outcome, "Webhook handled");
            StatusCode::OK
        }
        Err(WebhookError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
        Err(e) => {
            // ingest reports everything else itself
            warn!("Unexpected webhook error: {}", e);
            StatusCode::OK
        }
    }
}

/// Decode a JSON or form-encoded body; anything unreadable becomes `{}`
async fn read_document(request: Request) -> Value {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        return match Form::<Vec<(String, String)>>::from_request(request, &()).await {
            Ok(Form(pairs)) => expand_form_pairs(pairs),
            Err(e) => {
                warn!("Unreadable form webhook body: {}", e);
                Value::Object(Default::default())
            }
        };
    }

    let body = match Bytes::from_request(request, &()).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Unreadable webhook body: {}", e);
            return Value::Object(Default::default());
        }
    };

    match serde_json::from_slice::<Value>(&body) {
        Ok(document @ Value::Object(_)) => document,
        _ => {
            warn!("Webhook body is not a JSON object");
            Value::Object(Default::default())
        }
    }
}
