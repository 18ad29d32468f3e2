//! Authentication module

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use mailer_log_common::config::ApiConfig;
use mailer_log_core::WebhookIngestor;
use mailer_log_storage::repository::{EmailRepository, EventRepository};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub emails: Arc<dyn EmailRepository>,
    pub events: Arc<dyn EventRepository>,
    pub ingestor: Arc<WebhookIngestor>,
    pub api: ApiConfig,
}

/// Extract API key from request
pub fn extract_api_key(req: &Request) -> Option<&str> {
    // Check Authorization header
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim());
            }
        }
    }

    // Check X-API-Key header
    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str.trim());
        }
    }

    None
}

/// Hash a token for comparison
fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Compare a presented token with the configured admin token.
///
/// Both sides are hashed first so the comparison does not depend on where
/// the tokens differ.
fn verify_admin_token(presented: &str, configured: &str) -> bool {
    let presented = hash_token(presented);
    let configured = hash_token(configured);
    presented
        .iter()
        .zip(configured.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Admin token middleware
pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(configured) = state.api.admin_token.as_deref().filter(|t| !t.is_empty()) else {
        warn!("Admin API request rejected: no admin token configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = extract_api_key(&request).ok_or_else(|| {
        warn!("Missing API key in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    if !verify_admin_token(presented, configured) {
        warn!("Invalid API key in request to {}", request.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
