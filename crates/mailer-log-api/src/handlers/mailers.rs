//! Mailer handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::auth::AppState;

#[derive(Debug, Serialize)]
pub struct MailerListResponse {
    pub mailers: Vec<String>,
}

/// Distinct mailer classes seen so far
pub async fn list_mailers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MailerListResponse>, StatusCode> {
    let mailers = state.emails.list_mailers().await.map_err(|e| {
        error!("Database error while listing mailers: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(MailerListResponse { mailers }))
}
