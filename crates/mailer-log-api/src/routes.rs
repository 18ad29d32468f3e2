//! API routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{admin_auth_middleware, AppState};
use crate::handlers::{emails, health, mailers, webhooks};
use crate::openapi::create_openapi_routes;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/detailed", get(health::health_detailed))
        .with_state(state.clone());

    // Provider callbacks authenticate with their own signature
    let webhook_routes = Router::new()
        .route("/mailgun", post(webhooks::mailgun))
        .with_state(state.clone());

    let email_routes = Router::new()
        .route("/", get(emails::list_emails))
        .route("/:id", get(emails::get_email));

    let mailer_routes = Router::new().route("/", get(mailers::list_mailers));

    // API v1 routes with admin authentication
    let api_v1 = Router::new()
        .nest("/emails", email_routes)
        .nest("/mailers", mailer_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .nest("/health", health_routes)
        .nest("/webhooks", webhook_routes)
        .nest("/api/v1", api_v1)
        .merge(create_openapi_routes())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use mailer_log_common::config::{ApiConfig, WebhookConfig};
    use mailer_log_common::EmailStatus;
    use mailer_log_core::webhook::compute_signature;
    use mailer_log_core::WebhookIngestor;
    use mailer_log_storage::models::{CreateEmail, Email};
    use mailer_log_storage::repository::{EmailRepository, EventRepository};
    use mailer_log_storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use uuid::Uuid;

    const SIGNING_KEY: &str = "webhook-key";
    const ADMIN_TOKEN: &str = "admin-token";

    fn server_with(store: &MemoryStore, signing_key: Option<&str>) -> TestServer {
        let webhook = WebhookConfig {
            signing_key: signing_key.map(str::to_string),
            ..Default::default()
        };
        let state = AppState {
            emails: Arc::new(store.clone()),
            events: Arc::new(store.clone()),
            ingestor: Arc::new(WebhookIngestor::from_config(
                &webhook,
                Arc::new(store.clone()),
                Arc::new(store.clone()),
            )),
            api: ApiConfig {
                admin_token: Some(ADMIN_TOKEN.to_string()),
                ..Default::default()
            },
        };
        TestServer::new(create_router(state)).unwrap()
    }

    fn server(store: &MemoryStore) -> TestServer {
        server_with(store, Some(SIGNING_KEY))
    }

    fn api_key() -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static(ADMIN_TOKEN),
        )
    }

    fn signed(event_data: Value) -> Value {
        json!({
            "signature": {
                "timestamp": "1700000000",
                "token": "abc",
                "signature": compute_signature(SIGNING_KEY, "1700000000", "abc").unwrap(),
            },
            "event-data": event_data,
        })
    }

    async fn seed(store: &MemoryStore, message_id: &str, mailer: &str, to: &str) -> Email {
        let mut input = CreateEmail::new(Uuid::new_v4(), EmailStatus::Sent);
        input.message_id = Some(message_id.to_string());
        input.mailer_class = Some(mailer.to_string());
        input.to_addresses = vec![to.to_string()];
        input.subject = Some(format!("Hello {}", to));
        input.html_body = Some("<p>Hello</p>".to_string());
        store.create(input).await.unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let store = MemoryStore::new();
        let server = server(&store);

        server.get("/health").await.assert_status_ok();
        server.get("/health/ready").await.assert_status_ok();

        let detailed: Value = server.get("/health/detailed").await.json();
        assert_eq!(detailed["status"], "healthy");
        assert_eq!(detailed["checks"]["webhook_signing"]["status"], "configured");
    }

    #[tokio::test]
    async fn test_health_reports_missing_signing_key() {
        let store = MemoryStore::new();
        let detailed: Value = server_with(&store, None)
            .get("/health/detailed")
            .await
            .json();
        assert_eq!(detailed["status"], "degraded");
    }

    #[tokio::test]
    async fn test_webhook_records_bounce() {
        let store = MemoryStore::new();
        let email = seed(&store, "m1", "UserMailer", "alice@example.com").await;
        let server = server(&store);

        let body = signed(json!({
            "id": "evt-1",
            "event": "permanent_fail",
            "timestamp": 1700000100.5,
            "recipient": "alice@example.com",
            "message": {"headers": {"message-id": "<m1>"}},
        }));
        server
            .post("/webhooks/mailgun")
            .json(&body)
            .await
            .assert_status_ok();
        // replay
        server
            .post("/webhooks/mailgun")
            .json(&body)
            .await
            .assert_status_ok();

        let stored = store.get(email.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "bounced");
        assert!(stored.bounced_at.is_some());
        assert_eq!(store.count_for_email(email.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let store = MemoryStore::new();
        seed(&store, "m1", "UserMailer", "alice@example.com").await;
        let server = server(&store);

        let mut body = signed(json!({
            "id": "evt-1",
            "event": "delivered",
            "message": {"headers": {"message-id": "m1"}},
        }));
        body["signature"]["token"] = json!("abd");

        server
            .post("/webhooks/mailgun")
            .json(&body)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/webhooks/mailgun")
            .text("not json")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_webhook_without_signing_key_rejects_everything() {
        let store = MemoryStore::new();
        seed(&store, "m1", "UserMailer", "alice@example.com").await;
        let server = server_with(&store, None);

        server
            .post("/webhooks/mailgun")
            .json(&signed(json!({"id": "evt-1", "event": "delivered"})))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_unknown_email_is_acknowledged() {
        let store = MemoryStore::new();
        let server = server(&store);

        server
            .post("/webhooks/mailgun")
            .json(&signed(json!({
                "id": "evt-9",
                "event": "delivered",
                "message": {"headers": {"message-id": "nobody"}},
            })))
            .await
            .assert_status_ok();
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_webhook_form_body() {
        let store = MemoryStore::new();
        let email = seed(&store, "m2", "UserMailer", "bob@example.com").await;
        let server = server(&store);

        let signature = compute_signature(SIGNING_KEY, "1700000000", "tok").unwrap();
        let form = [
            ("signature[timestamp]", "1700000000"),
            ("signature[token]", "tok"),
            ("signature[signature]", signature.as_str()),
            ("event-data[id]", "evt-form"),
            ("event-data[event]", "delivered"),
            ("event-data[message][headers][message-id]", "m2"),
        ];
        server
            .post("/webhooks/mailgun")
            .form(&form)
            .await
            .assert_status_ok();

        let stored = store.get(email.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "delivered");
    }

    #[tokio::test]
    async fn test_admin_api_requires_token() {
        let store = MemoryStore::new();
        let server = server(&store);

        server
            .get("/api/v1/emails")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/v1/mailers")
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_static("Bearer wrong"),
            )
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/v1/mailers")
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_static("Bearer admin-token"),
            )
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_list_emails_filters_and_pages() {
        let store = MemoryStore::new();
        seed(&store, "m1", "UserMailer", "alice@example.com").await;
        seed(&store, "m2", "UserMailer", "bob@example.com").await;
        let old = seed(&store, "m3", "BillingMailer", "alice@corp.example").await;
        store
            .set_created_at(old.id, Utc::now() - Duration::days(10))
            .await
            .unwrap();
        let server = server(&store);
        let (name, value) = api_key();

        let body: Value = server
            .get("/api/v1/emails")
            .add_query_param("recipient", "ALICE")
            .add_query_param("per", "1")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body["total_count"], 2);
        assert_eq!(body["total_pages"], 2);
        assert_eq!(body["current_page"], 1);
        assert_eq!(body["emails"][0]["message_id"], "m1");
        assert!(body["emails"][0].get("html_body").is_none());

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let body: Value = server
            .get("/api/v1/emails")
            .add_query_param("date_from", &today)
            .add_query_param("mailer", "")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body["total_count"], 2);

        server
            .get("/api/v1/emails")
            .add_query_param("status", "lost")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get("/api/v1/emails")
            .add_query_param("date_to", "+262142-12-31")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_show_email_with_events() {
        let store = MemoryStore::new();
        let email = seed(&store, "m1", "UserMailer", "alice@example.com").await;
        let server = server(&store);
        let (name, value) = api_key();

        server
            .post("/webhooks/mailgun")
            .json(&signed(json!({
                "id": "evt-open",
                "event": "opened",
                "message": {"headers": {"message-id": "m1"}},
                "client-info": {"client-name": "Thunderbird"},
            })))
            .await
            .assert_status_ok();

        let body: Value = server
            .get(&format!("/api/v1/emails/{}", email.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body["email"]["status"], "opened");
        assert_eq!(body["email"]["html_body"], "<p>Hello</p>");
        assert_eq!(body["email"]["events"][0]["event_type"], "opened");
        assert_eq!(body["email"]["events"][0]["client_name"], "Thunderbird");

        server
            .get(&format!("/api/v1/emails/{}", Uuid::new_v4()))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_mailers() {
        let store = MemoryStore::new();
        seed(&store, "m1", "UserMailer", "alice@example.com").await;
        seed(&store, "m2", "BillingMailer", "bob@example.com").await;
        seed(&store, "m3", "UserMailer", "carol@example.com").await;
        let server = server(&store);
        let (name, value) = api_key();

        let body: Value = server
            .get("/api/v1/mailers")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(body, json!({"mailers": ["BillingMailer", "UserMailer"]}));
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let store = MemoryStore::new();
        let spec: Value = server(&store).get("/openapi.json").await.json();
        assert_eq!(spec["info"]["title"], "MailerLog API");
    }
}
