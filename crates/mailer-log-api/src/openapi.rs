//! OpenAPI documentation
//!
//! Health and webhook operations are described by their `utoipa`
//! annotations; the admin API is documented by hand and merged in.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tracing::error;
use utoipa::OpenApi;

use crate::handlers::{health, webhooks};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        health::health_detailed,
        webhooks::mailgun,
    ),
    components(schemas(
        health::HealthResponse,
        health::DetailedHealthResponse,
        health::HealthChecks,
        health::ComponentHealth,
    ))
)]
struct AnnotatedApi;

/// Create OpenAPI routes
pub fn create_openapi_routes() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

async fn openapi_json() -> impl IntoResponse {
    Json(get_openapi_spec())
}

async fn swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

/// Full document: annotated operations plus the admin API
pub fn get_openapi_spec() -> Value {
    let annotated = serde_json::to_value(AnnotatedApi::openapi()).unwrap_or_else(|e| {
        error!("Failed to serialize annotated OpenAPI document: {}", e);
        Value::Null
    });

    let mut spec = admin_spec();
    merge_object(&mut spec, "paths", annotated.get("paths"));
    if let Some(schemas) = annotated.pointer("/components/schemas") {
        if let Some(components) = spec.get_mut("components") {
            merge_object(components, "schemas", Some(schemas));
        }
    }
    spec
}

fn merge_object(target: &mut Value, key: &str, source: Option<&Value>) {
    let Some(Value::Object(source)) = source else {
        return;
    };
    let Some(target) = target.as_object_mut() else {
        return;
    };
    let entry = target
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(entry) = entry {
        for (name, value) in source {
            entry.insert(name.clone(), value.clone());
        }
    }
}

fn admin_spec() -> Value {
    let secured = json!([{"api_key": []}, {"bearer": []}]);
    let unauthorized = json!({"description": "Missing or invalid admin token"});

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "MailerLog API",
            "description": "Outbound email log and delivery tracking\n\n## Authentication\n\nAdmin endpoints under `/api/v1` require the configured admin token.\n\n- **Header**: `X-API-Key: <admin-token>`\n- **Bearer**: `Authorization: Bearer <admin-token>`\n\nThe webhook endpoint is authenticated by the provider's HMAC signature.",
            "version": env!("CARGO_PKG_VERSION")
        },
        "tags": [
            {"name": "health", "description": "Health check endpoints"},
            {"name": "webhooks", "description": "Delivery provider callbacks"},
            {"name": "emails", "description": "Logged outbound emails"},
            {"name": "mailers", "description": "Sending components"}
        ],
        "paths": {
            "/api/v1/emails": {
                "get": {
                    "tags": ["emails"],
                    "summary": "List emails, newest first",
                    "operationId": "listEmails",
                    "security": secured.clone(),
                    "parameters": [
                        {"name": "recipient", "in": "query", "schema": {"type": "string"}, "description": "Substring of a To address (case-insensitive)"},
                        {"name": "sender", "in": "query", "schema": {"type": "string"}, "description": "Substring of the sender (case-insensitive)"},
                        {"name": "subject_search", "in": "query", "schema": {"type": "string"}, "description": "Substring of the subject (case-insensitive)"},
                        {"name": "mailer", "in": "query", "schema": {"type": "string"}, "description": "Exact mailer class"},
                        {"name": "status", "in": "query", "schema": {"$ref": "#/components/schemas/EmailStatus"}},
                        {"name": "date_from", "in": "query", "schema": {"type": "string", "format": "date"}, "description": "First day, inclusive (UTC)"},
                        {"name": "date_to", "in": "query", "schema": {"type": "string", "format": "date"}, "description": "Last day, inclusive (UTC)"},
                        {"name": "page", "in": "query", "schema": {"type": "integer", "minimum": 1, "default": 1}},
                        {"name": "per", "in": "query", "schema": {"type": "integer", "minimum": 1}}
                    ],
                    "responses": {
                        "200": {
                            "description": "One page of emails",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/EmailListResponse"}
                                }
                            }
                        },
                        "400": {"description": "Invalid status or date filter"},
                        "401": unauthorized.clone()
                    }
                }
            },
            "/api/v1/emails/{id}": {
                "get": {
                    "tags": ["emails"],
                    "summary": "Get an email with its events",
                    "operationId": "getEmail",
                    "security": secured.clone(),
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "Email detail",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {"email": {"$ref": "#/components/schemas/EmailDetail"}}
                                    }
                                }
                            }
                        },
                        "401": unauthorized.clone(),
                        "404": {"description": "Email not found"}
                    }
                }
            },
            "/api/v1/mailers": {
                "get": {
                    "tags": ["mailers"],
                    "summary": "Distinct mailer classes",
                    "operationId": "listMailers",
                    "security": secured.clone(),
                    "responses": {
                        "200": {
                            "description": "Sorted mailer classes",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "mailers": {"type": "array", "items": {"type": "string"}}
                                        }
                                    }
                                }
                            }
                        },
                        "401": unauthorized.clone()
                    }
                }
            }
        },
        "components": {
            "securitySchemes": {
                "api_key": {"type": "apiKey", "in": "header", "name": "X-API-Key"},
                "bearer": {"type": "http", "scheme": "bearer"}
            },
            "schemas": {
                "EmailStatus": {
                    "type": "string",
                    "enum": ["pending", "sent", "delivered", "opened", "clicked", "bounced", "complained"]
                },
                "EmailSummary": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "format": "uuid"},
                        "tracking_id": {"type": "string", "format": "uuid"},
                        "message_id": {"type": "string", "nullable": true},
                        "mailer_class": {"type": "string", "nullable": true},
                        "mailer_action": {"type": "string", "nullable": true},
                        "from_address": {"type": "string", "nullable": true},
                        "to_addresses": {"type": "array", "items": {"type": "string"}},
                        "cc_addresses": {"type": "array", "items": {"type": "string"}},
                        "bcc_addresses": {"type": "array", "items": {"type": "string"}},
                        "subject": {"type": "string", "nullable": true},
                        "domain": {"type": "string", "nullable": true},
                        "status": {"$ref": "#/components/schemas/EmailStatus"},
                        "delivered_at": {"type": "string", "format": "date-time", "nullable": true},
                        "opened_at": {"type": "string", "format": "date-time", "nullable": true},
                        "clicked_at": {"type": "string", "format": "date-time", "nullable": true},
                        "bounced_at": {"type": "string", "format": "date-time", "nullable": true},
                        "created_at": {"type": "string", "format": "date-time"},
                        "updated_at": {"type": "string", "format": "date-time"}
                    }
                },
                "EmailDetail": {
                    "allOf": [
                        {"$ref": "#/components/schemas/EmailSummary"},
                        {
                            "type": "object",
                            "properties": {
                                "html_body": {"type": "string", "nullable": true},
                                "text_body": {"type": "string", "nullable": true},
                                "headers": {"type": "object"},
                                "call_stack": {"type": "array", "items": {"type": "string"}},
                                "events": {"type": "array", "items": {"$ref": "#/components/schemas/Event"}}
                            }
                        }
                    ]
                },
                "Event": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "format": "uuid"},
                        "event_type": {
                            "type": "string",
                            "enum": ["accepted", "delivered", "opened", "clicked", "bounced", "failed", "dropped", "complained", "unsubscribed"]
                        },
                        "occurred_at": {"type": "string", "format": "date-time"},
                        "recipient": {"type": "string", "nullable": true},
                        "ip_address": {"type": "string", "nullable": true},
                        "user_agent": {"type": "string", "nullable": true},
                        "device_type": {"type": "string", "nullable": true},
                        "client_name": {"type": "string", "nullable": true},
                        "client_os": {"type": "string", "nullable": true},
                        "country": {"type": "string", "nullable": true},
                        "region": {"type": "string", "nullable": true},
                        "city": {"type": "string", "nullable": true},
                        "url": {"type": "string", "nullable": true},
                        "raw_payload": {"type": "object"}
                    }
                },
                "EmailListResponse": {
                    "type": "object",
                    "properties": {
                        "emails": {"type": "array", "items": {"$ref": "#/components/schemas/EmailSummary"}},
                        "total_count": {"type": "integer"},
                        "total_pages": {"type": "integer"},
                        "current_page": {"type": "integer"}
                    }
                }
            }
        }
    })
}

/// Swagger UI HTML template
const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>MailerLog API Documentation</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        body { margin: 0; padding: 0; }
        .swagger-ui .topbar { display: none; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIBundle.SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>"#;
