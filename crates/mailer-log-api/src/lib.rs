//! MailerLog API - HTTP surface
//!
//! Provider webhook endpoint, health checks and the admin read API over the
//! email log.

pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod routes;

pub use auth::AppState;
pub use openapi::create_openapi_routes;
pub use routes::create_router;
