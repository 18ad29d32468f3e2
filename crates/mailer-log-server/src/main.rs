//! MailerLog - service entry point

use anyhow::{Context, Result};
use mailer_log_api::{create_router, AppState};
use mailer_log_common::config::{Config, LoggingConfig};
use mailer_log_core::{RetentionWorker, WebhookIngestor};
use mailer_log_storage::repository::{
    DbEmailRepository, DbEventRepository, EmailRepository, EventRepository,
};
use mailer_log_storage::DatabasePool;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging);

    info!("Starting MailerLog...");

    if config.webhook.signing_key.is_none() {
        warn!("No webhook signing key configured; every webhook will be rejected");
    }
    if config.api.admin_token.is_none() {
        warn!("No admin token configured; the admin API will reject every request");
    }

    let db_pool = DatabasePool::new(&config.database).await?;
    db_pool.migrate().await?;

    let emails: Arc<dyn EmailRepository> = Arc::new(DbEmailRepository::new(db_pool.clone()));
    let events: Arc<dyn EventRepository> = Arc::new(DbEventRepository::new(db_pool.clone()));

    // Start retention cleanup
    let retention_handle = if config.retention.enabled {
        let worker = RetentionWorker::new(emails.clone(), &config.retention);
        Some(tokio::spawn(async move {
            worker.run().await;
        }))
    } else {
        info!("Retention cleanup disabled");
        None
    };

    let ingestor = WebhookIngestor::from_config(&config.webhook, emails.clone(), events.clone());
    let app = create_router(AppState {
        emails,
        events,
        ingestor: Arc::new(ingestor),
        api: config.api.clone(),
    });

    let bind = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind API server on {}", bind))?;
    info!("Starting API server on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = retention_handle {
        handle.abort();
    }

    info!("MailerLog shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},mailer_log=debug", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "text" {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    } else {
        registry.with(fmt::layer().json().with_target(true)).init();
    }
}
