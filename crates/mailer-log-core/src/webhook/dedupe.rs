//! Duplicate suppression for retried webhook deliveries

use async_trait::async_trait;
use mailer_log_common::config::WebhookConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Short-lived record of provider event ids already seen
#[async_trait]
pub trait IdempotencyCache: Send + Sync {
    /// Atomically mark `event_id` as seen.
    ///
    /// Returns `false` when it was already marked and has not expired.
    async fn check_and_mark(&self, event_id: &str) -> bool;
}

/// Process-wide in-memory cache with per-entry expiry
pub struct MemoryIdempotencyCache {
    namespace: String,
    ttl: Duration,
    state: Mutex<CacheState>,
}

struct CacheState {
    entries: HashMap<String, Instant>,
    sweep_at: usize,
}

const MIN_SWEEP_SIZE: usize = 1024;

impl MemoryIdempotencyCache {
    pub fn new(namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                sweep_at: MIN_SWEEP_SIZE,
            }),
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(
            config.dedupe_namespace.clone(),
            Duration::from_secs(config.dedupe_ttl_secs),
        )
    }

    fn key(&self, event_id: &str) -> String {
        format!("{}:{}", self.namespace, event_id)
    }

    /// Number of live entries
    pub async fn live_entries(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().await;
        state.entries.values().filter(|expires| **expires > now).count()
    }
}

#[async_trait]
impl IdempotencyCache for MemoryIdempotencyCache {
    async fn check_and_mark(&self, event_id: &str) -> bool {
        let key = self.key(event_id);
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(expires) = state.entries.get(&key) {
            if *expires > now {
                return false;
            }
        }

        state.entries.insert(key, now + self.ttl);

        if state.entries.len() >= state.sweep_at {
            let before = state.entries.len();
            state.entries.retain(|_, expires| *expires > now);
            debug!(
                "Swept {} expired idempotency entries",
                before - state.entries.len()
            );
            state.sweep_at = (state.entries.len() * 2).max(MIN_SWEEP_SIZE);
        }

        true
    }
}
