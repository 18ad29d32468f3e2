//! Configuration for MailerLog

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "MAILER_LOG_CONFIG";

/// Prefix for environment overrides, e.g. `MAILER_LOG__WEBHOOK__SIGNING_KEY`
pub const ENV_PREFIX: &str = "MAILER_LOG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Webhook ingestion configuration
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Retention configuration
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Admin API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Send-side capture configuration
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Socket address string suitable for `TcpListener::bind`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Webhook ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared signing key issued by the delivery provider.
    /// When unset every webhook is rejected as unauthorized.
    pub signing_key: Option<String>,

    /// How long a provider event id stays in the duplicate cache
    #[serde(default = "default_dedupe_ttl")]
    pub dedupe_ttl_secs: u64,

    /// Namespace prepended to provider event ids in the duplicate cache
    #[serde(default = "default_dedupe_namespace")]
    pub dedupe_namespace: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            dedupe_ttl_secs: default_dedupe_ttl(),
            dedupe_namespace: default_dedupe_namespace(),
        }
    }
}

fn default_dedupe_ttl() -> u64 {
    24 * 60 * 60
}

fn default_dedupe_namespace() -> String {
    "mailer_log:event".to_string()
}

/// Retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Run the periodic cleanup worker
    #[serde(default = "default_retention_enabled")]
    pub enabled: bool,

    /// Emails older than this many days are deleted together with their events
    #[serde(default = "default_retention_days")]
    pub period_days: u32,

    /// Seconds between cleanup runs
    #[serde(default = "default_retention_interval")]
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_retention_enabled(),
            period_days: default_retention_days(),
            interval_secs: default_retention_interval(),
        }
    }
}

fn default_retention_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    365
}

fn default_retention_interval() -> u64 {
    3600
}

/// Admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for the admin API. When unset the admin API rejects all requests.
    pub admin_token: Option<String>,

    /// Default page size for email listings
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Upper bound for a requested page size
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            admin_token: None,
            per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

fn default_per_page() -> u32 {
    25
}

fn default_max_per_page() -> u32 {
    100
}

/// Send-side capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Keep the caller-supplied call stack on the email record
    #[serde(default = "default_capture_call_stack")]
    pub capture_call_stack: bool,

    /// Maximum number of call stack frames kept
    #[serde(default = "default_call_stack_depth")]
    pub call_stack_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_call_stack: default_capture_call_stack(),
            call_stack_depth: default_call_stack_depth(),
        }
    }
}

fn default_capture_call_stack() -> bool {
    true
}

fn default_call_stack_depth() -> usize {
    20
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from a TOML file only
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from the first config file found, overlaid with
    /// `MAILER_LOG__*` environment variables
    pub fn load() -> crate::Result<Self> {
        let file = Self::locate_file();
        if let Some(path) = &file {
            tracing::info!(path = %path.display(), "Loading configuration file");
        }
        Self::load_from(file.as_deref())
    }

    /// Load configuration from an optional file plus the environment
    pub fn load_from(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path.to_path_buf())
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize::<Config>())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))
    }

    fn locate_file() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(explicit));
        }

        [
            PathBuf::from("./mailer-log.toml"),
            PathBuf::from("/etc/mailer-log/config.toml"),
        ]
        .into_iter()
        .find(|path| path.exists())
    }
}
