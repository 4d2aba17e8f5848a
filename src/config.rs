//! Configuration types for invoice-dl
//!
//! All settings have sensible defaults: `Config::default()` (or an empty
//! JSON object) yields a working configuration pointed at the real provider
//! API, with a one-export free tier and a local SQLite file.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Root configuration for the exporter
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Payment-provider API settings (base URL, timeouts)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Export pipeline behavior (concurrency, paging, quota allotment)
    #[serde(default)]
    pub export: ExportConfig,

    /// Data storage and state management
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Validate settings that have hard operational bounds
    ///
    /// Called once at service construction; an invalid value fails startup
    /// rather than wedging the pipeline at request time.
    pub fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.export.fetch_concurrency) {
            return Err(Error::Config {
                message: format!(
                    "fetch_concurrency must be between 1 and 16, got {}",
                    self.export.fetch_concurrency
                ),
                key: Some("export.fetch_concurrency".to_string()),
            });
        }

        if !(1..=100).contains(&self.export.page_size) {
            return Err(Error::Config {
                message: format!(
                    "page_size must be between 1 and 100 (provider page limit), got {}",
                    self.export.page_size
                ),
                key: Some("export.page_size".to_string()),
            });
        }

        if self.export.max_records == 0 {
            return Err(Error::Config {
                message: "max_records must be at least 1".to_string(),
                key: Some("export.max_records".to_string()),
            });
        }

        if self.export.free_export_limit < 0 {
            return Err(Error::Config {
                message: format!(
                    "free_export_limit must not be negative, got {}",
                    self.export.free_export_limit
                ),
                key: Some("export.free_export_limit".to_string()),
            });
        }

        if let Err(e) = url::Url::parse(&self.provider.base_url) {
            return Err(Error::Config {
                message: format!("base_url '{}' is not a valid URL: {}", self.provider.base_url, e),
                key: Some("provider.base_url".to_string()),
            });
        }

        Ok(())
    }
}

/// Payment-provider API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderConfig {
    /// Base URL of the provider API (default: "https://api.stripe.com")
    ///
    /// Overridable so tests and self-hosted gateways can point the client
    /// at another host.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for listing/identity calls (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for one whole document download (default: 120 seconds)
    #[serde(default = "default_document_timeout", with = "duration_serde")]
    pub document_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            document_timeout: default_document_timeout(),
        }
    }
}

/// Export pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExportConfig {
    /// Concurrent document fetches per export, 1-16 (default: 4)
    ///
    /// Fetches run in parallel up to this bound; archive writes stay
    /// serialized in listing order regardless.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Invoices requested per listing page, 1-100 (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on invoices collected across all pages (default: 1000)
    ///
    /// Reaching the cap truncates the listing with a warning instead of
    /// failing the export.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Successful exports a free-tier account gets, ever (default: 1)
    #[serde(default = "default_free_export_limit")]
    pub free_export_limit: i64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: default_fetch_concurrency(),
            page_size: default_page_size(),
            max_records: default_max_records(),
            free_export_limit: default_free_export_limit(),
        }
    }
}

/// Data storage and state management configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./invoice-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8094)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Shared secret required on payment-confirmation webhooks
    ///
    /// When set, `POST /api/v1/webhooks/payment` must carry this value in
    /// `X-Webhook-Secret`; when unset the endpoint accepts unauthenticated
    /// events (local development only).
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            webhook_secret: None,
        }
    }
}

// Default value functions

fn default_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_document_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_page_size() -> usize {
    100
}

fn default_max_records() -> usize {
    1000
}

fn default_free_export_limit() -> i64 {
    1
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./invoice-dl.db")
}

fn default_bind_address() -> SocketAddr {
    use std::net::{IpAddr, Ipv4Addr};
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8094)
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
