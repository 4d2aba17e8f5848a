//! Core export service split into focused submodules.
//!
//! The `InvoiceExporter` struct and its methods are organized by domain:
//! - [`quota`] - Per-account admission decisions and usage accounting
//! - [`run`] - The export pipeline: admit, list, fetch, stream the archive

mod quota;
mod run;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use quota::QuotaGate;
pub use run::ExportStream;

use crate::config::Config;
use crate::db::Database;
use crate::error::{CredentialError, Error, Result};
use crate::provider::ProviderClient;
use crate::types::{AdmitDecision, DateRange, InvoiceRecord};

/// Prefix the provider stamps on every secret key
pub(crate) const SECRET_KEY_PREFIX: &str = "sk_";

/// Check that a caller-supplied credential is shaped like a provider secret
/// key, before it is sent anywhere
pub(crate) fn validate_credential(credential: &str) -> Result<()> {
    if credential.is_empty() {
        return Err(Error::Credential(CredentialError::Missing));
    }
    if !credential.starts_with(SECRET_KEY_PREFIX) {
        return Err(Error::Credential(CredentialError::Malformed {
            reason: format!(
                "expected a secret key starting with '{}'",
                SECRET_KEY_PREFIX
            ),
        }));
    }
    Ok(())
}

/// Main exporter instance (cloneable - all fields are Arc-wrapped)
///
/// Every export runs under the caller's own provider credential; the service
/// never holds one itself. The only state it owns is the per-account usage
/// store backing the export quota.
#[derive(Clone)]
pub struct InvoiceExporter {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to inspect usage rows
    pub db: std::sync::Arc<Database>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: std::sync::Arc<Config>,
    /// Credential-scoped provider API client
    pub(crate) provider: std::sync::Arc<ProviderClient>,
    /// Quota decisions over the usage store
    pub(crate) quota: QuotaGate,
    /// Cancelled once on graceful shutdown; aborts in-flight exports
    pub(crate) shutdown: tokio_util::sync::CancellationToken,
}

impl InvoiceExporter {
    /// Create a new InvoiceExporter instance
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the provider HTTP clients
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let provider = ProviderClient::new(&config.provider)?;

        let db = std::sync::Arc::new(db);
        let quota = QuotaGate::new(db.clone(), config.export.free_export_limit);

        tracing::info!(
            database = %config.persistence.database_path.display(),
            provider = %config.provider.base_url,
            free_export_limit = config.export.free_export_limit,
            "invoice exporter initialized"
        );

        Ok(Self {
            db,
            config: std::sync::Arc::new(config),
            provider: std::sync::Arc::new(provider),
            quota,
            shutdown: tokio_util::sync::CancellationToken::new(),
        })
    }

    /// Get the current configuration
    ///
    /// The configuration is wrapped in an Arc, so this is a cheap clone
    /// operation.
    pub fn get_config(&self) -> std::sync::Arc<Config> {
        std::sync::Arc::clone(&self.config)
    }

    /// List invoices for the caller's account inside an optional date range
    ///
    /// Validates the credential shape locally, then pages through the
    /// provider listing. Amounts stay raw minor units with an ISO currency
    /// code; no documents are fetched and no quota is consumed.
    pub async fn list_invoices(
        &self,
        credential: &str,
        range: DateRange,
    ) -> Result<Vec<InvoiceRecord>> {
        validate_credential(credential)?;
        self.provider
            .list_invoices(
                credential,
                &range,
                self.config.export.page_size,
                self.config.export.max_records,
            )
            .await
    }

    /// Resolve the caller's account and report its quota state
    ///
    /// Creates the usage row on first sight, so a fresh account reports
    /// tier=free with a zero export count rather than not-found.
    pub async fn account_status(&self, credential: &str) -> Result<AdmitDecision> {
        validate_credential(credential)?;
        let account_id = self.provider.get_account_identity(credential).await?;
        self.quota.check_admit(&account_id).await
    }

    /// Gracefully shut down the exporter
    ///
    /// Stops admitting new exports and cancels every in-flight pipeline;
    /// cancelled exports receive no quota credit. Database connections close
    /// when the last clone is dropped.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating graceful shutdown");
        self.shutdown.cancel();
        tracing::info!("graceful shutdown complete - in-flight exports cancelled");
        Ok(())
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with export processing and listens on
    /// the configured bind address (default: 127.0.0.1:8094).
    pub fn spawn_api_server(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let exporter = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(exporter, config).await })
    }
}
