//! # invoice-dl
//!
//! Backend library for self-serve invoice archive exports.
//!
//! ## Design Philosophy
//!
//! invoice-dl is designed to be:
//! - **Credential-scoped** - Every request runs under the caller's own
//!   provider key; the service never stores one
//! - **Streaming-first** - Archives leave as they are built, so exports of
//!   any size run in constant memory
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Failure-tolerant** - One bad document never sinks a whole export
//!
//! ## Quick Start
//!
//! ```no_run
//! use invoice_dl::{Config, InvoiceExporter, types::DateRange};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let exporter = InvoiceExporter::new(config).await?;
//!
//!     // Stream an archive of everything the credential can see
//!     let mut export = exporter
//!         .begin_export("sk_live_example", DateRange::unbounded())
//!         .await?;
//!     while let Some(chunk) = export.body.recv().await {
//!         // Forward each chunk to a file or an HTTP response
//!         let _ = chunk;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Streaming zip assembly
pub mod archive;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Core export service (decomposed into focused submodules)
pub mod exporter;
/// Billing-provider HTTP client
pub mod provider;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, ExportConfig, PersistenceConfig, ProviderConfig};
pub use db::Database;
pub use error::{
    ApiError, CredentialError, DatabaseError, Error, ErrorDetail, ExportError, ProviderError,
    Result, ToHttpStatus,
};
pub use exporter::{ExportStream, InvoiceExporter};
pub use provider::ProviderClient;
pub use types::{
    AccountId, AccountUsage, AdmitDecision, DateRange, InvoiceId, InvoiceRecord, InvoiceStatus,
    Tier,
};

/// Helper function to run the exporter with graceful signal handling.
///
/// Waits for a termination signal and then calls the exporter's `shutdown()`
/// method, which cancels in-flight exports without charging them.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use invoice_dl::{Config, InvoiceExporter, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let exporter = InvoiceExporter::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(exporter).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(exporter: InvoiceExporter) -> Result<()> {
    wait_for_signal().await;
    exporter.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
