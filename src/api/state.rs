//! Application state for the API server

use crate::{Config, InvoiceExporter};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the exporter instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main InvoiceExporter instance
    pub exporter: Arc<InvoiceExporter>,

    /// Configuration (for read access; the exporter holds its own copy)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(exporter: Arc<InvoiceExporter>, config: Arc<Config>) -> Self {
        Self { exporter, config }
    }
}
