//! REST API server module
//!
//! Exposes the invoice export pipeline over HTTP with OpenAPI
//! documentation. Every functional endpoint acts on behalf of the caller's
//! own provider credential, supplied per request in the `X-Provider-Key`
//! header and never stored.

use crate::{Config, InvoiceExporter, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Invoices
/// - `GET /api/v1/invoices` - List invoices inside an optional date window
///
/// ## Exports
/// - `GET /api/v1/invoices/export` - Stream a zip of invoice documents
///
/// ## Account
/// - `GET /api/v1/account` - Account identity and quota state
///
/// ## Webhooks
/// - `POST /api/v1/webhooks/payment` - Payment-confirmation events
///
/// ## System
/// - `GET /api/v1/health` - Health check
/// - `GET /api/v1/openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(exporter: Arc<InvoiceExporter>, config: Arc<Config>) -> Router {
    let state = AppState::new(exporter, config.clone());

    // All functional routes live under the /api/v1 prefix the OpenAPI spec
    // documents
    let api = Router::new()
        // Invoices
        .route("/invoices", get(routes::list_invoices))
        .route("/invoices/export", get(routes::export_invoices))
        // Account
        .route("/account", get(routes::account_status))
        // Webhooks
        .route("/webhooks/payment", post(routes::payment_webhook))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = Router::new().nest("/api/v1", api);

    // Merge Swagger UI routes if enabled in config (before applying state)
    // Note: SwaggerUi reads the /api/v1/openapi.json endpoint defined above
    let router = if config.api.swagger_ui {
        router.merge(
            SwaggerUi::new("/swagger-ui")
                .config(utoipa_swagger_ui::Config::from("/api/v1/openapi.json")),
        )
    } else {
        router
    };

    // Add state to all routes
    let router = router.with_state(state);

    // Apply CORS middleware if enabled in config
    let router = if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    };

    // Request logging span; applied last so it is the outermost layer and
    // wraps CORS handling too
    router.layer(TraceLayer::new_for_http())
}

/// Build a CORS layer based on configured origins
///
/// # Arguments
///
/// * `origins` - List of allowed origins (supports "*" for any origin)
///
/// # Returns
///
/// A configured CorsLayer that allows the specified origins, all methods,
/// and all headers for cross-origin requests.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    // Check if "*" (all origins) is in the list
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        // Allow all origins (default for local development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Allow specific origins
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// This function creates a TCP listener, binds it to the configured address,
/// and starts serving the API router. It runs until the exporter's shutdown
/// token is cancelled or the server fails.
///
/// # Arguments
///
/// * `exporter` - Arc-wrapped InvoiceExporter instance to handle API requests
/// * `config` - Arc-wrapped Config containing API configuration
///
/// # Example
///
/// ```no_run
/// use invoice_dl::{Config, InvoiceExporter};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let exporter = Arc::new(InvoiceExporter::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// invoice_dl::api::start_api_server(exporter, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(exporter: Arc<InvoiceExporter>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    // The server drains when the exporter shuts down; in-flight export
    // bodies terminate quickly because their pipelines die on the same token
    let shutdown = exporter.shutdown.clone();

    // Create the router with all routes
    let app = create_router(exporter, config);

    // Bind TCP listener to the configured address
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
