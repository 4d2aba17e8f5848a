//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the invoice-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the invoice-dl REST API
///
/// This struct is used to generate the OpenAPI specification that describes
/// all available endpoints, request/response types, and API behavior.
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "invoice-dl REST API",
        version = "0.1.0",
        description = "REST API for exporting a payment-provider account's invoices as a streamed zip archive, with per-account export quotas",
        contact(
            name = "invoice-dl",
            url = "https://github.com/jvz-devx/invoice-dl"
        ),
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8094", description = "Local development server")
    ),
    paths(
        // Invoices
        crate::api::routes::list_invoices,

        // Exports
        crate::api::routes::export_invoices,

        // Account
        crate::api::routes::account_status,

        // Webhooks
        crate::api::routes::payment_webhook,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::AccountId,
        crate::types::InvoiceId,
        crate::types::Tier,
        crate::types::InvoiceStatus,
        crate::types::InvoiceRecord,
        crate::types::AccountUsage,

        // Config types from config.rs
        crate::config::Config,
        crate::config::ProviderConfig,
        crate::config::ExportConfig,
        crate::config::PersistenceConfig,
        crate::config::ApiConfig,

        // API request/response types from routes
        crate::api::routes::DateRangeQuery,
        crate::api::routes::AccountStatusResponse,
        crate::api::routes::PaymentEventRequest,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "invoices", description = "Invoice listing - Enumerate the caller's invoices inside a date window"),
        (name = "exports", description = "Archive exports - Stream a zip of invoice documents, gated by the per-account quota"),
        (name = "account", description = "Account - Identity resolution and quota state for the supplied credential"),
        (name = "webhooks", description = "Webhooks - Payment-confirmation events that upgrade an account's tier"),
        (name = "system", description = "System endpoints - Health checks and the OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add the provider-key authentication scheme to the OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "provider_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Provider-Key"),
                    ),
                ),
            );
        }
    }
}
