//! Invoice listing handlers.

use super::DateRangeQuery;
use crate::api::{AppState, auth};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

/// GET /invoices - List invoices inside an optional date window
///
/// Amounts stay raw minor units with an ISO currency code; rendering them
/// for a locale is the client's concern.
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    tag = "invoices",
    params(
        ("start_date" = Option<String>, Query, description = "First day included (YYYY-MM-DD)"),
        ("end_date" = Option<String>, Query, description = "Last day included (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Invoices issued inside the window", body = Vec<crate::types::InvoiceRecord>),
        (status = 400, description = "Invalid date parameter"),
        (status = 401, description = "Missing or malformed provider credential", body = crate::error::ApiError),
        (status = 502, description = "Provider listing call failed", body = crate::error::ApiError)
    )
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let credential = match auth::provider_credential(&headers) {
        Ok(credential) => credential,
        Err(e) => return e.into_response(),
    };

    let range = match query.parse() {
        Ok(range) => range,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": "invalid_date", "message": message}})),
            )
                .into_response();
        }
    };

    match state.exporter.list_invoices(&credential, range).await {
        Ok(invoices) => (StatusCode::OK, Json(invoices)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "invoice listing failed");
            e.into_response()
        }
    }
}
