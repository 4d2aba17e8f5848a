//! Archive export handler.
//!
//! The response body is produced while document fetches are still in
//! flight, so everything that can fail cleanly (credential, admission,
//! listing) is decided before the first byte; after that the only failure
//! signal a client can observe is a truncated download.

use super::DateRangeQuery;
use crate::api::{AppState, auth};
use crate::error::Error;
use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};

/// Content-Disposition value for the archive download
const ARCHIVE_ATTACHMENT: &str = "attachment; filename=\"invoices.zip\"";

/// GET /invoices/export - Stream a zip of invoice documents
///
/// Admission, listing, and credential checks all happen before the response
/// starts; the archive is then assembled into the body as documents arrive.
#[utoipa::path(
    get,
    path = "/api/v1/invoices/export",
    tag = "exports",
    params(
        ("start_date" = Option<String>, Query, description = "First day included (YYYY-MM-DD)"),
        ("end_date" = Option<String>, Query, description = "Last day included (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Zip archive of invoice documents", content_type = "application/zip"),
        (status = 400, description = "Invalid date parameter"),
        (status = 401, description = "Missing or malformed provider credential", body = crate::error::ApiError),
        (status = 403, description = "Free export allotment used up; details carry the account id", body = crate::error::ApiError),
        (status = 502, description = "Provider listing or identity call failed", body = crate::error::ApiError)
    )
)]
pub async fn export_invoices(
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

    match state.exporter.begin_export(&credential, range).await {
        Ok(export) => {
            let stream = ReceiverStream::new(export.body).map(Ok::<_, std::convert::Infallible>);

            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip"),
                    (header::CONTENT_DISPOSITION, ARCHIVE_ATTACHMENT),
                ],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Err(e) => {
            match &e {
                // Denial is a normal outcome, not a failure
                Error::QuotaExceeded { account_id, .. } => {
                    tracing::info!(account_id = %account_id, "export denied by quota");
                }
                _ => tracing::error!(error = %e, "export could not be started"),
            }
            e.into_response()
        }
    }
}
