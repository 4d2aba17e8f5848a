//! Account status handler.

use super::AccountStatusResponse;
use crate::api::{AppState, auth};
use crate::types::Tier;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

/// GET /account - Resolve the caller's account and report quota state
///
/// Creates the usage row on first sight, so a fresh account reports
/// tier=free with a zero export count rather than 404.
#[utoipa::path(
    get,
    path = "/api/v1/account",
    tag = "account",
    responses(
        (status = 200, description = "Account identity and quota state", body = AccountStatusResponse),
        (status = 401, description = "Missing or malformed provider credential", body = crate::error::ApiError),
        (status = 502, description = "Provider identity call failed", body = crate::error::ApiError)
    )
)]
pub async fn account_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let credential = match auth::provider_credential(&headers) {
        Ok(credential) => credential,
        Err(e) => return e.into_response(),
    };

    match state.exporter.account_status(&credential).await {
        Ok(decision) => {
            let remaining_free_exports = match decision.tier {
                Tier::Premium => None,
                Tier::Free => Some(
                    (state.config.export.free_export_limit - decision.export_count).max(0),
                ),
            };

            let response = AccountStatusResponse {
                account_id: decision.account_id,
                tier: decision.tier,
                export_count: decision.export_count,
                remaining_free_exports,
            };

            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "account status lookup failed");
            e.into_response()
        }
    }
}
