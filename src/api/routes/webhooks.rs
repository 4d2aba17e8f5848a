//! Payment-confirmation webhook handler.
//!
//! The subscription/checkout flow lives outside this crate; the only thing
//! it tells us is "this account paid", delivered here as an event. The
//! handler translates that into the narrow `set_tier` store write.

use super::PaymentEventRequest;
use crate::api::{AppState, auth};
use crate::types::{AccountId, Tier};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;

/// Event name that upgrades an account to premium
const PAYMENT_CONFIRMED_EVENT: &str = "payment.confirmed";

/// POST /webhooks/payment - Apply a payment-confirmation event
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    tag = "webhooks",
    request_body = PaymentEventRequest,
    responses(
        (status = 202, description = "Event applied, or acknowledged without action"),
        (status = 400, description = "payment.confirmed event without an account id"),
        (status = 401, description = "Webhook secret missing or wrong"),
        (status = 500, description = "Tier update failed", body = crate::error::ApiError)
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<PaymentEventRequest>,
) -> impl IntoResponse {
    if !auth::verify_webhook_secret(&headers, state.config.api.webhook_secret.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": "unauthorized", "message": "Missing or invalid X-Webhook-Secret header"}})),
        )
            .into_response();
    }

    if event.event != PAYMENT_CONFIRMED_EVENT {
        // Acknowledge unknown events so the sender does not retry them
        tracing::debug!(event = %event.event, "ignoring unhandled webhook event");
        return (
            StatusCode::ACCEPTED,
            Json(json!({"status": "ignored", "event": event.event})),
        )
            .into_response();
    }

    let Some(account_id) = event.account_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": "validation_error", "message": "payment.confirmed requires an account_id"}})),
        )
            .into_response();
    };
    let account_id = AccountId::new(account_id);

    match state.exporter.db.set_tier(&account_id, Tier::Premium).await {
        Ok(()) => {
            tracing::info!(account_id = %account_id, "account upgraded to premium");
            (
                StatusCode::ACCEPTED,
                Json(json!({"status": "accepted", "account_id": account_id})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(account_id = %account_id, error = %e, "failed to set account tier");
            e.into_response()
        }
    }
}
