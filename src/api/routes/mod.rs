//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`invoices`] — Invoice listing
//! - [`exports`] — The streamed archive export
//! - [`account`] — Account identity and quota state
//! - [`webhooks`] — Payment-confirmation events
//! - [`system`] — Health check and OpenAPI spec

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, DateRange, Tier};

mod account;
mod exports;
mod invoices;
mod system;
mod webhooks;

// Re-export all handlers so `routes::function_name` continues to work
pub use account::*;
pub use exports::*;
pub use invoices::*;
pub use system::*;
pub use webhooks::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /invoices and GET /invoices/export
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DateRangeQuery {
    /// First day included, ISO date (YYYY-MM-DD)
    pub start_date: Option<String>,
    /// Last day included, ISO date (YYYY-MM-DD)
    pub end_date: Option<String>,
}

impl DateRangeQuery {
    /// Parse both bounds into a [`DateRange`], naming the offending
    /// parameter and value on failure
    pub fn parse(&self) -> Result<DateRange, String> {
        let from = match self.start_date.as_deref() {
            Some(raw) => Some(parse_day("start_date", raw)?),
            None => None,
        };
        let to = match self.end_date.as_deref() {
            Some(raw) => Some(parse_day("end_date", raw)?),
            None => None,
        };
        Ok(DateRange::new(from, to))
    }
}

fn parse_day(param: &str, raw: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("{} '{}' is not a valid YYYY-MM-DD date", param, raw))
}

/// Response for GET /account - account identity plus quota state
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AccountStatusResponse {
    /// Provider account the credential resolves to
    pub account_id: AccountId,
    /// Current quota tier
    pub tier: Tier,
    /// Successfully finalized exports so far
    pub export_count: i64,
    /// Free exports left before denial; null for premium accounts
    pub remaining_free_exports: Option<i64>,
}

/// Request body for POST /webhooks/payment
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PaymentEventRequest {
    /// Event name; only "payment.confirmed" has an effect
    pub event: String,
    /// Account whose tier the event applies to
    pub account_id: Option<String>,
}
