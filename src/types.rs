//! Core types for invoice-dl

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Provider-side account identifier (e.g. `acct_1FghJk...`)
///
/// This is the identity the caller's credential resolves to on the payment
/// provider, not any internal user id. Export quotas are keyed by it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create a new AccountId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for AccountId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for AccountId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for AccountId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Provider-side invoice identifier (e.g. `in_1NxyzAb...`)
///
/// Unique within an account and stable across repeated listings; archive
/// entry names are derived from it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    /// Create a new InvoiceId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InvoiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for InvoiceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quota tier of an account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free tier: a fixed one-export-ever allotment
    #[default]
    Free,
    /// Premium tier: unlimited exports
    Premium,
}

impl Tier {
    /// Convert integer tier code to Tier enum
    pub fn from_i32(tier: i32) -> Self {
        match tier {
            0 => Tier::Free,
            1 => Tier::Premium,
            _ => Tier::Free, // Default to Free for unknown tier
        }
    }

    /// Convert Tier enum to integer tier code
    pub fn to_i32(&self) -> i32 {
        match self {
            Tier::Free => 0,
            Tier::Premium => 1,
        }
    }
}

/// Invoice status as reported by the provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Finalized, awaiting payment
    Open,
    /// Paid in full
    Paid,
    /// Voided before payment
    Void,
    /// Written off as uncollectible
    Uncollectible,
    /// Still editable, not yet finalized
    Draft,
    /// Any status string this crate does not know about
    #[serde(other)]
    Unknown,
}

/// One invoice as listed from the provider
///
/// Amounts are raw minor units (cents) with an ISO currency code; rendering
/// them for a locale is the consumer's concern, never this crate's.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceRecord {
    /// Provider-unique invoice identifier
    pub id: InvoiceId,

    /// Creation time as a unix timestamp (seconds)
    pub issued_at: i64,

    /// Amount due in minor units (e.g. cents)
    pub amount_due: i64,

    /// ISO currency code as reported by the provider (lowercase)
    pub currency: String,

    /// Provider-defined invoice status
    pub status: InvoiceStatus,

    /// Best-effort customer label: email, else display name, else "customer"
    pub customer_label: String,

    /// URL of the invoice PDF, when the provider has generated one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ref: Option<String>,
}

/// Persisted per-account usage row
///
/// Created lazily on the first admission check for an unseen account.
/// `export_count` only ever increases, by exactly one per successfully
/// finalized export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountUsage {
    /// Provider account this row belongs to
    pub account_id: AccountId,

    /// Current quota tier
    pub tier: Tier,

    /// Number of successfully finalized exports
    pub export_count: i64,

    /// Row creation time (unix timestamp)
    pub created_at: i64,

    /// Last mutation time (unix timestamp)
    pub updated_at: i64,
}

/// Inclusive day range filtering an invoice listing
///
/// Bounds are calendar days in UTC: `from` covers from 00:00:00 of that day,
/// `to` covers through 23:59:59 of that day. Either bound may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included, if bounded below
    pub from: Option<chrono::NaiveDate>,
    /// Last day included, if bounded above
    pub to: Option<chrono::NaiveDate>,
}

/// Seconds from the start of a day to its last second (23:59:59)
const END_OF_DAY_OFFSET_SECS: i64 = 86_399;

impl DateRange {
    /// Create a range from optional day bounds
    pub fn new(from: Option<chrono::NaiveDate>, to: Option<chrono::NaiveDate>) -> Self {
        Self { from, to }
    }

    /// Unbounded range (no listing filter at all)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Whether neither bound is set
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Inclusive lower bound as a unix timestamp (start of `from` day, UTC)
    pub fn issued_after(&self) -> Option<i64> {
        self.from
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp())
    }

    /// Inclusive upper bound as a unix timestamp (last second of `to` day, UTC)
    pub fn issued_before(&self) -> Option<i64> {
        self.to.map(|d| {
            d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + END_OF_DAY_OFFSET_SECS
        })
    }
}

/// Outcome of a quota admission check
///
/// Denial is a normal decision, not an error: it carries the account id so
/// the caller can route the user toward an upgrade rather than show a
/// generic failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmitDecision {
    /// Account the decision applies to
    pub account_id: AccountId,
    /// Whether a new export may proceed right now
    pub admitted: bool,
    /// Tier at decision time
    pub tier: Tier,
    /// Export count at decision time
    pub export_count: i64,
}

/// Aggregated result of one finished export pipeline run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Invoices returned by the listing
    pub listed: usize,
    /// Entries committed to the archive
    pub appended: usize,
    /// Documents skipped (missing ref or failed fetch)
    pub skipped: usize,
    /// Whether the empty-result placeholder entry was written
    pub placeholder: bool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn account_id_display_and_round_trip() {
        let id = AccountId::new("acct_1");
        assert_eq!(id.to_string(), "acct_1");
        assert_eq!(AccountId::from("acct_1"), id);
        assert_eq!(id.as_str(), "acct_1");
    }

    #[test]
    fn account_id_serde_is_transparent() {
        let id = AccountId::new("acct_42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"acct_42\"", "newtype must serialize as a bare string");
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn tier_round_trips_through_i32() {
        assert_eq!(Tier::from_i32(Tier::Free.to_i32()), Tier::Free);
        assert_eq!(Tier::from_i32(Tier::Premium.to_i32()), Tier::Premium);
    }

    #[test]
    fn tier_from_i32_defaults_to_free_for_unknown_codes() {
        // A corrupted or future tier code must never grant premium by accident
        assert_eq!(Tier::from_i32(7), Tier::Free);
        assert_eq!(Tier::from_i32(-1), Tier::Free);
    }

    #[test]
    fn invoice_status_deserializes_known_and_unknown_values() {
        let status: InvoiceStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(status, InvoiceStatus::Paid);

        let status: InvoiceStatus = serde_json::from_str("\"uncollectible\"").unwrap();
        assert_eq!(status, InvoiceStatus::Uncollectible);

        // Provider-side additions must not break listing
        let status: InvoiceStatus = serde_json::from_str("\"some_future_status\"").unwrap();
        assert_eq!(status, InvoiceStatus::Unknown);
    }

    #[test]
    fn date_range_bounds_cover_whole_days() {
        let range = DateRange::new(
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
        );

        // 2024-01-01T00:00:00Z
        assert_eq!(range.issued_after(), Some(1_704_067_200));
        // 2024-01-31T23:59:59Z, i.e. start of day + 86399
        assert_eq!(range.issued_before(), Some(1_706_659_200 + 86_399));
    }

    #[test]
    fn date_range_single_day_spans_86399_seconds() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let range = DateRange::new(Some(day), Some(day));

        let lower = range.issued_after().unwrap();
        let upper = range.issued_before().unwrap();
        assert_eq!(upper - lower, 86_399, "a one-day range covers exactly one day inclusive");
    }

    #[test]
    fn date_range_bounds_are_independent() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let lower_only = DateRange::new(Some(day), None);
        assert!(lower_only.issued_after().is_some());
        assert!(lower_only.issued_before().is_none());
        assert!(!lower_only.is_unbounded());

        let upper_only = DateRange::new(None, Some(day));
        assert!(upper_only.issued_after().is_none());
        assert!(upper_only.issued_before().is_some());

        assert!(DateRange::unbounded().is_unbounded());
    }

    #[test]
    fn invoice_record_omits_missing_document_ref_in_json() {
        let record = InvoiceRecord {
            id: InvoiceId::new("in_1"),
            issued_at: 1_700_000_000,
            amount_due: 1250,
            currency: "usd".to_string(),
            status: InvoiceStatus::Open,
            customer_label: "customer".to_string(),
            document_ref: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert!(
            json.get("document_ref").is_none(),
            "absent document refs should be omitted, not serialized as null"
        );
        assert_eq!(json["amount_due"], 1250);
        assert_eq!(json["currency"], "usd");
    }
}
