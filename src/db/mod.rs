//! Database layer for invoice-dl
//!
//! Handles SQLite persistence for per-account export usage.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`usage`] — Account usage rows backing the export quota

use crate::types::{AccountId, AccountUsage, Tier};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod usage;

/// Account usage record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct AccountUsageRow {
    /// Provider account identifier
    pub account_id: String,
    /// Billing tier code (0=free, 1=premium)
    pub tier: i32,
    /// Number of exports completed by this account
    pub export_count: i64,
    /// Unix timestamp when the row was first created
    pub created_at: i64,
    /// Unix timestamp of the last modification
    pub updated_at: i64,
}

impl From<AccountUsageRow> for AccountUsage {
    fn from(row: AccountUsageRow) -> Self {
        AccountUsage {
            account_id: AccountId::from(row.account_id),
            tier: Tier::from_i32(row.tier),
            export_count: row.export_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database handle for invoice-dl
pub struct Database {
    pool: SqlitePool,
}
