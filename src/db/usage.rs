//! Account usage tracking: lazy row creation, export counting, tier changes.

use crate::error::DatabaseError;
use crate::types::{AccountId, AccountUsage, Tier};
use crate::{Error, Result};

use super::{AccountUsageRow, Database};

impl Database {
    /// Fetch the usage row for an account, if one exists
    pub async fn get_account_usage(&self, account_id: &AccountId) -> Result<Option<AccountUsage>> {
        let row = sqlx::query_as::<_, AccountUsageRow>(
            r#"
            SELECT account_id, tier, export_count, created_at, updated_at
            FROM account_usage
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fetch account usage: {}",
                e
            )))
        })?;

        Ok(row.map(AccountUsage::from))
    }

    /// Fetch the usage row for an account, creating it on first sight
    ///
    /// New accounts start on the free tier with zero exports. The insert is
    /// a no-op when the row already exists, so concurrent calls for the same
    /// account all observe the same row.
    pub async fn ensure_account_usage(&self, account_id: &AccountId) -> Result<AccountUsage> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO account_usage (account_id, tier, export_count, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(Tier::Free.to_i32())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to create account usage row: {}",
                e
            )))
        })?;

        let row = sqlx::query_as::<_, AccountUsageRow>(
            r#"
            SELECT account_id, tier, export_count, created_at, updated_at
            FROM account_usage
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fetch account usage after create: {}",
                e
            )))
        })?;

        Ok(AccountUsage::from(row))
    }

    /// Increment the export counter for an account and return the new count
    ///
    /// The increment happens in a single UPDATE so concurrent exports for the
    /// same account never lose a count.
    pub async fn increment_export_count(&self, account_id: &AccountId) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE account_usage
            SET export_count = export_count + 1, updated_at = ?
            WHERE account_id = ?
            "#,
        )
        .bind(now)
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to increment export count: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "No usage row for account {}",
                account_id
            ))));
        }

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT export_count FROM account_usage WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read export count: {}",
                e
            )))
        })?;

        Ok(count)
    }

    /// Set the billing tier for an account, creating the row if needed
    ///
    /// Payment webhooks can arrive before the account has ever exported,
    /// so this upserts rather than requiring an existing row.
    pub async fn set_tier(&self, account_id: &AccountId, tier: Tier) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO account_usage (account_id, tier, export_count, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET tier = excluded.tier, updated_at = excluded.updated_at
            "#,
        )
        .bind(account_id)
        .bind(tier.to_i32())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set account tier: {}",
                e
            )))
        })?;

        Ok(())
    }
}
