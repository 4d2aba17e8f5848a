//! Per-account quota decisions.
//!
//! Admission reads the counter's current state; it is not single-use
//! locking. Two concurrent checks for the same free account both see
//! admit=true until a `record_success` lands, so the worst case under
//! races is one extra free export. Each store operation is atomic on its
//! own.

use std::sync::Arc;

use tracing::debug;

use crate::db::Database;
use crate::error::Result;
use crate::types::{AccountId, AdmitDecision, Tier};

/// Admission and usage accounting over the persisted usage store
#[derive(Clone)]
pub struct QuotaGate {
    db: Arc<Database>,
    free_export_limit: i64,
}

impl QuotaGate {
    /// Create a gate with the given free-tier allotment
    pub fn new(db: Arc<Database>, free_export_limit: i64) -> Self {
        Self {
            db,
            free_export_limit,
        }
    }

    /// Decide whether a new export may proceed for this account
    ///
    /// Lazily creates the usage row (tier=free, export_count=0) for an
    /// unseen account. Premium accounts are always admitted; free accounts
    /// are admitted while their export count is below the allotment. Denial
    /// is a decision carried in the result, not an error.
    pub async fn check_admit(&self, account_id: &AccountId) -> Result<AdmitDecision> {
        let usage = self.db.ensure_account_usage(account_id).await?;
        let admitted =
            usage.tier == Tier::Premium || usage.export_count < self.free_export_limit;

        debug!(
            account_id = %usage.account_id,
            tier = ?usage.tier,
            export_count = usage.export_count,
            admitted,
            "quota admission check"
        );

        Ok(AdmitDecision {
            account_id: usage.account_id,
            admitted,
            tier: usage.tier,
            export_count: usage.export_count,
        })
    }

    /// Count one successfully finalized export against the account
    ///
    /// Called at most once per export, only after the archive has been
    /// fully delivered. Returns the new export count.
    pub async fn record_success(&self, account_id: &AccountId) -> Result<i64> {
        let export_count = self.db.increment_export_count(account_id).await?;
        debug!(account_id = %account_id, export_count, "recorded successful export");
        Ok(export_count)
    }
}
