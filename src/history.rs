// =============================================================================
// Activity History — capped log of wallet operations
// =============================================================================

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Deposit,
    Withdrawal,
    Exchange,
    Mining,
    Option,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pending,
    Completed,
    Win,
    Loss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub kind: ActivityKind,
    pub asset: String,
    pub amount: f64,
    pub status: ActivityStatus,
    /// RFC 3339 timestamp.
    pub at: String,
    #[serde(default)]
    pub detail: String,
}

/// Ring buffer of the most recent activity, newest last.
pub struct ActivityLog {
    records: RwLock<Vec<ActivityRecord>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append a record, evicting the oldest entries beyond capacity.
    /// Returns the new record's id.
    pub fn record(
        &self,
        kind: ActivityKind,
        asset: &str,
        amount: f64,
        status: ActivityStatus,
        detail: impl Into<String>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let rec = ActivityRecord {
            id: id.clone(),
            kind,
            asset: asset.to_string(),
            amount,
            status,
            at: Utc::now().to_rfc3339(),
            detail: detail.into(),
        };

        let mut records = self.records.write();
        records.push(rec);
        if records.len() > self.capacity {
            let excess = records.len() - self.capacity;
            records.drain(..excess);
        }
        id
    }

    /// Every record, or only those of `kind`, oldest first.
    pub fn list(&self, kind: Option<ActivityKind>) -> Vec<ActivityRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }
}
