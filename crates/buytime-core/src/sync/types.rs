//! Outcomes reported by the reconcilers.

use serde::{Deserialize, Serialize};

use crate::error::ApiErrorKind;

/// Result of a balance sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// First sync: local ledger seeded from the remote.
    Seeded { confirmed: i64 },
    /// No local changes; remote value accepted (picks up other devices).
    Accepted { confirmed: i64 },
    /// Local delta applied on top of the remote value and confirmed.
    Pushed { delta: i64, confirmed: i64 },
    /// Nothing to do.
    Skipped { reason: SkipReason },
    /// Remote failed; local state untouched, delta kept for the next trigger.
    Failed { kind: ApiErrorKind },
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `on_appear` after the ledger already has a confirmed baseline.
    AlreadySeeded,
    /// `on_foreground` before the first seed; `on_appear` owns that.
    NeverSynced,
    /// No unconfirmed local activity.
    NoPendingDelta,
    /// Preference cache is younger than its TTL.
    CacheFresh,
}

/// Result of a preferences fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Remote differed; local state replaced.
    Updated,
    /// Remote matched local state; only the fetch time was stamped.
    Unchanged,
    Skipped { reason: SkipReason },
    Failed { kind: ApiErrorKind },
}

/// Result of a debounced preferences push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    Confirmed,
    /// Remote failed; local state rolled back to the last confirmed values.
    RolledBack { kind: ApiErrorKind },
}
