//! Local/remote reconciliation.
//!
//! Both reconcilers follow the same shape: write locally first, confirm with
//! the remote later, and fall back to the last confirmed value when the
//! remote disagrees or fails. Remote failures never propagate to callers;
//! they show up in the returned outcome and in the logs.

pub mod balance;
pub mod preferences;
pub mod types;

pub use balance::{BalanceReconciler, EarnReceipt};
pub use preferences::{PreferenceReconciler, PreferenceSnapshot, SAVE_FAILED_MESSAGE};
pub use types::{FetchOutcome, PushOutcome, SkipReason, SyncOutcome};
