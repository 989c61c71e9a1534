//! # BuyTime Core Library
//!
//! Core logic for BuyTime: users earn screen time by completing focus
//! sessions and spend it to temporarily lift app restrictions.
//!
//! Three execution contexts share one balance: the foreground app, a
//! restriction overlay that spends minutes, and a background monitor that
//! relocks when an earned window runs out. They never talk to each other;
//! they only share the [`SharedLedger`] key/value store.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite key/value stores (shared ledger + app-local cache)
//!   and TOML configuration
//! - **Ledger**: the balance plus the last remote-confirmed value
//! - **Sync**: delta-based [`BalanceReconciler`] and debounced
//!   [`PreferenceReconciler`]
//! - **Reward**: focus duration × mode ↔ reward minutes
//! - **Restriction**: [`RestrictionMachine`] driving shields and schedules
//! - **API**: reqwest client for the remote balance/preferences service

pub mod api;
pub mod error;
pub mod ledger;
pub mod restriction;
pub mod reward;
pub mod storage;
pub mod sync;

pub use api::{ApiClient, BalanceService, PreferencesService};
pub use error::{ApiError, ConfigError, CoreError, RestrictionError, StoreError, ValidationError};
pub use ledger::{Ledger, LedgerSnapshot, RemoteValue};
pub use restriction::{
    MonitoringSchedule, ReapplyPolicy, RestrictionMachine, RestrictionPlatform,
    RestrictionSelection, RestrictionState, StorePlatform,
};
pub use reward::{derive_focus, reward_minutes, Derivation, FocusMode};
pub use storage::{Config, Database, KeyValueStore, LocalCache, MemoryStore, SharedLedger};
pub use sync::{BalanceReconciler, PreferenceReconciler, SyncOutcome};
