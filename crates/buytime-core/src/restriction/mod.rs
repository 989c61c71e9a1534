//! Restriction state machine and its collaborators.
//!
//! The machine spans the monitor and overlay processes, so it holds no state
//! of its own: every call reconstructs the current [`RestrictionState`] from
//! the Shared Ledger Store and writes the result back there.

mod machine;
mod platform;
mod schedule;
mod selection;

pub use machine::{ReapplyPolicy, RestrictionMachine, RestrictionState, SpendReceipt, Transition};
pub use platform::{PlatformError, RestrictionPlatform, StorePlatform};
pub use schedule::MonitoringSchedule;
pub use selection::RestrictionSelection;
