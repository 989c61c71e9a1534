//! Restriction state machine.
//!
//! ## State Transitions
//!
//! ```text
//!              spend (balance >= unit)
//! Restricted ───────────────────────────▶ Monitoring
//!     ▲                                       │
//!     └────── threshold reached / interval ended
//!
//! setup(empty selection) ──▶ Unrestricted
//! ```
//!
//! The overlay process calls [`RestrictionMachine::spend`]; the monitor
//! process receives the OS callbacks. Neither shares memory with the other,
//! so the machine re-derives its state from the shared store on every call.
//!
//! ## Re-application failures
//!
//! When shields cannot be re-applied after a window closes, the
//! [`ReapplyPolicy`] decides the outcome. `FailClosed` logs the error and
//! records the ledger as restricted anyway, so a flaky OS call never leaves
//! the user unblocked indefinitely. `FailOpen` leaves the earned flag set,
//! marks a pending re-application and reports `Unrestricted` until
//! [`RestrictionMachine::retry_reapply`] (or the daily blocker interval)
//! succeeds.

use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{MonitoringSchedule, RestrictionPlatform, RestrictionSelection};
use crate::error::{RestrictionError, StoreError};
use crate::storage::{KeyValueStore, RestrictionConfig, SharedLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReapplyPolicy {
    #[default]
    FailClosed,
    FailOpen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RestrictionState {
    /// No shields applied: nothing selected, or a deferred re-application.
    Unrestricted,
    /// Shields applied, no window open.
    Restricted,
    /// Shields lifted while an earned window runs.
    Monitoring { schedule: MonitoringSchedule },
}

/// Outcome of an OS callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Window closed and shields are back (or assumed back under fail-closed).
    Relocked,
    /// Shields could not be re-applied; retry pending (fail-open only).
    ReapplyDeferred,
    /// Callback did not match the open window.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendReceipt {
    pub debited_minutes: u32,
    pub available_minutes: u32,
    pub schedule: MonitoringSchedule,
}

pub struct RestrictionMachine<S, P> {
    ledger: SharedLedger<S>,
    platform: P,
    policy: ReapplyPolicy,
    earned_activity_id: String,
    blocker_activity_id: String,
}

impl<S: KeyValueStore, P: RestrictionPlatform> RestrictionMachine<S, P> {
    pub fn new(store: S, platform: P, config: &RestrictionConfig) -> Self {
        Self {
            ledger: SharedLedger::new(store),
            platform,
            policy: config.reapply_policy,
            earned_activity_id: config.earned_activity_id.clone(),
            blocker_activity_id: config.blocker_activity_id.clone(),
        }
    }

    pub fn with_policy(mut self, policy: ReapplyPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn ledger(&self) -> &SharedLedger<S> {
        &self.ledger
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn policy(&self) -> ReapplyPolicy {
        self.policy
    }

    pub fn state(&self) -> Result<RestrictionState, StoreError> {
        if let Some(schedule) = self.ledger.active_schedule()? {
            if self.ledger.earned_event_active()? {
                return Ok(RestrictionState::Monitoring { schedule });
            }
        }
        if self.ledger.reapply_pending()? {
            return Ok(RestrictionState::Unrestricted);
        }
        if self.ledger.selection()?.is_empty() {
            Ok(RestrictionState::Unrestricted)
        } else {
            Ok(RestrictionState::Restricted)
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// First-run setup: stores the selection, applies it and starts the
    /// daily blocker schedule. An open window is left alone; the new
    /// selection takes effect when it closes.
    pub fn setup(
        &self,
        selection: &RestrictionSelection,
    ) -> Result<RestrictionState, RestrictionError> {
        self.ledger.set_selection(selection)?;

        if let RestrictionState::Monitoring { .. } = self.state()? {
            tracing::info!("selection updated while a window is open");
            return Ok(self.state()?);
        }

        if selection.is_empty() {
            self.platform.clear_restriction()?;
            if let Err(e) = self.platform.cancel_schedule(&self.blocker_activity_id) {
                tracing::warn!(error = %e, "failed to stop blocker schedule");
            }
        } else {
            self.platform.apply_restriction(selection)?;
            let blocker = MonitoringSchedule::daily(self.blocker_activity_id.clone());
            if let Err(e) = self.platform.register_schedule(&blocker) {
                tracing::warn!(error = %e, "failed to start blocker schedule");
            }
            tracing::info!(targets = selection.len(), "restrictions applied");
        }
        self.settle_deferred_reapply()?;
        Ok(self.state()?)
    }

    /// Settings edit: persists the selection and swaps the shields for it
    /// right away. An open window is left alone, as is the blocker schedule.
    pub fn update_selection(
        &self,
        selection: &RestrictionSelection,
    ) -> Result<RestrictionState, RestrictionError> {
        let monitoring = matches!(self.state()?, RestrictionState::Monitoring { .. });
        self.ledger.set_selection(selection)?;
        if monitoring {
            return Ok(self.state()?);
        }

        if selection.is_empty() {
            self.platform.clear_restriction()?;
        } else {
            self.platform.apply_restriction(selection)?;
        }
        self.settle_deferred_reapply()?;
        tracing::info!(targets = selection.len(), "selection updated");
        Ok(self.state()?)
    }

    /// Debits one spend unit and lifts every shield until `amount` minutes
    /// of usage accrue.
    pub fn spend(&self, amount: u32) -> Result<SpendReceipt, RestrictionError> {
        self.spend_at(amount, Local::now().time())
    }

    pub fn spend_at(&self, amount: u32, now: NaiveTime) -> Result<SpendReceipt, RestrictionError> {
        if amount == 0 {
            return Err(RestrictionError::InvalidAmount);
        }
        match self.state()? {
            RestrictionState::Restricted => {}
            RestrictionState::Monitoring { schedule } => {
                return Err(RestrictionError::AlreadyUnlocked {
                    activity_id: schedule.activity_id,
                });
            }
            RestrictionState::Unrestricted => return Err(RestrictionError::NotRestricted),
        }

        let available = self.ledger.available_minutes()?;
        let unit = self.ledger.spend_unit_minutes()?;
        if available < unit {
            tracing::info!(available, required = unit, "spend refused");
            return Err(RestrictionError::InsufficientBalance {
                available,
                required: unit,
            });
        }

        // Register first: if the OS refuses, nothing has been debited or lifted.
        let schedule = MonitoringSchedule::earned_window(self.earned_activity_id.clone(), now, amount);
        self.platform.register_schedule(&schedule)?;

        let remaining = self.ledger.adjust_available_minutes(-(unit as i64))?;

        if let Err(e) = self.platform.clear_restriction() {
            tracing::warn!(error = %e, "failed to lift shields, refunding spend");
            self.ledger.adjust_available_minutes(unit as i64)?;
            if let Err(cancel) = self.platform.cancel_schedule(&schedule.activity_id) {
                tracing::warn!(error = %cancel, "failed to cancel earned window");
            }
            return Err(e.into());
        }

        let recorded = self
            .ledger
            .set_active_schedule(Some(&schedule))
            .and_then(|()| self.ledger.set_earned_event_active(true));
        if let Err(e) = recorded {
            tracing::warn!(error = %e, "failed to record earned window, undoing spend");
            self.undo_spend(&schedule, unit);
            return Err(e.into());
        }

        tracing::info!(
            debited = unit,
            remaining,
            threshold = amount,
            "shields lifted"
        );
        Ok(SpendReceipt {
            debited_minutes: unit,
            available_minutes: remaining,
            schedule,
        })
    }

    /// OS callback: usage reached the window's threshold.
    pub fn threshold_reached(&self, activity_id: &str) -> Result<Transition, RestrictionError> {
        match self.open_window(activity_id)? {
            Some(schedule) => self.relock(&schedule, true),
            None => {
                tracing::debug!(activity_id, "threshold callback for unknown window");
                Ok(Transition::Ignored)
            }
        }
    }

    /// OS callback: the window's interval ended before the threshold.
    ///
    /// Repeating schedules re-arm on their own and are not cancelled. The
    /// daily blocker interval doubles as a retry point for deferred
    /// re-applications.
    pub fn interval_ended(&self, activity_id: &str) -> Result<Transition, RestrictionError> {
        if let Some(schedule) = self.open_window(activity_id)? {
            return self.relock(&schedule, !schedule.repeats);
        }
        if activity_id == self.blocker_activity_id && self.ledger.reapply_pending()? {
            return self.retry_reapply();
        }
        tracing::debug!(activity_id, "interval callback for unknown window");
        Ok(Transition::Ignored)
    }

    /// Retries a re-application deferred by the fail-open policy.
    pub fn retry_reapply(&self) -> Result<Transition, RestrictionError> {
        if !self.ledger.reapply_pending()? {
            return Ok(Transition::Ignored);
        }
        self.reapply()
    }

    /// The recorded window matching `activity_id`. The earned flag is not
    /// consulted: a schedule on record always gets its shields back.
    fn open_window(&self, activity_id: &str) -> Result<Option<MonitoringSchedule>, StoreError> {
        Ok(self
            .ledger
            .active_schedule()?
            .filter(|schedule| schedule.activity_id == activity_id))
    }

    /// Best-effort rollback of a spend whose ledger writes failed after the
    /// shields were lifted.
    fn undo_spend(&self, schedule: &MonitoringSchedule, unit: u32) {
        if let Err(e) = self.ledger.adjust_available_minutes(unit as i64) {
            tracing::error!(error = %e, "failed to refund spend");
        }
        match self.ledger.selection() {
            Ok(selection) if !selection.is_empty() => {
                if let Err(e) = self.platform.apply_restriction(&selection) {
                    tracing::error!(error = %e, "failed to restore shields");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "failed to read selection"),
        }
        if let Err(e) = self.platform.cancel_schedule(&schedule.activity_id) {
            tracing::warn!(error = %e, "failed to cancel earned window");
        }
        if let Err(e) = self.ledger.set_active_schedule(None) {
            tracing::warn!(error = %e, "failed to forget earned window");
        }
        if let Err(e) = self.ledger.set_earned_event_active(false) {
            tracing::warn!(error = %e, "failed to reset earned flag");
        }
    }

    /// Shields are in place again, which settles a deferred re-apply.
    fn settle_deferred_reapply(&self) -> Result<(), StoreError> {
        if self.ledger.reapply_pending()? {
            self.ledger.set_earned_event_active(false)?;
            self.ledger.set_reapply_pending(false)?;
        }
        Ok(())
    }

    fn relock(
        &self,
        schedule: &MonitoringSchedule,
        cancel: bool,
    ) -> Result<Transition, RestrictionError> {
        if cancel {
            if let Err(e) = self.platform.cancel_schedule(&schedule.activity_id) {
                tracing::warn!(error = %e, activity_id = %schedule.activity_id, "failed to cancel schedule");
            }
        }
        self.ledger.set_active_schedule(None)?;
        self.reapply()
    }

    fn reapply(&self) -> Result<Transition, RestrictionError> {
        let selection = self.ledger.selection()?;
        let applied = if selection.is_empty() {
            self.platform.clear_restriction()
        } else {
            self.platform.apply_restriction(&selection)
        };

        match (applied, self.policy) {
            (Ok(()), _) => {
                self.ledger.set_earned_event_active(false)?;
                self.ledger.set_reapply_pending(false)?;
                tracing::info!("shields re-applied");
                Ok(Transition::Relocked)
            }
            (Err(e), ReapplyPolicy::FailClosed) => {
                tracing::error!(error = %e, "shield re-application failed; recording as restricted");
                self.ledger.set_earned_event_active(false)?;
                self.ledger.set_reapply_pending(false)?;
                Ok(Transition::Relocked)
            }
            (Err(e), ReapplyPolicy::FailOpen) => {
                tracing::warn!(error = %e, "shield re-application failed; retry pending");
                self.ledger.set_reapply_pending(true)?;
                Ok(Transition::ReapplyDeferred)
            }
        }
    }
}
