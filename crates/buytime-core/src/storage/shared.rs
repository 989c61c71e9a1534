//! Shared Ledger Store: typed access to the keys every execution context
//! (foreground app, monitor callback, overlay callback) reads and writes.
//!
//! Every accessor goes back to the underlying store; nothing is cached, so a
//! value read here is only as fresh as the moment it was read. Another
//! process may write in between a read and a dependent write. Callers that
//! resume after a suspension must re-read.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::KeyValueStore;
use crate::error::StoreError;
use crate::ledger::clamp_minutes;
use crate::restriction::{MonitoringSchedule, RestrictionSelection};

pub const KEY_AVAILABLE_MINUTES: &str = "availableMinutes";
pub const KEY_EARNED_EVENT_ACTIVE: &str = "earnedEventActive";
pub const KEY_SPEND_UNIT_MINUTES: &str = "spendUnitMinutes";
pub const KEY_BLOCKED_SELECTION: &str = "blockedSelection";
pub const KEY_ACTIVE_SCHEDULE: &str = "activeSchedule";
pub const KEY_REAPPLY_PENDING: &str = "reapplyPending";

pub const DEFAULT_SPEND_UNIT_MINUTES: u32 = 5;

/// Typed view over the shared store.
#[derive(Debug, Clone)]
pub struct SharedLedger<S> {
    store: S,
}

impl<S: KeyValueStore> SharedLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Balance ──────────────────────────────────────────────────────

    /// Current balance; 0 when never written.
    pub fn available_minutes(&self) -> Result<u32, StoreError> {
        match self.store.get(KEY_AVAILABLE_MINUTES)? {
            None => Ok(0),
            Some(raw) => {
                let value: i64 = parse(KEY_AVAILABLE_MINUTES, &raw)?;
                Ok(clamp_minutes(value))
            }
        }
    }

    /// Writes the balance, clamping negatives to 0. Returns the stored value.
    pub fn set_available_minutes(&self, minutes: i64) -> Result<u32, StoreError> {
        let clamped = clamp_minutes(minutes);
        self.store
            .set(KEY_AVAILABLE_MINUTES, &clamped.to_string())?;
        Ok(clamped)
    }

    /// Read-modify-write of the balance.
    ///
    /// Two processes adjusting concurrently can lose one update. The
    /// foreground delta sync reconciles the survivor against the remote, so
    /// the window is bounded by the next foreground transition.
    pub fn adjust_available_minutes(&self, delta: i64) -> Result<u32, StoreError> {
        let current = self.available_minutes()? as i64;
        self.set_available_minutes(current.saturating_add(delta))
    }

    // ── Flags ────────────────────────────────────────────────────────

    pub fn earned_event_active(&self) -> Result<bool, StoreError> {
        match self.store.get(KEY_EARNED_EVENT_ACTIVE)? {
            None => Ok(false),
            Some(raw) => parse(KEY_EARNED_EVENT_ACTIVE, &raw),
        }
    }

    pub fn set_earned_event_active(&self, active: bool) -> Result<(), StoreError> {
        self.store
            .set(KEY_EARNED_EVENT_ACTIVE, if active { "true" } else { "false" })
    }

    /// Minutes debited per spend. Falls back to the default when absent or
    /// not a positive integer.
    pub fn spend_unit_minutes(&self) -> Result<u32, StoreError> {
        let value = self
            .store
            .get(KEY_SPEND_UNIT_MINUTES)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|v| *v > 0);
        Ok(value.map(clamp_minutes).unwrap_or(DEFAULT_SPEND_UNIT_MINUTES))
    }

    pub fn set_spend_unit_minutes(&self, minutes: u32) -> Result<u32, StoreError> {
        let minutes = minutes.max(1);
        self.store
            .set(KEY_SPEND_UNIT_MINUTES, &minutes.to_string())?;
        Ok(minutes)
    }

    // ── Restriction data ─────────────────────────────────────────────

    /// The user's blocked selection. A blob that fails to decode is logged
    /// and treated as empty.
    pub fn selection(&self) -> Result<RestrictionSelection, StoreError> {
        match self.store.get(KEY_BLOCKED_SELECTION)? {
            None => Ok(RestrictionSelection::default()),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(selection) => Ok(selection),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode blocked selection");
                    Ok(RestrictionSelection::default())
                }
            },
        }
    }

    pub fn set_selection(&self, selection: &RestrictionSelection) -> Result<(), StoreError> {
        self.set_json(KEY_BLOCKED_SELECTION, selection)
    }

    pub fn active_schedule(&self) -> Result<Option<MonitoringSchedule>, StoreError> {
        self.get_json(KEY_ACTIVE_SCHEDULE)
    }

    pub fn set_active_schedule(
        &self,
        schedule: Option<&MonitoringSchedule>,
    ) -> Result<(), StoreError> {
        match schedule {
            Some(schedule) => self.set_json(KEY_ACTIVE_SCHEDULE, schedule),
            None => self.store.remove(KEY_ACTIVE_SCHEDULE),
        }
    }

    /// Set when shields could not be re-applied and the fail-open policy
    /// deferred the retry.
    pub fn reapply_pending(&self) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get(KEY_REAPPLY_PENDING)?
            .is_some_and(|raw| raw.trim() == "true"))
    }

    pub fn set_reapply_pending(&self, pending: bool) -> Result<(), StoreError> {
        if pending {
            self.store.set(KEY_REAPPLY_PENDING, "true")
        } else {
            self.store.remove(KEY_REAPPLY_PENDING)
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| corrupt(key, e)),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|e| corrupt(key, e))?;
        self.store.set(key, &raw)
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn corrupt(key: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        key: key.to_string(),
        message: err.to_string(),
    }
}
