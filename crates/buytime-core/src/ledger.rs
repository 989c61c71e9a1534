//! The time-balance ledger.
//!
//! [`Ledger`] stitches the Shared Ledger Store (visible to every execution
//! context) together with the foreground-only confirmed remote value into a
//! single [`LedgerSnapshot`].

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::storage::{KeyValueStore, LocalCache, SharedLedger};

/// Last balance the remote service confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum RemoteValue {
    #[default]
    Unsynced,
    Confirmed(i64),
}

impl RemoteValue {
    pub fn confirmed(self) -> Option<i64> {
        match self {
            RemoteValue::Confirmed(v) => Some(v),
            RemoteValue::Unsynced => None,
        }
    }

    pub fn is_unsynced(self) -> bool {
        matches!(self, RemoteValue::Unsynced)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub available_minutes: u32,
    pub last_confirmed_remote_value: RemoteValue,
    pub spend_unit_minutes: u32,
    pub earned_event_active: bool,
}

impl LedgerSnapshot {
    /// Unconfirmed local earn/spend activity. `None` until the first sync.
    pub fn pending_delta(&self) -> Option<i64> {
        self.last_confirmed_remote_value
            .confirmed()
            .map(|confirmed| (self.available_minutes as i64).saturating_sub(confirmed))
    }
}

/// Clamps a signed minute count into the ledger's `u32` domain.
pub fn clamp_minutes(minutes: i64) -> u32 {
    minutes.clamp(0, u32::MAX as i64) as u32
}

/// Combined view of shared and local ledger state.
#[derive(Debug, Clone)]
pub struct Ledger<S, C> {
    shared: SharedLedger<S>,
    cache: LocalCache<C>,
}

impl<S: KeyValueStore, C: KeyValueStore> Ledger<S, C> {
    pub fn new(shared: S, cache: C) -> Self {
        Self {
            shared: SharedLedger::new(shared),
            cache: LocalCache::new(cache),
        }
    }

    pub fn shared(&self) -> &SharedLedger<S> {
        &self.shared
    }

    pub fn cache(&self) -> &LocalCache<C> {
        &self.cache
    }

    pub fn get(&self) -> Result<LedgerSnapshot, StoreError> {
        Ok(LedgerSnapshot {
            available_minutes: self.shared.available_minutes()?,
            last_confirmed_remote_value: self.cache.last_confirmed_remote_value()?,
            spend_unit_minutes: self.shared.spend_unit_minutes()?,
            earned_event_active: self.shared.earned_event_active()?,
        })
    }

    /// Writes every field of the snapshot, one key at a time.
    pub fn set(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        self.shared
            .set_available_minutes(snapshot.available_minutes as i64)?;
        self.cache
            .set_last_confirmed_remote_value(snapshot.last_confirmed_remote_value)?;
        self.shared
            .set_spend_unit_minutes(snapshot.spend_unit_minutes)?;
        self.shared
            .set_earned_event_active(snapshot.earned_event_active)
    }

    /// Records a value the remote confirmed as both local balance and
    /// confirmed baseline.
    pub fn accept_remote(&self, confirmed: i64) -> Result<u32, StoreError> {
        let stored = self.shared.set_available_minutes(confirmed)?;
        self.cache
            .set_last_confirmed_remote_value(RemoteValue::Confirmed(confirmed))?;
        Ok(stored)
    }

    /// Overwrites the balance and forgets the confirmed baseline so the next
    /// sync re-seeds from the remote instead of pushing a delta.
    pub fn reset_balance(&self, minutes: u32) -> Result<u32, StoreError> {
        let stored = self.shared.set_available_minutes(minutes as i64)?;
        self.cache
            .set_last_confirmed_remote_value(RemoteValue::Unsynced)?;
        Ok(stored)
    }
}
