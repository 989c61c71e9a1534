//! Foreground-only cache: values the other execution contexts never touch.

use chrono::{DateTime, Utc};

use super::KeyValueStore;
use crate::error::StoreError;
use crate::ledger::RemoteValue;
use crate::reward::{clamp_focus_minutes, FocusMode};

pub const KEY_LAST_CONFIRMED_REMOTE_VALUE: &str = "balance.lastConfirmedRemoteValue";
pub const KEY_FOCUS_DURATION: &str = "preferences.focusDurationMinutes";
pub const KEY_FOCUS_MODE: &str = "preferences.focusMode";
pub const KEY_LAST_FETCHED_AT: &str = "preferences.lastFetchedAt";

#[derive(Debug, Clone)]
pub struct LocalCache<C> {
    store: C,
}

impl<C: KeyValueStore> LocalCache<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    /// Last balance the remote confirmed. Absent (or unreadable) means the
    /// ledger has never been synced.
    pub fn last_confirmed_remote_value(&self) -> Result<RemoteValue, StoreError> {
        Ok(self
            .store
            .get(KEY_LAST_CONFIRMED_REMOTE_VALUE)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(RemoteValue::Confirmed)
            .unwrap_or(RemoteValue::Unsynced))
    }

    pub fn set_last_confirmed_remote_value(&self, value: RemoteValue) -> Result<(), StoreError> {
        match value {
            RemoteValue::Confirmed(v) => self
                .store
                .set(KEY_LAST_CONFIRMED_REMOTE_VALUE, &v.to_string()),
            RemoteValue::Unsynced => self.store.remove(KEY_LAST_CONFIRMED_REMOTE_VALUE),
        }
    }

    /// Cached focus preferences, or `None` when the cache is empty.
    ///
    /// An unknown mode string falls back to the default mode rather than
    /// invalidating the whole entry.
    pub fn preferences(&self) -> Result<Option<(u32, FocusMode)>, StoreError> {
        let duration = match self
            .store
            .get(KEY_FOCUS_DURATION)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
        {
            Some(d) => clamp_focus_minutes(d),
            None => return Ok(None),
        };
        let mode = self
            .store
            .get(KEY_FOCUS_MODE)?
            .map(|raw| FocusMode::parse_or_default(&raw))
            .unwrap_or_default();
        Ok(Some((duration, mode)))
    }

    pub fn write_preferences(&self, duration: u32, mode: FocusMode) -> Result<(), StoreError> {
        self.store.set(KEY_FOCUS_DURATION, &duration.to_string())?;
        self.store.set(KEY_FOCUS_MODE, mode.as_str())
    }

    pub fn last_fetched_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .store
            .get(KEY_LAST_FETCHED_AT)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    pub fn stamp_fetched_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.store.set(KEY_LAST_FETCHED_AT, &at.to_rfc3339())
    }
}
