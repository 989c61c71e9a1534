//! OS restriction capability.
//!
//! The real blocker lives outside this crate; [`RestrictionPlatform`] is the
//! seam. [`StorePlatform`] records what would be blocked and scheduled in a
//! key/value store so the CLI (and tests) have a concrete implementation.

use std::collections::BTreeMap;

use thiserror::Error;

use super::{MonitoringSchedule, RestrictionSelection};
use crate::error::StoreError;
use crate::storage::KeyValueStore;

const KEY_SHIELDED: &str = "platform.shieldedSelection";
const KEY_SCHEDULES: &str = "platform.schedules";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct PlatformError {
    pub operation: &'static str,
    pub message: String,
}

impl PlatformError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Register a schedule + threshold, receive a callback when reached.
///
/// Callbacks arrive out of band: whichever process the OS wakes calls
/// [`super::RestrictionMachine::threshold_reached`] or
/// [`super::RestrictionMachine::interval_ended`].
pub trait RestrictionPlatform: Send + Sync {
    fn register_schedule(&self, schedule: &MonitoringSchedule) -> Result<(), PlatformError>;

    fn cancel_schedule(&self, activity_id: &str) -> Result<(), PlatformError>;

    fn apply_restriction(&self, selection: &RestrictionSelection) -> Result<(), PlatformError>;

    fn clear_restriction(&self) -> Result<(), PlatformError>;
}

/// Platform that persists shield and schedule state in a key/value store.
#[derive(Debug, Clone)]
pub struct StorePlatform<S> {
    store: S,
}

impl<S: KeyValueStore> StorePlatform<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Selection currently shielded, if any.
    pub fn shielded(&self) -> Result<Option<RestrictionSelection>, PlatformError> {
        let raw = self
            .store
            .get(KEY_SHIELDED)
            .map_err(|e| store_failure("read shields", e))?;
        raw.map(|raw| serde_json::from_str::<RestrictionSelection>(&raw))
            .transpose()
            .map_err(|e| PlatformError::new("read shields", e.to_string()))
    }

    pub fn schedules(&self) -> Result<BTreeMap<String, MonitoringSchedule>, PlatformError> {
        match self
            .store
            .get(KEY_SCHEDULES)
            .map_err(|e| store_failure("read schedules", e))?
        {
            None => Ok(BTreeMap::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| PlatformError::new("read schedules", e.to_string())),
        }
    }

    fn write_schedules(
        &self,
        operation: &'static str,
        schedules: &BTreeMap<String, MonitoringSchedule>,
    ) -> Result<(), PlatformError> {
        let raw = serde_json::to_string(schedules)
            .map_err(|e| PlatformError::new(operation, e.to_string()))?;
        self.store
            .set(KEY_SCHEDULES, &raw)
            .map_err(|e| store_failure(operation, e))
    }
}

impl<S: KeyValueStore> RestrictionPlatform for StorePlatform<S> {
    fn register_schedule(&self, schedule: &MonitoringSchedule) -> Result<(), PlatformError> {
        let mut schedules = self.schedules()?;
        schedules.insert(schedule.activity_id.clone(), schedule.clone());
        self.write_schedules("register schedule", &schedules)
    }

    fn cancel_schedule(&self, activity_id: &str) -> Result<(), PlatformError> {
        let mut schedules = self.schedules()?;
        if schedules.remove(activity_id).is_some() {
            self.write_schedules("cancel schedule", &schedules)?;
        }
        Ok(())
    }

    fn apply_restriction(&self, selection: &RestrictionSelection) -> Result<(), PlatformError> {
        let raw = serde_json::to_string(selection)
            .map_err(|e| PlatformError::new("apply restriction", e.to_string()))?;
        self.store
            .set(KEY_SHIELDED, &raw)
            .map_err(|e| store_failure("apply restriction", e))
    }

    fn clear_restriction(&self) -> Result<(), PlatformError> {
        self.store
            .remove(KEY_SHIELDED)
            .map_err(|e| store_failure("clear restriction", e))
    }
}

fn store_failure(operation: &'static str, err: StoreError) -> PlatformError {
    PlatformError::new(operation, err.to_string())
}
