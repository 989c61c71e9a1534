//! Integration tests for the restriction state machine.
//!
//! The platform here wraps [`StorePlatform`] with switchable failures so the
//! re-apply policies can be exercised. [`FlakyStore`] does the same for
//! writes to the shared ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use buytime_core::error::{RestrictionError, StoreError};
use buytime_core::restriction::{
    MonitoringSchedule, PlatformError, ReapplyPolicy, RestrictionMachine, RestrictionPlatform,
    RestrictionSelection, RestrictionState, StorePlatform, Transition,
};
use buytime_core::storage::{KeyValueStore, MemoryStore, RestrictionConfig};
use chrono::NaiveTime;

#[derive(Clone)]
struct FlakyPlatform {
    inner: StorePlatform<MemoryStore>,
    fail_apply: Arc<AtomicBool>,
    fail_clear: Arc<AtomicBool>,
    fail_register: Arc<AtomicBool>,
}

impl FlakyPlatform {
    fn new() -> Self {
        Self {
            inner: StorePlatform::new(MemoryStore::new()),
            fail_apply: Arc::new(AtomicBool::new(false)),
            fail_clear: Arc::new(AtomicBool::new(false)),
            fail_register: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RestrictionPlatform for FlakyPlatform {
    fn register_schedule(&self, schedule: &MonitoringSchedule) -> Result<(), PlatformError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(PlatformError::new("register schedule", "quota exceeded"));
        }
        self.inner.register_schedule(schedule)
    }

    fn cancel_schedule(&self, activity_id: &str) -> Result<(), PlatformError> {
        self.inner.cancel_schedule(activity_id)
    }

    fn apply_restriction(&self, selection: &RestrictionSelection) -> Result<(), PlatformError> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(PlatformError::new("apply restriction", "authorization revoked"));
        }
        self.inner.apply_restriction(selection)
    }

    fn clear_restriction(&self) -> Result<(), PlatformError> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(PlatformError::new("clear restriction", "store unavailable"));
        }
        self.inner.clear_restriction()
    }
}

/// Shared store whose writes to one key can be made to fail.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing_key: Arc<Mutex<Option<String>>>,
}

impl FlakyStore {
    fn fail_writes_to(&self, key: Option<&str>) {
        *self.failing_key.lock().unwrap() = key.map(str::to_string);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.failing_key.lock().unwrap().as_deref() == Some(key) {
            return Err(StoreError::QueryFailed(format!("disk full writing {key}")));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

const EARNED: &str = "com.buytime.earnedTime";
const BLOCKER: &str = "com.buytime.blockerActivity";

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap()
}

fn selection() -> RestrictionSelection {
    let mut selection = RestrictionSelection::default();
    selection.applications.insert("app.social".into());
    selection.web_domains.insert("video.example".into());
    selection
}

fn restricted(
    policy: ReapplyPolicy,
    balance: i64,
) -> (RestrictionMachine<MemoryStore, FlakyPlatform>, FlakyPlatform) {
    let platform = FlakyPlatform::new();
    let machine = RestrictionMachine::new(
        MemoryStore::new(),
        platform.clone(),
        &RestrictionConfig::default(),
    )
    .with_policy(policy);
    machine.setup(&selection()).unwrap();
    machine.ledger().set_available_minutes(balance).unwrap();
    (machine, platform)
}

#[test]
fn test_spend_then_threshold_relocks() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 12);

    let receipt = m.spend_at(15, noon()).unwrap();
    assert_eq!(receipt.debited_minutes, 5);
    assert_eq!(receipt.available_minutes, 7);
    assert_eq!(receipt.schedule.threshold_minutes, Some(15));
    assert_eq!(platform.inner.shielded().unwrap(), None);
    assert!(matches!(m.state().unwrap(), RestrictionState::Monitoring { .. }));
    assert!(m.ledger().earned_event_active().unwrap());

    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::Relocked);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert_eq!(platform.inner.shielded().unwrap(), Some(selection()));
    assert!(!platform.inner.schedules().unwrap().contains_key(EARNED));
    assert!(!m.ledger().earned_event_active().unwrap());
}

#[test]
fn test_interval_end_relocks() {
    let (m, _) = restricted(ReapplyPolicy::FailClosed, 10);
    m.spend_at(30, noon()).unwrap();
    assert_eq!(m.interval_ended(EARNED).unwrap(), Transition::Relocked);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
}

#[test]
fn test_insufficient_balance_refuses_spend() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 4);

    let err = m.spend_at(15, noon()).unwrap_err();
    assert!(matches!(
        err,
        RestrictionError::InsufficientBalance {
            available: 4,
            required: 5
        }
    ));
    assert_eq!(m.ledger().available_minutes().unwrap(), 4);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert_eq!(platform.inner.shielded().unwrap(), Some(selection()));
}

#[test]
fn test_custom_spend_unit() {
    let (m, _) = restricted(ReapplyPolicy::FailClosed, 12);
    m.ledger().set_spend_unit_minutes(10).unwrap();
    assert_eq!(m.spend_at(10, noon()).unwrap().available_minutes, 2);
}

#[test]
fn test_stale_callbacks_are_ignored() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 20);

    // No window open yet.
    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::Ignored);

    m.spend_at(15, noon()).unwrap();
    assert_eq!(m.threshold_reached("com.other.activity").unwrap(), Transition::Ignored);
    assert_eq!(m.interval_ended(BLOCKER).unwrap(), Transition::Ignored);
    assert!(matches!(m.state().unwrap(), RestrictionState::Monitoring { .. }));
    assert_eq!(platform.inner.shielded().unwrap(), None);

    // Duplicate delivery after the window closed.
    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::Relocked);
    assert_eq!(m.interval_ended(EARNED).unwrap(), Transition::Ignored);
    assert_eq!(m.ledger().available_minutes().unwrap(), 15);
}

#[test]
fn test_register_failure_debits_nothing() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 20);
    platform.fail_register.store(true, Ordering::SeqCst);

    assert!(matches!(m.spend_at(15, noon()), Err(RestrictionError::Platform(_))));
    assert_eq!(m.ledger().available_minutes().unwrap(), 20);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
}

#[test]
fn test_clear_failure_refunds_spend() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 20);
    platform.fail_clear.store(true, Ordering::SeqCst);

    assert!(matches!(m.spend_at(15, noon()), Err(RestrictionError::Platform(_))));
    assert_eq!(m.ledger().available_minutes().unwrap(), 20);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert!(!platform.inner.schedules().unwrap().contains_key(EARNED));
}

#[test]
fn test_fail_closed_records_restricted_when_reapply_fails() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 20);
    m.spend_at(15, noon()).unwrap();
    platform.fail_apply.store(true, Ordering::SeqCst);

    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::Relocked);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert!(!m.ledger().earned_event_active().unwrap());
    assert!(!m.ledger().reapply_pending().unwrap());
}

#[test]
fn test_fail_open_defers_until_retry_succeeds() {
    let (m, platform) = restricted(ReapplyPolicy::FailOpen, 20);
    m.spend_at(15, noon()).unwrap();
    platform.fail_apply.store(true, Ordering::SeqCst);

    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::ReapplyDeferred);
    assert_eq!(m.state().unwrap(), RestrictionState::Unrestricted);
    assert!(m.ledger().earned_event_active().unwrap());
    assert!(matches!(m.spend_at(15, noon()), Err(RestrictionError::NotRestricted)));

    // Still failing: stays deferred.
    assert_eq!(m.retry_reapply().unwrap(), Transition::ReapplyDeferred);

    // The daily blocker interval retries once the platform recovers.
    platform.fail_apply.store(false, Ordering::SeqCst);
    assert_eq!(m.interval_ended(BLOCKER).unwrap(), Transition::Relocked);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert!(!m.ledger().earned_event_active().unwrap());
    assert_eq!(m.retry_reapply().unwrap(), Transition::Ignored);
}

#[test]
fn test_setup_while_monitoring_keeps_window_open() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 20);
    m.spend_at(15, noon()).unwrap();

    let mut wider = selection();
    wider.categories.insert("games".into());
    assert!(matches!(m.setup(&wider).unwrap(), RestrictionState::Monitoring { .. }));
    assert_eq!(platform.inner.shielded().unwrap(), None);

    m.threshold_reached(EARNED).unwrap();
    assert_eq!(platform.inner.shielded().unwrap(), Some(wider));
}

#[test]
fn test_clearing_selection_unrestricts() {
    let (m, platform) = restricted(ReapplyPolicy::FailClosed, 20);
    assert_eq!(
        m.setup(&RestrictionSelection::default()).unwrap(),
        RestrictionState::Unrestricted
    );
    assert_eq!(platform.inner.shielded().unwrap(), None);
    assert!(!platform.inner.schedules().unwrap().contains_key(BLOCKER));
}

fn restricted_on(
    store: FlakyStore,
    balance: i64,
) -> (RestrictionMachine<FlakyStore, FlakyPlatform>, FlakyPlatform) {
    let platform = FlakyPlatform::new();
    let machine = RestrictionMachine::new(store, platform.clone(), &RestrictionConfig::default());
    machine.setup(&selection()).unwrap();
    machine.ledger().set_available_minutes(balance).unwrap();
    (machine, platform)
}

#[test]
fn test_failed_flag_write_undoes_spend() {
    let store = FlakyStore::default();
    let (m, platform) = restricted_on(store.clone(), 20);
    store.fail_writes_to(Some("earnedEventActive"));

    assert!(matches!(m.spend_at(15, noon()), Err(RestrictionError::Store(_))));
    assert_eq!(m.ledger().available_minutes().unwrap(), 20);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert_eq!(platform.inner.shielded().unwrap(), Some(selection()));
    assert!(!platform.inner.schedules().unwrap().contains_key(EARNED));
    assert_eq!(m.ledger().active_schedule().unwrap(), None);
    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::Ignored);

    // Once the store recovers the same spend goes through.
    store.fail_writes_to(None);
    assert_eq!(m.spend_at(15, noon()).unwrap().available_minutes, 15);
}

#[test]
fn test_failed_schedule_write_undoes_spend() {
    let store = FlakyStore::default();
    let (m, platform) = restricted_on(store.clone(), 20);
    store.fail_writes_to(Some("activeSchedule"));

    assert!(m.spend_at(15, noon()).is_err());
    assert_eq!(m.ledger().available_minutes().unwrap(), 20);
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert_eq!(platform.inner.shielded().unwrap(), Some(selection()));
}

#[test]
fn test_recorded_window_relocks_without_earned_flag() {
    let store = FlakyStore::default();
    let (m, platform) = restricted_on(store.clone(), 20);
    m.spend_at(15, noon()).unwrap();

    // The flag was lost but the window is still on record.
    store.inner.remove("earnedEventActive").unwrap();
    assert_eq!(m.state().unwrap(), RestrictionState::Restricted);
    assert_eq!(platform.inner.shielded().unwrap(), None);

    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::Relocked);
    assert_eq!(platform.inner.shielded().unwrap(), Some(selection()));
    assert_eq!(m.ledger().active_schedule().unwrap(), None);
    assert_eq!(m.interval_ended(EARNED).unwrap(), Transition::Ignored);
}

#[test]
fn test_setup_settles_deferred_reapply() {
    let (m, platform) = restricted(ReapplyPolicy::FailOpen, 20);
    m.spend_at(15, noon()).unwrap();
    platform.fail_apply.store(true, Ordering::SeqCst);
    assert_eq!(m.threshold_reached(EARNED).unwrap(), Transition::ReapplyDeferred);

    platform.fail_apply.store(false, Ordering::SeqCst);
    assert_eq!(m.setup(&selection()).unwrap(), RestrictionState::Restricted);
    assert_eq!(platform.inner.shielded().unwrap(), Some(selection()));
    assert!(!m.ledger().earned_event_active().unwrap());
    assert!(!m.ledger().reapply_pending().unwrap());
    assert_eq!(m.spend_at(15, noon()).unwrap().available_minutes, 10);
}

#[test]
fn test_update_selection_settles_deferred_reapply() {
    let (m, platform) = restricted(ReapplyPolicy::FailOpen, 20);
    m.spend_at(15, noon()).unwrap();
    platform.fail_apply.store(true, Ordering::SeqCst);
    m.threshold_reached(EARNED).unwrap();

    platform.fail_apply.store(false, Ordering::SeqCst);
    assert_eq!(m.update_selection(&selection()).unwrap(), RestrictionState::Restricted);
    assert!(!m.ledger().earned_event_active().unwrap());
    assert!(!m.ledger().reapply_pending().unwrap());
}
