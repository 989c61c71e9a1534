//! Focus preference reconciler.
//!
//! Write path: every local change lands in memory and in the cache at once,
//! then a debounced push confirms it with the remote. A change arriving
//! inside the debounce window restarts the timer, so a burst of slider
//! movements produces one push carrying the final value.
//!
//! On push failure the state rolls back to the last remote-confirmed
//! snapshot (not the pre-edit value, which may be several edits stale) and a
//! transient error message is shown for a few seconds.
//!
//! Read path: `on_appear` refetches when the cache is empty or older than the
//! TTL, and only replaces local state when the remote actually differs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::types::{FetchOutcome, PushOutcome, SkipReason};
use crate::api::{PreferencesRecord, PreferencesService};
use crate::error::StoreError;
use crate::reward::{clamp_focus_minutes, derive_focus, reward_minutes, Derivation, FocusMode};
use crate::storage::{KeyValueStore, LocalCache, SyncConfig};

pub const SAVE_FAILED_MESSAGE: &str = "Couldn't save preferences. Check your connection.";

const DEFAULT_FOCUS_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceSnapshot {
    pub focus_duration_minutes: u32,
    pub focus_mode: FocusMode,
    pub reward_minutes: f64,
    pub last_confirmed_focus_duration_minutes: u32,
    pub last_confirmed_focus_mode: FocusMode,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
struct State {
    focus: u32,
    mode: FocusMode,
    confirmed_focus: u32,
    confirmed_mode: FocusMode,
    is_loading: bool,
    error_message: Option<String>,
    /// Bumped per error so a stale clear timer leaves a newer error alone.
    error_generation: u64,
}

struct Debounce {
    handle: JoinHandle<Option<PushOutcome>>,
    fired: Arc<AtomicBool>,
}

pub struct PreferenceReconciler<C, R> {
    inner: Arc<Inner<C, R>>,
}

struct Inner<C, R> {
    cache: LocalCache<C>,
    remote: R,
    debounce_window: Duration,
    error_display: Duration,
    ttl: chrono::Duration,
    state: Mutex<State>,
    pending: Mutex<Option<Debounce>>,
    /// Serializes pushes; a push that already fired is never cancelled.
    push_lock: tokio::sync::Mutex<()>,
}

impl<C, R> Clone for PreferenceReconciler<C, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, R> PreferenceReconciler<C, R>
where
    C: KeyValueStore + 'static,
    R: PreferencesService + 'static,
{
    /// Loads the cached preferences (or defaults) as both current and
    /// confirmed state.
    pub fn new(cache: LocalCache<C>, remote: R, config: &SyncConfig) -> Result<Self, StoreError> {
        let (focus, mode) = cache
            .preferences()?
            .unwrap_or((DEFAULT_FOCUS_MINUTES, FocusMode::default()));
        Ok(Self {
            inner: Arc::new(Inner {
                cache,
                remote,
                debounce_window: config.debounce(),
                error_display: config.error_display(),
                ttl: config.preferences_ttl(),
                state: Mutex::new(State {
                    focus,
                    mode,
                    confirmed_focus: focus,
                    confirmed_mode: mode,
                    is_loading: false,
                    error_message: None,
                    error_generation: 0,
                }),
                pending: Mutex::new(None),
                push_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn snapshot(&self) -> Result<PreferenceSnapshot, StoreError> {
        let last_fetched_at = self.inner.cache.last_fetched_at()?;
        let state = self.inner.state()?;
        Ok(PreferenceSnapshot {
            focus_duration_minutes: state.focus,
            focus_mode: state.mode,
            reward_minutes: reward_minutes(state.focus as f64, state.mode),
            last_confirmed_focus_duration_minutes: state.confirmed_focus,
            last_confirmed_focus_mode: state.confirmed_mode,
            last_fetched_at,
            is_loading: state.is_loading,
            error_message: state.error_message.clone(),
        })
    }

    // ── Read path ────────────────────────────────────────────────────

    pub async fn on_appear(&self) -> Result<FetchOutcome, StoreError> {
        self.on_appear_at(Utc::now()).await
    }

    pub async fn on_appear_at(&self, now: DateTime<Utc>) -> Result<FetchOutcome, StoreError> {
        let cache = &self.inner.cache;
        let empty = cache.preferences()?.is_none();
        let stale = match cache.last_fetched_at()? {
            None => true,
            Some(at) => now - at > self.inner.ttl,
        };
        if !empty && !stale {
            tracing::debug!("preference cache fresh");
            return Ok(FetchOutcome::Skipped {
                reason: SkipReason::CacheFresh,
            });
        }

        if empty {
            self.inner.state()?.is_loading = true;
        }
        let fetched = self.inner.remote.get_preferences().await;
        if empty {
            self.inner.state()?.is_loading = false;
        }

        let record = match fetched {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "preference fetch failed; serving cache");
                return Ok(FetchOutcome::Failed { kind: e.kind() });
            }
        };
        let (focus, mode) = normalize(&record);

        let (changed, focus, mode) = {
            let mut state = self.inner.state()?;
            let changed = state.focus != focus || state.mode != mode;
            if changed {
                state.focus = focus;
                state.mode = mode;
            }
            state.confirmed_focus = state.focus;
            state.confirmed_mode = state.mode;
            (changed, state.focus, state.mode)
        };
        cache.write_preferences(focus, mode)?;
        cache.stamp_fetched_at(now)?;

        if changed {
            tracing::info!(focus, %mode, "preferences updated from remote");
            Ok(FetchOutcome::Updated)
        } else {
            Ok(FetchOutcome::Unchanged)
        }
    }

    // ── Write path ───────────────────────────────────────────────────

    /// Applies a local edit and schedules the debounced push.
    /// Must be called inside a Tokio runtime.
    pub fn on_preference_changed(&self, focus_minutes: u32, mode: FocusMode) -> Result<(), StoreError> {
        let focus = clamp_focus_minutes(focus_minutes as i64);
        {
            let mut state = self.inner.state()?;
            state.focus = focus;
            state.mode = mode;
        }
        self.inner.cache.write_preferences(focus, mode)?;
        self.schedule_push()
    }

    /// Reward slider moved: back-derive focus (switching mode if needed)
    /// and treat it as a preference edit.
    pub fn on_reward_changed(&self, reward: f64) -> Result<Derivation, StoreError> {
        let current = self.inner.state()?.mode;
        let derivation = derive_focus(reward, current);
        self.on_preference_changed(derivation.focus_whole_minutes(), derivation.mode)?;
        Ok(derivation)
    }

    /// Waits for the pending push, if any.
    pub async fn flush(&self) -> Option<PushOutcome> {
        let pending = self.inner.pending.lock().ok()?.take()?;
        pending.handle.await.ok().flatten()
    }

    fn schedule_push(&self) -> Result<(), StoreError> {
        let mut pending = self.inner.pending.lock().map_err(|_| StoreError::Locked)?;
        if let Some(previous) = pending.take() {
            if !previous.fired.load(Ordering::SeqCst) {
                previous.handle.abort();
            }
        }

        let fired = Arc::new(AtomicBool::new(false));
        let this = self.clone();
        let task_fired = Arc::clone(&fired);
        let window = self.inner.debounce_window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            task_fired.store(true, Ordering::SeqCst);
            match this.push().await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::warn!(error = %e, "preference push could not update cache");
                    None
                }
            }
        });
        *pending = Some(Debounce { handle, fired });
        Ok(())
    }

    async fn push(&self) -> Result<PushOutcome, StoreError> {
        let _guard = self.inner.push_lock.lock().await;
        let (focus, mode) = {
            let state = self.inner.state()?;
            (state.focus, state.mode)
        };

        match self
            .inner
            .remote
            .update_preferences(focus, mode.as_str())
            .await
        {
            Ok(record) => {
                let (confirmed_focus, confirmed_mode) = normalize(&record);
                let mut state = self.inner.state()?;
                state.confirmed_focus = confirmed_focus;
                state.confirmed_mode = confirmed_mode;
                state.error_message = None;
                tracing::info!(focus = confirmed_focus, mode = %confirmed_mode, "preferences confirmed");
                Ok(PushOutcome::Confirmed)
            }
            Err(e) => {
                let (focus, mode, generation) = {
                    let mut state = self.inner.state()?;
                    state.focus = state.confirmed_focus;
                    state.mode = state.confirmed_mode;
                    state.error_message = Some(SAVE_FAILED_MESSAGE.to_string());
                    state.error_generation += 1;
                    (state.focus, state.mode, state.error_generation)
                };
                self.inner.cache.write_preferences(focus, mode)?;
                tracing::warn!(error = %e, focus, %mode, "preference push failed; rolled back");
                self.clear_error_later(generation);
                Ok(PushOutcome::RolledBack { kind: e.kind() })
            }
        }
    }

    fn clear_error_later(&self, generation: u64) {
        let this = self.clone();
        let delay = self.inner.error_display;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut state) = this.inner.state() {
                if state.error_generation == generation {
                    state.error_message = None;
                }
            }
        });
    }
}

impl<C, R> Inner<C, R> {
    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Locked)
    }
}

fn normalize(record: &PreferencesRecord) -> (u32, FocusMode) {
    (
        clamp_focus_minutes(record.focus_duration_minutes),
        FocusMode::parse_or_default(&record.focus_mode),
    )
}
