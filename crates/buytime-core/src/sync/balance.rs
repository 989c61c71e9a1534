//! Balance reconciler.
//!
//! Source of truth is the Shared Ledger Store; the remote is a mirror synced
//! by delta so that several devices can earn and spend concurrently:
//!
//! ```text
//! pending_delta = available_minutes - last_confirmed_remote_value
//! sync: GET remote R
//!       delta == 0 → accept R locally (picks up other-device changes)
//!       delta != 0 → PATCH max(0, R + delta), store the confirmed value
//! ```
//!
//! The overlay and monitor processes debit the shared balance without
//! talking to the remote. Their changes surface here as a non-zero delta the
//! next time the app comes to the foreground.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::types::{SkipReason, SyncOutcome};
use crate::api::BalanceService;
use crate::error::{CoreError, StoreError, ValidationError};
use crate::ledger::{Ledger, LedgerSnapshot, RemoteValue};
use crate::storage::KeyValueStore;

/// Returned by [`BalanceReconciler::earn`]: the new local balance right away,
/// and a handle to the sync it kicked off.
#[derive(Debug)]
pub struct EarnReceipt {
    pub available_minutes: u32,
    pub sync: JoinHandle<Result<SyncOutcome, StoreError>>,
}

pub struct BalanceReconciler<S, C, R> {
    inner: Arc<Inner<S, C, R>>,
}

struct Inner<S, C, R> {
    ledger: Ledger<S, C>,
    remote: R,
    /// Serializes full syncs; a second caller waits for the first.
    sync_lock: Mutex<()>,
}

impl<S, C, R> Clone for BalanceReconciler<S, C, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C, R> BalanceReconciler<S, C, R>
where
    S: KeyValueStore + 'static,
    C: KeyValueStore + 'static,
    R: BalanceService + 'static,
{
    pub fn new(ledger: Ledger<S, C>, remote: R) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger,
                remote,
                sync_lock: Mutex::new(()),
            }),
        }
    }

    pub fn ledger(&self) -> &Ledger<S, C> {
        &self.inner.ledger
    }

    /// Re-reads the shared balance.
    pub fn available_minutes(&self) -> Result<u32, StoreError> {
        self.inner.ledger.shared().available_minutes()
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        self.inner.ledger.get()
    }

    // ── Lifecycle hooks ──────────────────────────────────────────────

    /// Seeds the ledger from the remote on first launch; no-op afterwards.
    pub async fn on_appear(&self) -> Result<SyncOutcome, StoreError> {
        if !self.snapshot()?.last_confirmed_remote_value.is_unsynced() {
            tracing::debug!("balance already seeded");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::AlreadySeeded,
            });
        }
        self.full_sync().await
    }

    /// Picks up writes other processes made while the app was suspended and
    /// syncs if they left a pending delta.
    pub async fn on_foreground(&self) -> Result<SyncOutcome, StoreError> {
        let snapshot = self.snapshot()?;
        match snapshot.pending_delta() {
            None => Ok(SyncOutcome::Skipped {
                reason: SkipReason::NeverSynced,
            }),
            Some(0) => Ok(SyncOutcome::Skipped {
                reason: SkipReason::NoPendingDelta,
            }),
            Some(delta) => {
                tracing::debug!(delta, "pending delta on foreground");
                self.full_sync().await
            }
        }
    }

    /// Pull-to-refresh: always fetches, pushes only when a delta exists.
    pub async fn refresh(&self) -> Result<SyncOutcome, StoreError> {
        self.full_sync().await
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Credits minutes from a completed focus session.
    ///
    /// The shared balance is updated before this returns; the remote sync
    /// runs in the background. Must be called inside a Tokio runtime.
    pub fn earn(&self, amount: u32) -> Result<EarnReceipt, CoreError> {
        if amount == 0 {
            return Err(ValidationError::InvalidValue {
                field: "amount".into(),
                message: "must be a positive number of minutes".into(),
            }
            .into());
        }
        let available_minutes = self
            .inner
            .ledger
            .shared()
            .adjust_available_minutes(amount as i64)?;
        tracing::info!(amount, available_minutes, "minutes earned");

        let this = self.clone();
        let sync = tokio::spawn(async move { this.full_sync().await });
        Ok(EarnReceipt {
            available_minutes,
            sync,
        })
    }

    /// Overwrites the local balance and drops the confirmed baseline, so the
    /// next sync re-seeds from the remote.
    pub fn reset_balance(&self, minutes: u32) -> Result<u32, StoreError> {
        self.inner.ledger.reset_balance(minutes)
    }

    // ── Core sync ────────────────────────────────────────────────────

    async fn full_sync(&self) -> Result<SyncOutcome, StoreError> {
        let _guard = self.inner.sync_lock.lock().await;
        let ledger = &self.inner.ledger;

        let remote = match self.inner.remote.get_balance().await {
            Ok(balance) => balance.available_minutes,
            Err(e) => {
                tracing::warn!(error = %e, "balance fetch failed; keeping pending delta");
                return Ok(SyncOutcome::Failed { kind: e.kind() });
            }
        };

        // Read after the fetch so writes made while it was in flight count.
        let before = ledger.get()?;
        let delta = before.pending_delta().unwrap_or(0);

        if delta == 0 {
            ledger.accept_remote(remote)?;
            let outcome = if before.last_confirmed_remote_value.is_unsynced() {
                SyncOutcome::Seeded { confirmed: remote }
            } else {
                SyncOutcome::Accepted { confirmed: remote }
            };
            tracing::info!(confirmed = remote, "balance accepted from remote");
            return Ok(outcome);
        }

        let target = remote.saturating_add(delta).max(0);
        let confirmed = match self.inner.remote.update_balance(target).await {
            Ok(balance) => balance.available_minutes,
            Err(e) => {
                tracing::warn!(error = %e, delta, "balance push failed; keeping pending delta");
                return Ok(SyncOutcome::Failed { kind: e.kind() });
            }
        };

        // Another process may have earned or spent during the PATCH. Carry
        // that change over as the next pending delta instead of dropping it.
        let in_flight = ledger.shared().available_minutes()? as i64 - before.available_minutes as i64;
        ledger
            .shared()
            .set_available_minutes(confirmed.saturating_add(in_flight))?;
        ledger
            .cache()
            .set_last_confirmed_remote_value(RemoteValue::Confirmed(confirmed))?;

        tracing::info!(delta, remote, confirmed, "balance delta confirmed");
        Ok(SyncOutcome::Pushed { delta, confirmed })
    }
}
