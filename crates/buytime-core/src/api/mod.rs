//! Remote balance and preferences service.
//!
//! The reconcilers talk to the remote through the [`BalanceService`] and
//! [`PreferencesService`] traits so tests can substitute in-memory fakes;
//! [`ApiClient`] is the reqwest-backed implementation.

pub mod client;
pub mod retry;
pub mod token;
pub mod types;

pub use client::ApiClient;
pub use retry::{poll_until_provisioned, RetryPolicy};
pub use types::{Balance, Envelope, PreferencesRecord, TodayStats, UserProfile};

use async_trait::async_trait;

use crate::error::ApiError;

#[async_trait]
pub trait BalanceService: Send + Sync {
    /// `GET /api/balance`
    async fn get_balance(&self) -> Result<Balance, ApiError>;

    /// `PATCH /api/balance`; returns the record the server stored.
    async fn update_balance(&self, available_minutes: i64) -> Result<Balance, ApiError>;
}

#[async_trait]
pub trait PreferencesService: Send + Sync {
    /// `GET /api/preferences`
    async fn get_preferences(&self) -> Result<PreferencesRecord, ApiError>;

    /// `PATCH /api/preferences`; returns the record the server stored.
    async fn update_preferences(
        &self,
        focus_duration_minutes: u32,
        focus_mode: &str,
    ) -> Result<PreferencesRecord, ApiError>;
}

#[async_trait]
pub trait AccountService: Send + Sync {
    /// `GET /api/users/me`
    async fn get_user(&self) -> Result<UserProfile, ApiError>;
}
