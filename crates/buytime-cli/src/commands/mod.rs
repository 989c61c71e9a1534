pub mod auth;
pub mod balance;
pub mod config;
pub mod prefs;
pub mod shield;

use std::sync::Arc;

use buytime_core::api::{token, ApiClient};
use buytime_core::storage::shared::KEY_SPEND_UNIT_MINUTES;
use buytime_core::storage::SharedLedger;
use buytime_core::{Config, CoreError, Database, KeyValueStore};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Runtime for commands that talk to the remote.
pub fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

pub fn open_shared() -> Result<Arc<Database>, CoreError> {
    Ok(Arc::new(Database::open_shared()?))
}

pub fn open_local() -> Result<Arc<Database>, CoreError> {
    Ok(Arc::new(Database::open_local()?))
}

/// Shared store with the configured spend unit seeded on first use.
pub fn open_shared_seeded(config: &Config) -> Result<Arc<Database>, CoreError> {
    let store = open_shared()?;
    if store.get(KEY_SPEND_UNIT_MINUTES)?.is_none() {
        SharedLedger::new(Arc::clone(&store))
            .set_spend_unit_minutes(config.restriction.default_spend_unit_minutes)?;
    }
    Ok(store)
}

pub fn api_client(config: &Config) -> Result<ApiClient, CoreError> {
    Ok(ApiClient::from_config(&config.api, token::resolve())?)
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
