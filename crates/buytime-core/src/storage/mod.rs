mod config;
pub mod cache;
pub mod database;
pub mod memory;
pub mod shared;

pub use cache::LocalCache;
pub use config::{ApiConfig, Config, RestrictionConfig, SyncConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use shared::SharedLedger;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ConfigError, StoreError};

/// A string key/value store.
///
/// Each call is atomic for the single key it touches. There are no
/// multi-key transactions: a read-modify-write spanning several calls can
/// interleave with writes from another process.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Returns the BuyTime data directory, creating it if needed.
///
/// `BUYTIME_DATA_DIR` wins when set. Otherwise `~/.config/buytime[-dev]/`
/// based on `BUYTIME_ENV` (set `BUYTIME_ENV=dev` for a development copy).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("BUYTIME_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("BUYTIME_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("buytime-dev")
            } else {
                base_dir.join("buytime")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
