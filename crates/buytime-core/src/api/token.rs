//! Bearer token storage.
//!
//! Thin wrapper around the OS keyring. `BUYTIME_TOKEN` overrides the stored
//! token, which keeps scripted and CI runs away from the keyring.

use crate::error::CoreError;

const SERVICE: &str = "buytime";
const TOKEN_KEY: &str = "api_token";
pub const TOKEN_ENV: &str = "BUYTIME_TOKEN";

pub fn get() -> Result<Option<String>, CoreError> {
    let entry = keyring::Entry::new(SERVICE, TOKEN_KEY)?;
    match entry.get_password() {
        Ok(pw) => Ok(Some(pw)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set(token: &str) -> Result<(), CoreError> {
    let entry = keyring::Entry::new(SERVICE, TOKEN_KEY)?;
    entry.set_password(token)?;
    Ok(())
}

pub fn delete() -> Result<(), CoreError> {
    let entry = keyring::Entry::new(SERVICE, TOKEN_KEY)?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Token to send with requests: the environment override, else the keyring.
/// Keyring failures are logged and treated as "signed out".
pub fn resolve() -> Option<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Some(token);
        }
    }
    match get() {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, "keyring unavailable");
            None
        }
    }
}
