//! reqwest-backed client for the BuyTime backend.
//!
//! Status handling:
//! - 2xx: decode the envelope; `success && data` yields the payload, any
//!   other envelope is a `BadRequest` carrying the envelope error
//! - 401: `Unauthorized`
//! - 404: `NotFound`
//! - other 4xx: `BadRequest` with the envelope error when one decodes
//! - everything else: `ServerError`
//!
//! Every request is bounded by the configured timeout; expiry surfaces as
//! `ApiError::Timeout`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::types::{
    Balance, Envelope, PreferencesRecord, UpdateBalanceBody, UpdatePreferencesBody, UserProfile,
};
use super::{AccountService, BalanceService, PreferencesService};
use crate::error::{ApiError, ConfigError};
use crate::storage::ApiConfig;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "api.base_url".into(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "api.base_url".into(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    pub fn from_config(config: &ApiConfig, token: Option<String>) -> Result<Self, ConfigError> {
        Self::new(&config.base_url, token, config.request_timeout())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn request<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.token.as_deref().ok_or(ApiError::Unauthorized)?;
        let url = format!("{}{}", self.base_url, endpoint);

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let (status, bytes) = tokio::time::timeout(self.timeout, async {
            let response = builder.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, ApiError>((status, bytes))
        })
        .await??;

        tracing::debug!(%method, endpoint, status = status.as_u16(), "api response");
        decode_response(status, &bytes)
    }
}

/// Maps a raw HTTP response onto a payload or the error taxonomy.
pub fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ApiError> {
    if status.is_success() {
        let envelope: Envelope<T> =
            serde_json::from_slice(body).map_err(|e| ApiError::Decoding(e.to_string()))?;
        return match (envelope.success, envelope.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(ApiError::BadRequest(
                envelope.error.unwrap_or_else(|| "Unknown error".into()),
            )),
        };
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        s if s.is_client_error() => {
            let message = serde_json::from_slice::<Envelope<serde_json::Value>>(body)
                .ok()
                .and_then(|env| env.error)
                .unwrap_or_else(|| "Bad request".into());
            Err(ApiError::BadRequest(message))
        }
        _ => Err(ApiError::ServerError),
    }
}

#[async_trait]
impl BalanceService for ApiClient {
    async fn get_balance(&self) -> Result<Balance, ApiError> {
        self.request::<_, ()>(Method::GET, "/api/balance", None).await
    }

    async fn update_balance(&self, available_minutes: i64) -> Result<Balance, ApiError> {
        let body = UpdateBalanceBody { available_minutes };
        self.request(Method::PATCH, "/api/balance", Some(&body)).await
    }
}

#[async_trait]
impl PreferencesService for ApiClient {
    async fn get_preferences(&self) -> Result<PreferencesRecord, ApiError> {
        self.request::<_, ()>(Method::GET, "/api/preferences", None)
            .await
    }

    async fn update_preferences(
        &self,
        focus_duration_minutes: u32,
        focus_mode: &str,
    ) -> Result<PreferencesRecord, ApiError> {
        let body = UpdatePreferencesBody {
            focus_duration_minutes,
            focus_mode,
        };
        self.request(Method::PATCH, "/api/preferences", Some(&body))
            .await
    }
}

#[async_trait]
impl AccountService for ApiClient {
    async fn get_user(&self) -> Result<UserProfile, ApiError> {
        self.request::<_, ()>(Method::GET, "/api/users/me", None).await
    }
}
