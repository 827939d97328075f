//! HTTP client for the remote service.
//!
//! Talks to the `/api/v1` JSON API served by `contrace-relay` (or anything
//! speaking the same protocol).

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteService;
use async_trait::async_trait;
use contrace_types::api::{
    ApiError, InfectionStatus, RegisterUserRequest, UpdateTokenRequest, UploadBatchRequest,
    API_PREFIX,
};
use contrace_types::{ContactRecord, UserId};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Remote endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRemoteConfig {
    /// Scheme, host and port, without the API prefix (e.g. `https://relay.example.org`).
    pub base_url: String,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// [`RemoteService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteService {
    config: HttpRemoteConfig,
    client: Client,
}

impl HttpRemoteService {
    /// Builds a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Network`] if the TLS backend cannot be set up.
    pub fn new(config: HttpRemoteConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpRemoteConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{API_PREFIX}{path}",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

fn transport_error(what: &str, e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::Timeout
    } else {
        SyncError::Network(format!("{what} failed: {e}"))
    }
}

/// Passes 2xx responses through and turns everything else into
/// [`SyncError::Remote`].
async fn check(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(SyncError::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn upload_batch(&self, user_id: UserId, records: &[ContactRecord]) -> SyncResult<()> {
        debug!(count = records.len(), "uploading contact batch");
        let body = UploadBatchRequest {
            encounters: records.to_vec(),
        };
        let response = self
            .client
            .post(self.url(&format!("/users/{user_id}/encounters")))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("upload", e))?;
        check(response).await?;
        Ok(())
    }

    async fn register_user(&self, user_id: UserId, push_token: &str) -> SyncResult<()> {
        let body = RegisterUserRequest {
            user_id,
            push_token: push_token.to_string(),
        };
        let response = self
            .client
            .post(self.url("/users"))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("registration", e))?;
        check(response).await?;
        Ok(())
    }

    async fn update_token(&self, user_id: UserId, push_token: &str) -> SyncResult<()> {
        let body = UpdateTokenRequest {
            push_token: push_token.to_string(),
        };
        let response = self
            .client
            .put(self.url(&format!("/users/{user_id}/token")))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("token update", e))?;
        check(response).await?;
        Ok(())
    }

    async fn get_infection_status(&self, user_id: UserId) -> SyncResult<bool> {
        let response = self
            .client
            .get(self.url(&format!("/users/{user_id}/infection")))
            .send()
            .await
            .map_err(|e| transport_error("infection status query", e))?;
        let status: InfectionStatus = check(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Serialization(format!("bad infection status: {e}")))?;
        Ok(status.is_infected)
    }
}
