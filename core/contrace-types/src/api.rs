//! Request and response bodies of the remote service's HTTP API.
//!
//! Shared by the client in `contrace-sync` and the reference relay so both
//! sides agree on field names. All bodies are camelCase JSON.

use crate::{ContactRecord, UserId};
use serde::{Deserialize, Serialize};

/// Path prefix of every endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// `POST /api/v1/users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub user_id: UserId,
    pub push_token: String,
}

/// `PUT /api/v1/users/{id}/token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTokenRequest {
    pub push_token: String,
}

/// `POST /api/v1/users/{id}/encounters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadBatchRequest {
    pub encounters: Vec<ContactRecord>,
}

/// Response to a successful batch upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatchResponse {
    pub accepted: usize,
}

/// `GET` and `PUT /api/v1/users/{id}/infection`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfectionStatus {
    pub is_infected: bool,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}
