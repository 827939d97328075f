//! HTTP API of the contrace relay.
//!
//! An in-memory implementation of the remote service: user registration,
//! push tokens, encounter uploads and the infection flag. State lives for
//! the lifetime of the process.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use contrace_types::api::{
    ApiError, API_PREFIX, InfectionStatus, RegisterUserRequest, UpdateTokenRequest, UploadBatchRequest,
    UploadBatchResponse,
};
use contrace_types::{ContactId, ContactRecord, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A registered user as the relay sees it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub push_token: String,
    pub registered_at: Timestamp,
    pub is_infected: bool,
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<UserId, UserRecord>,
    encounters: HashMap<UserId, BTreeMap<ContactId, ContactRecord>>,
}

/// Shared relay state. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct RelayState {
    inner: Arc<RwLock<Store>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user(&self, user_id: UserId) -> Option<UserRecord> {
        self.inner.read().await.users.get(&user_id).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    /// Stored encounters of `user_id`, newest first.
    pub async fn encounters(&self, user_id: UserId) -> Vec<ContactRecord> {
        let store = self.inner.read().await;
        let mut records: Vec<_> = store
            .encounters
            .get(&user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        records
    }
}

/// Error response carrying an [`ApiError`] body.
#[derive(Debug)]
struct Failure(StatusCode, String);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(ApiError { error: self.1 })).into_response()
    }
}

async fn register_user(
    State(state): State<RelayState>,
    Json(req): Json<RegisterUserRequest>,
) -> StatusCode {
    let record = UserRecord {
        push_token: req.push_token,
        registered_at: Timestamp::now(),
        is_infected: false,
    };
    state.inner.write().await.users.insert(req.user_id, record);
    info!(user = %req.user_id, "user registered");
    StatusCode::CREATED
}

async fn update_token(
    State(state): State<RelayState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<UpdateTokenRequest>,
) -> Result<StatusCode, Failure> {
    let mut store = state.inner.write().await;
    let user = store
        .users
        .get_mut(&user_id)
        .ok_or_else(|| Failure(StatusCode::NOT_FOUND, format!("unknown user {user_id}")))?;
    user.push_token = req.push_token;
    debug!(user = %user_id, "push token updated");
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_encounters(
    State(state): State<RelayState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<UploadBatchRequest>,
) -> Result<Json<UploadBatchResponse>, Failure> {
    // Validate the whole batch before storing any of it.
    if let Some(bad) = req.encounters.iter().find(|r| r.user_id != user_id) {
        return Err(Failure(
            StatusCode::BAD_REQUEST,
            format!("encounter {} belongs to another user", bad.id),
        ));
    }

    let accepted = req.encounters.len();
    let mut store = state.inner.write().await;
    let stored = store.encounters.entry(user_id).or_default();
    for record in req.encounters {
        stored.insert(record.id, record);
    }
    info!(user = %user_id, accepted, "encounters uploaded");
    Ok(Json(UploadBatchResponse { accepted }))
}

async fn list_encounters(
    State(state): State<RelayState>,
    Path(user_id): Path<UserId>,
) -> Json<Vec<ContactRecord>> {
    Json(state.encounters(user_id).await)
}

async fn get_infection(
    State(state): State<RelayState>,
    Path(user_id): Path<UserId>,
) -> Json<InfectionStatus> {
    let is_infected = state
        .user(user_id)
        .await
        .is_some_and(|u| u.is_infected);
    Json(InfectionStatus { is_infected })
}

async fn set_infection(
    State(state): State<RelayState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<InfectionStatus>,
) -> Result<StatusCode, Failure> {
    let mut store = state.inner.write().await;
    let user = store
        .users
        .get_mut(&user_id)
        .ok_or_else(|| Failure(StatusCode::NOT_FOUND, format!("unknown user {user_id}")))?;
    user.is_infected = req.is_infected;
    info!(user = %user_id, is_infected = req.is_infected, "infection status set");
    Ok(StatusCode::NO_CONTENT)
}

/// Build the HTTP API router over `state`, mounted at [`API_PREFIX`].
pub fn build_router(state: RelayState) -> Router {
    let api = Router::new()
        .route("/users", post(register_user))
        .route("/users/{id}/token", put(update_token))
        .route(
            "/users/{id}/encounters",
            post(upload_encounters).get(list_encounters),
        )
        .route(
            "/users/{id}/infection",
            get(get_infection).put(set_infection),
        );
    Router::new().nest(API_PREFIX, api).with_state(state)
}
