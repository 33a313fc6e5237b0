// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{Auth, Credentials, ProofError},
    error::ApiError,
    models::AddressQuery,
    state::AppState,
    storage::{User, UserRepository},
};

/// Response for GET /api/users/me
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserMeResponse {
    pub user_id: String,
    pub wallet_address: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Session expiry as unix seconds
    pub session_expires_at: i64,
}

/// Register (or look up) the user behind a signed ownership message.
#[utoipa::path(
    post,
    path = "/api/users/create",
    tag = "Users",
    request_body = Credentials,
    responses(
        (status = 200, description = "User for the proven address", body = User),
        (status = 400, description = "Invalid signature or missing challenge data"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<User>, ApiError> {
    match state.auth.authenticate(&credentials) {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::bad_request("Invalid signature")),
        Err(ProofError::Storage(e)) => Err(e.into()),
        Err(e) => Err(ApiError::bad_request(e.to_string())),
    }
}

/// Find a user by wallet address. Returns `null` when there is none.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(AddressQuery),
    responses(
        (status = 200, description = "User or null", body = Option<User>)
    )
)]
pub async fn find_user(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<Option<User>>, ApiError> {
    let address = query.address.trim().to_string();
    let user = state
        .store
        .read(|txn| UserRepository::new(txn).find_by_address(&address))?;
    Ok(Json(user))
}

/// The signed-in user.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("session" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing session"),
        (status = 404, description = "User no longer exists")
    )
)]
pub async fn get_current_user(
    Auth(session): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserMeResponse>, ApiError> {
    let user = state
        .store
        .read(|txn| UserRepository::new(txn).get(&session.user_id))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserMeResponse {
        user_id: user.id,
        wallet_address: user.wallet_address,
        name: user.name,
        created_at: user.created_at,
        session_expires_at: session.expires_at,
    }))
}
