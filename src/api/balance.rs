// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet balance endpoints.
//!
//! Both verbs refresh the cached balance from the chain. When the node is
//! unreachable the last cached value is served with a `note`.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    auth::Auth, custody::BalanceSnapshot, error::ApiError, models::ChainQuery, state::AppState,
};

/// Balance of a wallet on one chain.
#[utoipa::path(
    get,
    path = "/api/wallets/{wallet_id}/balance",
    tag = "Balance",
    security(("session" = [])),
    params(
        ("wallet_id" = String, Path, description = "Wallet row id or address"),
        ChainQuery
    ),
    responses(
        (status = 200, description = "Balance, possibly from cache", body = BalanceSnapshot),
        (status = 400, description = "Unsupported chain"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn get_balance(
    auth: Auth,
    state: State<AppState>,
    wallet_id: Path<String>,
    query: Query<ChainQuery>,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    sync_balance(auth, state, wallet_id, query).await
}

/// Force a balance refresh.
#[utoipa::path(
    post,
    path = "/api/wallets/{wallet_id}/balance",
    tag = "Balance",
    security(("session" = [])),
    params(
        ("wallet_id" = String, Path, description = "Wallet row id or address"),
        ChainQuery
    ),
    responses(
        (status = 200, description = "Balance, possibly from cache", body = BalanceSnapshot),
        (status = 400, description = "Unsupported chain"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn sync_balance(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<BalanceSnapshot>, ApiError> {
    let wallet = state.custody.get_wallet(&wallet_id, &user.user_id)?;
    let snapshot = state
        .custody
        .sync_balance(&wallet, query.chain_id)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to fetch balance"))?;
    Ok(Json(snapshot))
}
