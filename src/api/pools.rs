// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pool registry and investment endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    blockchain::{
        units::{parse_wei, wei_to_eth_f64},
        TxOutcome,
    },
    error::ApiError,
    models::{InvestBody, PoolListQuery},
    pools::{InvestRequest, Investment, PoolDetails, RegisterPool},
    state::AppState,
    storage::Pool,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct PoolListResponse {
    pub success: bool,
    pub pools: Vec<Pool>,
    pub count: usize,
}

impl From<Vec<Pool>> for PoolListResponse {
    fn from(pools: Vec<Pool>) -> Self {
        Self {
            success: true,
            count: pools.len(),
            pools,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PoolResponse {
    pub success: bool,
    pub pool: Pool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PoolDetailsResponse {
    pub success: bool,
    pub pool: PoolDetails,
}

/// The deposit created by an investment.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentSummary {
    pub id: String,
    /// Amount in ETH as sent
    pub amount: String,
    /// Amount in ETH rounded to six decimals
    #[serde(rename = "amountETH")]
    pub amount_eth: String,
    pub tx_hash: String,
    pub status: TxOutcome,
    pub pool_id: String,
    pub pool_name: String,
    pub pool_address: String,
    /// Whether the pool emitted its participation event
    pub participation_logged: bool,
    pub created_at: DateTime<Utc>,
}

/// Pool totals after an investment.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolTotals {
    pub id: String,
    pub name: String,
    /// Wei
    pub total_contribution: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvestResponse {
    pub success: bool,
    pub investment: InvestmentSummary,
    pub pool: PoolTotals,
}

impl From<Investment> for InvestResponse {
    fn from(investment: Investment) -> Self {
        let Investment {
            record,
            pool,
            participation_logged,
        } = investment;
        let amount_eth = parse_wei(&record.amount_wei)
            .map(wei_to_eth_f64)
            .unwrap_or_default();

        Self {
            success: true,
            investment: InvestmentSummary {
                id: record.id,
                amount: record.amount,
                amount_eth: format!("{amount_eth:.6}"),
                tx_hash: record.tx_hash,
                status: record.status,
                pool_id: pool.id.clone(),
                pool_name: pool.name.clone(),
                pool_address: pool.pool_address.clone(),
                participation_logged,
                created_at: record.created_at,
            },
            pool: PoolTotals {
                id: pool.id,
                name: pool.name,
                total_contribution: pool.total_contribution,
                updated_at: pool.updated_at,
            },
        }
    }
}

/// List pools, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/api/pools",
    tag = "Pools",
    security(("session" = [])),
    params(PoolListQuery),
    responses(
        (status = 200, description = "Pools, newest first", body = PoolListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_pools(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(query): Query<PoolListQuery>,
) -> Result<Json<PoolListResponse>, ApiError> {
    Ok(Json(state.pools.list_pools(query.status)?.into()))
}

/// Register an on-chain pool.
#[utoipa::path(
    post,
    path = "/api/pools",
    tag = "Pools",
    security(("session" = [])),
    request_body = RegisterPool,
    responses(
        (status = 201, description = "Pool registered", body = PoolResponse),
        (status = 400, description = "Invalid pool fields"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn register_pool(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<RegisterPool>,
) -> Result<(StatusCode, Json<PoolResponse>), ApiError> {
    let pool = state.pools.register_pool(&user.user_id, request)?;
    Ok((
        StatusCode::CREATED,
        Json(PoolResponse {
            success: true,
            pool,
        }),
    ))
}

/// Pools registered by the signed-in user.
#[utoipa::path(
    get,
    path = "/api/pools/mine",
    tag = "Pools",
    security(("session" = [])),
    responses(
        (status = 200, description = "Own pools, newest first", body = PoolListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_pools(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<PoolListResponse>, ApiError> {
    Ok(Json(state.pools.list_pools_by_creator(&user.user_id)?.into()))
}

/// Pools buying into one NFT collection.
#[utoipa::path(
    get,
    path = "/api/pools/collection/{address}",
    tag = "Pools",
    security(("session" = [])),
    params(("address" = String, Path, description = "NFT collection address")),
    responses(
        (status = 200, description = "Pools of the collection", body = PoolListResponse),
        (status = 400, description = "Invalid collection address format"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn collection_pools(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PoolListResponse>, ApiError> {
    Ok(Json(state.pools.list_pools_by_collection(&address)?.into()))
}

/// Pool details by row id or contract address.
#[utoipa::path(
    get,
    path = "/api/pools/{identifier}",
    tag = "Pools",
    security(("session" = [])),
    params(("identifier" = String, Path, description = "Pool row id or contract address")),
    responses(
        (status = 200, description = "Pool with prices and activity", body = PoolDetailsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Pool not found")
    )
)]
pub async fn get_pool(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<PoolDetailsResponse>, ApiError> {
    let pool = state.pools.pool_details(&identifier)?;
    Ok(Json(PoolDetailsResponse {
        success: true,
        pool,
    }))
}

/// Invest ETH from a managed wallet into a pool.
///
/// Waits for the receipt. The pool total and the deposit record are written
/// together once the transaction is mined.
#[utoipa::path(
    post,
    path = "/api/pool/invest",
    tag = "Pools",
    security(("session" = [])),
    request_body = InvestBody,
    responses(
        (status = 200, description = "Investment confirmed", body = InvestResponse),
        (status = 400, description = "Invalid amount or no managed wallet"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Pool not found"),
        (status = 500, description = "Failed to process investment")
    )
)]
pub async fn invest(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<InvestBody>,
) -> Result<Json<InvestResponse>, ApiError> {
    let investment = state
        .pools
        .invest(InvestRequest {
            user_id: user.user_id,
            wallet: body.wallet_id,
            pool_id: body.pool_id,
            amount: body.amount,
            chain_id: None,
        })
        .await
        .map_err(|e| ApiError::from(e).context("Failed to process investment"))?;

    Ok(Json(investment.into()))
}
