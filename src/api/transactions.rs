// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Raw transactions from a managed wallet.
//!
//! `GET` quotes gas for a prospective transaction, `POST` signs, sends and
//! records it. Values are in ETH and gas prices in gwei.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    blockchain::TransactionResult,
    custody::{build_tx_request, GasQuote, SubmitRequest},
    error::ApiError,
    models::{EstimateQuery, SendTransactionRequest},
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct EstimateResponse {
    pub estimate: GasQuote,
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendTransactionResponse {
    pub transaction: TransactionResult,
    pub success: bool,
}

/// Estimate gas for a transaction from the wallet.
#[utoipa::path(
    get,
    path = "/api/wallets/{wallet_id}/transactions",
    tag = "Transactions",
    security(("session" = [])),
    params(
        ("wallet_id" = String, Path, description = "Wallet row id or address"),
        EstimateQuery
    ),
    responses(
        (status = 200, description = "Gas quote", body = EstimateResponse),
        (status = 400, description = "Invalid recipient, value or calldata"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found"),
        (status = 500, description = "Failed to estimate gas")
    )
)]
pub async fn estimate_transaction(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Query(query): Query<EstimateQuery>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let tx = build_tx_request(
        &query.to,
        query.value.as_deref().unwrap_or("0"),
        query.data.as_deref(),
        None,
        None,
    )?;

    let estimate = state
        .custody
        .estimate_gas(&wallet_id, &user.user_id, query.chain_id, &tx)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to estimate gas"))?;

    Ok(Json(EstimateResponse {
        estimate,
        success: true,
    }))
}

/// Sign and send a transaction, waiting for its receipt.
#[utoipa::path(
    post,
    path = "/api/wallets/{wallet_id}/transactions",
    tag = "Transactions",
    security(("session" = [])),
    params(("wallet_id" = String, Path, description = "Wallet row id or address")),
    request_body = SendTransactionRequest,
    responses(
        (status = 200, description = "Transaction mined", body = SendTransactionResponse),
        (status = 400, description = "Invalid transaction fields"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found"),
        (status = 500, description = "Failed to send transaction")
    )
)]
pub async fn send_transaction(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Json(request): Json<SendTransactionRequest>,
) -> Result<Json<SendTransactionResponse>, ApiError> {
    let gas_limit = request
        .gas_limit
        .as_deref()
        .map(str::parse::<u64>)
        .transpose()
        .map_err(|_| ApiError::bad_request("Invalid gas limit"))?;

    let tx = build_tx_request(
        &request.to,
        request.value.as_deref().unwrap_or("0"),
        request.data.as_deref(),
        gas_limit,
        request.gas_price.as_deref(),
    )?;

    let transaction = state
        .custody
        .transfer(SubmitRequest {
            wallet: wallet_id,
            owner_id: user.user_id,
            chain_id: request.chain_id,
            tx,
            wait: true,
        })
        .await
        .map_err(|e| ApiError::from(e).context("Failed to send transaction"))?;

    Ok(Json(SendTransactionResponse {
        transaction,
        success: true,
    }))
}
