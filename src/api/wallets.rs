// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Managed wallet endpoints.
//!
//! These endpoints handle wallet creation, listing, retrieval, updates,
//! deletion, withdrawals and message signing. All operations require a
//! session. Wallets of other users are reported as not found.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    blockchain::TransactionResult,
    custody::WithdrawRequest,
    error::ApiError,
    models::{CreateWalletRequest, HistoryQuery, SignMessageRequest, UpdateWalletRequest, WithdrawBody},
    state::AppState,
    storage::{
        BalanceRepository, ManagedWallet, TransactionRecord, WalletBalance, WalletResponse,
    },
};

/// Default and maximum page sizes for wallet history.
const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;

/// A wallet with its cached balances. Never carries key material.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletWithBalances {
    #[serde(flatten)]
    pub wallet: WalletResponse,
    pub balances: Vec<WalletBalance>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletListResponse {
    /// Active wallets, newest first.
    pub wallets: Vec<WalletWithBalances>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletEnvelope {
    pub wallet: WalletWithBalances,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteWalletResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawResponse {
    pub transaction: TransactionResult,
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignatureResponse {
    pub signature: String,
    pub success: bool,
}

fn with_balances(state: &AppState, wallet: &ManagedWallet) -> Result<WalletWithBalances, ApiError> {
    let balances = state
        .store
        .read(|txn| BalanceRepository::new(txn).list_for_wallet(&wallet.wallet_id))?;
    Ok(WalletWithBalances {
        wallet: WalletResponse::from(wallet),
        balances,
    })
}

/// Create a managed wallet for the signed-in user.
///
/// Generates a secp256k1 key on the server and stores it encrypted under
/// the master key. The response never contains the private key.
#[utoipa::path(
    post,
    path = "/api/wallets",
    tag = "Wallets",
    security(("session" = [])),
    request_body = CreateWalletRequest,
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletWithBalances),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "userId does not match the session"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<WalletWithBalances>), ApiError> {
    if request.user_id.as_deref().is_some_and(|id| id != user.user_id) {
        return Err(ApiError::forbidden("Cannot create a wallet for another user"));
    }

    let wallet = state
        .custody
        .create_managed_wallet(&user.user_id, request.name.as_deref())
        .map_err(|e| ApiError::from(e).context("Failed to create wallet"))?;

    Ok((StatusCode::CREATED, Json(with_balances(&state, &wallet)?)))
}

/// List the signed-in user's active wallets.
#[utoipa::path(
    get,
    path = "/api/wallets",
    tag = "Wallets",
    security(("session" = [])),
    responses(
        (status = 200, description = "List of wallets", body = WalletListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_wallets(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<WalletListResponse>, ApiError> {
    let wallets = state
        .custody
        .list_wallets(&user.user_id)?
        .iter()
        .rev()
        .map(|wallet| with_balances(&state, wallet))
        .collect::<Result<Vec<_>, _>>()?;
    let total = wallets.len();

    Ok(Json(WalletListResponse { wallets, total }))
}

/// Get a wallet by row id or address.
#[utoipa::path(
    get,
    path = "/api/wallets/{wallet_id}",
    tag = "Wallets",
    security(("session" = [])),
    params(("wallet_id" = String, Path, description = "Wallet row id or address")),
    responses(
        (status = 200, description = "Wallet details", body = WalletEnvelope),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn get_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<WalletEnvelope>, ApiError> {
    let wallet = state.custody.get_wallet(&wallet_id, &user.user_id)?;
    Ok(Json(WalletEnvelope {
        wallet: with_balances(&state, &wallet)?,
    }))
}

/// Rename a wallet or change its active flag.
#[utoipa::path(
    put,
    path = "/api/wallets/{wallet_id}",
    tag = "Wallets",
    security(("session" = [])),
    params(("wallet_id" = String, Path, description = "Wallet row id or address")),
    request_body = UpdateWalletRequest,
    responses(
        (status = 200, description = "Updated wallet", body = WalletEnvelope),
        (status = 400, description = "Empty name"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn update_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Json(request): Json<UpdateWalletRequest>,
) -> Result<Json<WalletEnvelope>, ApiError> {
    if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Wallet name cannot be empty"));
    }

    let wallet = state.custody.update_wallet(
        &wallet_id,
        &user.user_id,
        request.name.as_deref(),
        request.is_active,
    )?;
    Ok(Json(WalletEnvelope {
        wallet: with_balances(&state, &wallet)?,
    }))
}

/// Deactivate a wallet.
///
/// The encrypted key is retained but the wallet can no longer sign.
#[utoipa::path(
    delete,
    path = "/api/wallets/{wallet_id}",
    tag = "Wallets",
    security(("session" = [])),
    params(("wallet_id" = String, Path, description = "Wallet row id or address")),
    responses(
        (status = 200, description = "Wallet deactivated", body = DeleteWalletResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn delete_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<DeleteWalletResponse>, ApiError> {
    state.custody.delete_wallet(&wallet_id, &user.user_id)?;
    Ok(Json(DeleteWalletResponse {
        success: true,
        message: "Wallet deactivated successfully".to_string(),
    }))
}

/// Send ETH out of a managed wallet.
///
/// Defaults to the first active wallet and to the user's sign-in address.
/// Chain failures are reported as 500 with the cause in `details`.
#[utoipa::path(
    post,
    path = "/api/wallets/withdraw",
    tag = "Wallets",
    security(("session" = [])),
    request_body = WithdrawBody,
    responses(
        (status = 200, description = "Withdrawal confirmed", body = WithdrawResponse),
        (status = 400, description = "Invalid amount or address"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found"),
        (status = 500, description = "Failed to process withdrawal")
    )
)]
pub async fn withdraw(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<WithdrawBody>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    let transaction = state
        .custody
        .withdraw(
            &user.user_id,
            WithdrawRequest {
                wallet: body.wallet_id,
                to: body.to,
                amount: body.amount,
                chain_id: body.chain_id,
            },
        )
        .await
        .map_err(|e| ApiError::from(e).context("Failed to process withdrawal"))?;

    Ok(Json(WithdrawResponse {
        transaction,
        success: true,
    }))
}

/// Recorded transactions of a wallet, newest first.
#[utoipa::path(
    get,
    path = "/api/wallets/{wallet_id}/history",
    tag = "Wallets",
    security(("session" = [])),
    params(
        ("wallet_id" = String, Path, description = "Wallet row id or address"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Transaction history", body = HistoryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn wallet_history(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let transactions = state.custody.history(&wallet_id, &user.user_id, limit)?;
    Ok(Json(HistoryResponse { transactions }))
}

/// EIP-191 signature over a message with the wallet key.
#[utoipa::path(
    post,
    path = "/api/wallets/{wallet_id}/sign",
    tag = "Wallets",
    security(("session" = [])),
    params(("wallet_id" = String, Path, description = "Wallet row id or address")),
    request_body = SignMessageRequest,
    responses(
        (status = 200, description = "Signature", body = SignatureResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Wallet not found"),
        (status = 500, description = "Key could not be used")
    )
)]
pub async fn sign_message(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Json(request): Json<SignMessageRequest>,
) -> Result<Json<SignatureResponse>, ApiError> {
    if request.message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let signature = state
        .custody
        .sign_message(&wallet_id, &user.user_id, &request.message)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to sign message"))?;

    Ok(Json(SignatureResponse {
        signature,
        success: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{parse_address, units::parse_ether, TxOutcome};
    use crate::state::test_support::test_app;

    const OWNER: &str = "0x00000000000000000000000000000000000000a1";

    #[tokio::test]
    async fn create_returns_wallet_without_key() {
        let app = test_app();
        let session = app.sign_in(OWNER);

        let (status, Json(created)) = create_wallet(
            Auth(session.clone()),
            State(app.state.clone()),
            Json(CreateWalletRequest {
                user_id: Some(session.user_id.clone()),
                name: Some("Trading".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.wallet.name, "Trading");
        assert_eq!(created.balances.len(), 1);
        assert_eq!(created.balances[0].chain_id, 360);

        let json = serde_json::to_value(&created).unwrap();
        assert!(json.get("encryptedPrivateKey").is_none());
        assert!(json.get("encrypted_private_key").is_none());
        assert_eq!(json["userId"], session.user_id);
    }

    #[tokio::test]
    async fn create_for_another_user_is_forbidden() {
        let app = test_app();
        let session = app.sign_in(OWNER);

        let err = create_wallet(
            Auth(session),
            State(app.state.clone()),
            Json(CreateWalletRequest {
                user_id: Some("someone-else".into()),
                name: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_hides_deleted() {
        let app = test_app();
        let session = app.sign_in(OWNER);
        let custody = &app.state.custody;
        let first = custody.create_managed_wallet(&session.user_id, Some("first")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = custody.create_managed_wallet(&session.user_id, Some("second")).unwrap();
        let third = custody.create_managed_wallet(&session.user_id, Some("third")).unwrap();

        delete_wallet(Auth(session.clone()), State(app.state.clone()), Path(third.id))
            .await
            .unwrap();

        let Json(list) = list_wallets(Auth(session), State(app.state.clone()))
            .await
            .unwrap();
        assert_eq!(list.total, 2);
        assert_eq!(list.wallets[0].wallet.id, second.id);
        assert_eq!(list.wallets[1].wallet.id, first.id);
    }

    #[tokio::test]
    async fn foreign_wallet_is_not_found() {
        let app = test_app();
        let owner = app.sign_in(OWNER);
        let stranger = app.sign_in("0x00000000000000000000000000000000000000a2");
        let wallet = app
            .state
            .custody
            .create_managed_wallet(&owner.user_id, None)
            .unwrap();

        let err = get_wallet(Auth(stranger), State(app.state.clone()), Path(wallet.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_renames_wallet() {
        let app = test_app();
        let session = app.sign_in(OWNER);
        let wallet = app
            .state
            .custody
            .create_managed_wallet(&session.user_id, None)
            .unwrap();

        let Json(updated) = update_wallet(
            Auth(session.clone()),
            State(app.state.clone()),
            Path(wallet.address.clone()),
            Json(UpdateWalletRequest {
                name: Some("Renamed".into()),
                is_active: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.wallet.wallet.name, "Renamed");

        let err = update_wallet(
            Auth(session),
            State(app.state.clone()),
            Path(wallet.id),
            Json(UpdateWalletRequest {
                name: Some("  ".into()),
                is_active: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn withdraw_over_balance_reports_details_and_records_nothing() {
        let app = test_app();
        let session = app.sign_in(OWNER);
        let wallet = app
            .state
            .custody
            .create_managed_wallet(&session.user_id, None)
            .unwrap();
        app.mainnet.set_balance(
            parse_address(&wallet.address).unwrap(),
            parse_ether("0.01").unwrap(),
        );

        let err = withdraw(
            Auth(session.clone()),
            State(app.state.clone()),
            Json(WithdrawBody {
                amount: "1".into(),
                wallet_id: Some(wallet.id.clone()),
                to: None,
                chain_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to process withdrawal");
        assert!(err.details.unwrap().contains("Insufficient funds"));

        let Json(history) = wallet_history(
            Auth(session),
            State(app.state.clone()),
            Path(wallet.id),
            Query(HistoryQuery::default()),
        )
        .await
        .unwrap();
        assert!(history.transactions.is_empty());
    }

    #[tokio::test]
    async fn withdraw_records_transaction() {
        let app = test_app();
        let session = app.sign_in(OWNER);
        let wallet = app
            .state
            .custody
            .create_managed_wallet(&session.user_id, None)
            .unwrap();
        app.mainnet.set_balance(
            parse_address(&wallet.address).unwrap(),
            parse_ether("1").unwrap(),
        );

        let Json(response) = withdraw(
            Auth(session.clone()),
            State(app.state.clone()),
            Json(WithdrawBody {
                amount: "0.25".into(),
                wallet_id: None,
                to: None,
                chain_id: None,
            }),
        )
        .await
        .unwrap();
        assert!(response.success);
        assert_eq!(response.transaction.status, TxOutcome::Confirmed);

        let Json(history) = wallet_history(
            Auth(session),
            State(app.state.clone()),
            Path(wallet.id),
            Query(HistoryQuery { limit: Some(10) }),
        )
        .await
        .unwrap();
        assert_eq!(history.transactions.len(), 1);
        assert_eq!(history.transactions[0].to, OWNER);
    }

    #[tokio::test]
    async fn sign_requires_message() {
        let app = test_app();
        let session = app.sign_in(OWNER);
        let wallet = app
            .state
            .custody
            .create_managed_wallet(&session.user_id, None)
            .unwrap();

        let err = sign_message(
            Auth(session.clone()),
            State(app.state.clone()),
            Path(wallet.id.clone()),
            Json(SignMessageRequest {
                message: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let Json(signed) = sign_message(
            Auth(session),
            State(app.state.clone()),
            Path(wallet.id),
            Json(SignMessageRequest {
                message: "gm".into(),
            }),
        )
        .await
        .unwrap();
        assert!(signed.signature.starts_with("0x"));
    }
}
