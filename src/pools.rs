// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pool registry and investments into pool contracts.
//!
//! An investment calls the payable `invest()` of the pool contract from the
//! investor's managed wallet, waits for the receipt and then, in one write
//! transaction, bumps the pool's total contribution and records the deposit.

use std::sync::Arc;

use alloy::primitives::U256;
use chrono::Utc;
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{
    parse_address,
    pool_contract::{find_participation, invest_calldata},
    units::{format_ether, parse_ether, parse_wei, wei_to_eth_f64},
    TxOutcome, TxReceipt, TxRequest,
};
use crate::custody::{CustodyError, CustodyService, SubmitRequest};
use crate::storage::{
    AuditEvent, AuditEventType, AutoInvestRepository, AutoInvestment, AutoInvestmentStatus, Pool,
    PoolRepository, PoolStatus, StorageError, Store, TransactionKind, TransactionRecord,
    TransactionRepository, WalletRepository,
};

/// Number of recent deposits included in pool details.
const RECENT_TRANSACTIONS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Pool not found")]
    NotFound,

    #[error("Invalid investment amount")]
    InvalidAmount,

    #[error("No managed wallet found")]
    NoManagedWallet,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parameters of an on-chain pool to register.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPool {
    pub name: String,
    pub pool_address: String,
    #[serde(alias = "nftCollectionAddress")]
    pub nft_collection: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    pub pool_type: String,
    /// Buy price in ETH
    pub buy_price: String,
    /// Sell price in ETH
    pub sell_price: String,
    /// Creator fee in percent
    pub creator_fee: f64,
    #[serde(default)]
    pub status: Option<PoolStatus>,
}

/// A pool with derived prices and recent activity.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolDetails {
    #[serde(flatten)]
    pub pool: Pool,
    #[serde(rename = "buyPriceETH")]
    pub buy_price_eth: String,
    #[serde(rename = "sellPriceETH")]
    pub sell_price_eth: String,
    #[serde(rename = "totalContributionETH")]
    pub total_contribution_eth: String,
    pub transactions: Vec<TransactionRecord>,
    pub auto_investments: Vec<AutoInvestment>,
    pub stats: PoolStats,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total_transactions: usize,
    pub total_auto_investments: usize,
    /// Sum of completed auto-investments, in ETH
    pub total_auto_invested: f64,
    /// `sell - buy`, in ETH
    pub spread: f64,
    /// Spread relative to the buy price, in percent
    pub spread_percentage: f64,
}

/// An investment to execute.
#[derive(Debug, Clone)]
pub struct InvestRequest {
    pub user_id: String,
    /// Paying wallet; the user's first active wallet when absent
    pub wallet: Option<String>,
    pub pool_id: String,
    /// Amount in ETH
    pub amount: String,
    /// Chain to invest on; the configured investment chain when absent
    pub chain_id: Option<u64>,
}

/// A completed investment.
#[derive(Debug, Clone)]
pub struct Investment {
    pub record: TransactionRecord,
    pub pool: Pool,
    /// Whether the pool emitted `ParticipationUpdated`
    pub participation_logged: bool,
}

#[derive(Clone)]
pub struct PoolService {
    store: Arc<Store>,
    custody: CustodyService,
    invest_chain_id: u64,
}

impl PoolService {
    pub fn new(store: Arc<Store>, custody: CustodyService, invest_chain_id: u64) -> Self {
        Self {
            store,
            custody,
            invest_chain_id,
        }
    }

    pub fn register_pool(&self, creator_id: &str, request: RegisterPool) -> Result<Pool, PoolError> {
        if request.name.trim().is_empty() {
            return Err(PoolError::Validation("Pool name is required".into()));
        }
        if !(0.0..=100.0).contains(&request.creator_fee) {
            return Err(PoolError::Validation("Creator fee must be between 0 and 100".into()));
        }
        let pool_address = parse_address(&request.pool_address).map_err(CustodyError::from)?;
        let nft_collection = parse_address(&request.nft_collection).map_err(CustodyError::from)?;
        let buy_price = parse_ether(&request.buy_price).map_err(CustodyError::from)?;
        let sell_price = parse_ether(&request.sell_price).map_err(CustodyError::from)?;

        let now = Utc::now();
        let pool = Pool {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            pool_address: pool_address.to_string().to_lowercase(),
            nft_collection: nft_collection.to_string().to_lowercase(),
            chain_id: request.chain_id.unwrap_or(self.invest_chain_id),
            pool_type: request.pool_type,
            buy_price: buy_price.to_string(),
            sell_price: sell_price.to_string(),
            creator_fee: request.creator_fee,
            status: request.status.unwrap_or(PoolStatus::Funding),
            total_contribution: "0".to_string(),
            creator_id: creator_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store
            .write(|txn| PoolRepository::new(txn).insert(&pool))?;

        tracing::info!(pool_id = %pool.id, pool_address = %pool.pool_address, "Registered pool");
        Ok(pool)
    }

    pub fn list_pools(&self, status: Option<PoolStatus>) -> Result<Vec<Pool>, PoolError> {
        Ok(self.store.read(|txn| PoolRepository::new(txn).list(status))?)
    }

    /// Pools registered by `creator_id`, newest first.
    pub fn list_pools_by_creator(&self, creator_id: &str) -> Result<Vec<Pool>, PoolError> {
        let mut pools = self.list_pools(None)?;
        pools.retain(|p| p.creator_id == creator_id);
        Ok(pools)
    }

    /// Pools buying into an NFT collection, newest first.
    pub fn list_pools_by_collection(&self, collection: &str) -> Result<Vec<Pool>, PoolError> {
        if !collection.starts_with("0x") || collection.len() != 42 {
            return Err(PoolError::Validation("Invalid collection address format".into()));
        }
        let mut pools = self.list_pools(None)?;
        pools.retain(|p| p.nft_collection.eq_ignore_ascii_case(collection));
        Ok(pools)
    }

    /// A pool by id or contract address.
    pub fn get_pool(&self, identifier: &str) -> Result<Pool, PoolError> {
        self.store
            .read(|txn| PoolRepository::new(txn).find(identifier))?
            .ok_or(PoolError::NotFound)
    }

    pub fn pool_details(&self, identifier: &str) -> Result<PoolDetails, PoolError> {
        let pool = self.get_pool(identifier)?;
        let (transactions, mut auto_investments) = self.store.read(|txn| {
            let transactions =
                TransactionRepository::new(txn).list_by_pool(&pool.id, RECENT_TRANSACTIONS)?;
            let mut investments = AutoInvestRepository::new(txn).list_investments()?;
            investments.retain(|i| i.pool_id == pool.id);
            Ok((transactions, investments))
        })?;
        auto_investments.retain(|i| i.status == AutoInvestmentStatus::Completed);
        auto_investments.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));

        let buy = wei_to_eth_f64(parse_wei(&pool.buy_price).unwrap_or_default());
        let sell = wei_to_eth_f64(parse_wei(&pool.sell_price).unwrap_or_default());
        let spread = sell - buy;
        let stats = PoolStats {
            total_transactions: transactions.len(),
            total_auto_investments: auto_investments.len(),
            total_auto_invested: auto_investments.iter().map(|i| i.amount).sum(),
            spread,
            spread_percentage: if buy > 0.0 { spread / buy * 100.0 } else { 0.0 },
        };

        Ok(PoolDetails {
            buy_price_eth: format!("{buy:.6}"),
            sell_price_eth: format!("{sell:.6}"),
            total_contribution_eth: eth_string(&pool.total_contribution),
            pool,
            transactions,
            auto_investments,
            stats,
        })
    }

    /// Invest `request.amount` ETH into a pool.
    pub async fn invest(&self, request: InvestRequest) -> Result<Investment, PoolError> {
        self.invest_with(request, |_, _| Ok(())).await
    }

    /// Invest, running `on_commit` inside the transaction that records the
    /// deposit. If `on_commit` fails nothing is recorded.
    pub async fn invest_with<F>(
        &self,
        request: InvestRequest,
        on_commit: F,
    ) -> Result<Investment, PoolError>
    where
        F: FnOnce(&WriteTransaction, &TransactionRecord) -> Result<(), PoolError> + Send + 'static,
    {
        let amount_wei = parse_ether(&request.amount).map_err(|_| PoolError::InvalidAmount)?;
        if amount_wei.is_zero() {
            return Err(PoolError::InvalidAmount);
        }

        let (pool, wallet) = self.store.read(|txn| {
            let pool = PoolRepository::new(txn).get(&request.pool_id)?;
            let wallets = WalletRepository::new(txn);
            let wallet = match &request.wallet {
                Some(key) => wallets
                    .resolve(key)?
                    .filter(|w| w.user_id == request.user_id && w.is_active),
                None => wallets.first_active(&request.user_id)?,
            };
            Ok((pool, wallet))
        })?;
        let pool = pool.ok_or(PoolError::NotFound)?;
        let wallet = wallet.ok_or(PoolError::NoManagedWallet)?;
        let pool_address = parse_address(&pool.pool_address).map_err(CustodyError::from)?;

        tracing::info!(
            pool_id = %pool.id,
            wallet_id = %wallet.wallet_id,
            amount_wei = %amount_wei,
            "Investing in pool"
        );

        let deposit = |hash: &str, chain_id: u64, receipt: Option<&TxReceipt>| TransactionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            tx_hash: hash.to_string(),
            kind: TransactionKind::Deposit,
            amount: format_ether(amount_wei),
            amount_wei: amount_wei.to_string(),
            token_address: Some(pool.pool_address.clone()),
            chain_id,
            status: if receipt.is_some() {
                TxOutcome::Confirmed
            } else {
                TxOutcome::Pending
            },
            user_id: request.user_id.clone(),
            managed_wallet_id: wallet.id.clone(),
            pool_id: Some(pool.id.clone()),
            to: pool.pool_address.clone(),
            block_number: receipt.map(|r| r.block_number),
            gas_used: receipt.map(|r| r.gas_used.to_string()),
            created_at: Utc::now(),
        };

        let submitted = self
            .custody
            .sign_and_submit(SubmitRequest {
                wallet: wallet.id.clone(),
                owner_id: request.user_id.clone(),
                chain_id: Some(request.chain_id.unwrap_or(self.invest_chain_id)),
                tx: TxRequest {
                    to: pool_address,
                    value: amount_wei,
                    data: Some(invest_calldata()),
                    ..TxRequest::default()
                },
                wait: true,
            })
            .await;
        let submission = match submitted {
            Ok(submission) => submission,
            // The pool total only moves on a confirmed receipt.
            Err(CustodyError::Unconfirmed {
                hash,
                chain_id,
                reason,
            }) => {
                let record = deposit(&hash, chain_id, None);
                self.store
                    .write_blocking(move |txn| TransactionRepository::new(txn).insert(&record))
                    .await?;
                return Err(CustodyError::Unconfirmed {
                    hash,
                    chain_id,
                    reason,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(receipt) = &submission.receipt else {
            return Err(CustodyError::TransactionFailed("no receipt".into()).into());
        };
        if !receipt.success {
            return Err(CustodyError::TransactionFailed(format!(
                "investment {} reverted",
                submission.hash
            ))
            .into());
        }

        let participation = find_participation(receipt, pool_address);
        if participation.is_none() {
            tracing::warn!(
                tx_hash = %submission.hash,
                pool_id = %pool.id,
                "Investment event not found, but transaction was successful"
            );
        }

        let record = deposit(&submission.hash, submission.chain_id, Some(receipt));

        let pool_id = pool.id.clone();
        let (pool, record) = self
            .store
            .write_blocking(move |txn| {
                let pools = PoolRepository::new(txn);
                let mut pool = pools.get(&pool_id)?.ok_or(PoolError::NotFound)?;
                let total = parse_wei(&pool.total_contribution).unwrap_or(U256::ZERO);
                pool.total_contribution = (total + amount_wei).to_string();
                pool.updated_at = Utc::now();
                pools.update(&pool)?;
                TransactionRepository::new(txn).insert(&record)?;
                on_commit(txn, &record)?;
                Ok::<_, PoolError>((pool, record))
            })
            .await?;

        AuditEvent::new(AuditEventType::PoolInvestment)
            .with_user(&request.user_id)
            .with_resource("pool", &pool.id)
            .with_details(serde_json::json!({
                "tx_hash": record.tx_hash,
                "amount_wei": record.amount_wei,
                "wallet_id": wallet.id,
            }))
            .record(&self.store);

        Ok(Investment {
            record,
            pool,
            participation_logged: participation.is_some(),
        })
    }
}

fn eth_string(wei: &str) -> String {
    parse_wei(wei).map(format_ether).unwrap_or_else(|_| "0.0".to_string())
}
