// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cached on-chain balances, one row per `(wallet_id, chain_id)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{ReadTxn, StorageResult, WriteTxn, WALLET_BALANCES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub wallet_id: String,
    pub chain_id: u64,
    /// Balance in wei, decimal string
    pub balance: String,
    /// Balance in ETH, decimal string
    #[serde(rename = "balanceETH")]
    pub balance_eth: String,
    pub last_synced_at: DateTime<Utc>,
}

impl WalletBalance {
    pub fn zero(wallet_id: &str, chain_id: u64) -> Self {
        Self {
            wallet_id: wallet_id.to_string(),
            chain_id,
            balance: "0".to_string(),
            balance_eth: "0.0".to_string(),
            last_synced_at: Utc::now(),
        }
    }
}

fn balance_key(wallet_id: &str, chain_id: u64) -> String {
    format!("{}|{chain_id}", wallet_id.to_lowercase())
}

pub struct BalanceRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: ReadTxn> BalanceRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    pub fn get(&self, wallet_id: &str, chain_id: u64) -> StorageResult<Option<WalletBalance>> {
        self.txn
            .get_json(WALLET_BALANCES, &balance_key(wallet_id, chain_id))
    }

    pub fn list_for_wallet(&self, wallet_id: &str) -> StorageResult<Vec<WalletBalance>> {
        self.txn
            .scan_json(WALLET_BALANCES, &format!("{}|", wallet_id.to_lowercase()))
    }
}

impl<'t, T: WriteTxn> BalanceRepository<'t, T> {
    pub fn upsert(&self, balance: &WalletBalance) -> StorageResult<()> {
        self.txn.put_json(
            WALLET_BALANCES,
            &balance_key(&balance.wallet_id, balance.chain_id),
            balance,
        )
    }
}
