// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recorded on-chain transactions (withdrawals and pool deposits).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::TxOutcome;
use crate::storage::database::{
    inverted_millis, ReadTxn, StorageResult, WriteTxn, TRANSACTIONS, WALLET_TX_INDEX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Withdrawal,
    Deposit,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub tx_hash: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Amount in ETH as a decimal string
    pub amount: String,
    pub amount_wei: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    pub chain_id: u64,
    pub status: TxOutcome,
    pub user_id: String,
    pub managed_wallet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn wallet_index_key(record: &TransactionRecord) -> String {
    format!(
        "{}|{}|{}",
        record.managed_wallet_id,
        inverted_millis(record.created_at.timestamp_millis()),
        record.id
    )
}

pub struct TransactionRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: ReadTxn> TransactionRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    pub fn get(&self, id: &str) -> StorageResult<Option<TransactionRecord>> {
        self.txn.get_json(TRANSACTIONS, id)
    }

    /// Transactions sent from a managed wallet, newest first.
    pub fn list_by_wallet(
        &self,
        managed_wallet_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> = self.txn.scan_index(
            WALLET_TX_INDEX,
            &format!("{managed_wallet_id}|"),
            TRANSACTIONS,
        )?;
        records.truncate(limit);
        Ok(records)
    }

    /// Deposits into a pool, newest first.
    pub fn list_by_pool(&self, pool_id: &str, limit: usize) -> StorageResult<Vec<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> = self.txn.scan_json(TRANSACTIONS, "")?;
        records.retain(|r| r.pool_id.as_deref() == Some(pool_id));
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}

impl<'t, T: WriteTxn> TransactionRepository<'t, T> {
    pub fn insert(&self, record: &TransactionRecord) -> StorageResult<()> {
        self.txn.put_json(TRANSACTIONS, &record.id, record)?;
        self.txn
            .put_text(WALLET_TX_INDEX, &wallet_index_key(record), &record.id)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(id: &str, wallet_id: &str, age_secs: i64) -> TransactionRecord {
    TransactionRecord {
        id: id.to_string(),
        tx_hash: format!("0x{:064x}", id.len()),
        kind: TransactionKind::Withdrawal,
        amount: "0.1".to_string(),
        amount_wei: "100000000000000000".to_string(),
        token_address: None,
        chain_id: 360,
        status: TxOutcome::Confirmed,
        user_id: "u1".to_string(),
        managed_wallet_id: wallet_id.to_string(),
        pool_id: None,
        to: "0x00000000000000000000000000000000000000bb".to_string(),
        block_number: Some(1),
        gas_used: Some("21000".to_string()),
        created_at: Utc::now() - chrono::Duration::seconds(age_secs),
    }
}
