// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Investment pool records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{ReadTxn, StorageError, StorageResult, WriteTxn, POOLS};

/// Funding state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolStatus {
    Funding,
    Active,
    Closed,
}

/// An NFT-collection pool deployed on chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: String,
    pub name: String,
    /// Pool contract address
    pub pool_address: String,
    /// NFT collection the pool buys into (lowercase)
    pub nft_collection: String,
    pub chain_id: u64,
    /// Free-form pool category used by auto-investment filters
    pub pool_type: String,
    /// Target buy price in wei
    pub buy_price: String,
    /// Target sell price in wei
    pub sell_price: String,
    /// Creator fee in percent
    pub creator_fee: f64,
    pub status: PoolStatus,
    /// Sum of contributions in wei
    pub total_contribution: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct PoolRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: ReadTxn> PoolRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    pub fn get(&self, pool_id: &str) -> StorageResult<Option<Pool>> {
        self.txn.get_json(POOLS, pool_id)
    }

    /// All pools, newest first, optionally filtered by status.
    pub fn list(&self, status: Option<PoolStatus>) -> StorageResult<Vec<Pool>> {
        let mut pools: Vec<Pool> = self.txn.scan_json(POOLS, "")?;
        pools.retain(|p| status.is_none_or(|s| p.status == s));
        pools.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pools)
    }

    /// Look a pool up by id, or by contract address (any case).
    pub fn find(&self, identifier: &str) -> StorageResult<Option<Pool>> {
        if let Some(pool) = self.get(identifier)? {
            return Ok(Some(pool));
        }
        if identifier.starts_with("0x") && identifier.len() == 42 {
            let pools: Vec<Pool> = self.txn.scan_json(POOLS, "")?;
            return Ok(pools
                .into_iter()
                .find(|p| p.pool_address.eq_ignore_ascii_case(identifier)));
        }
        Ok(None)
    }
}

impl<'t, T: WriteTxn> PoolRepository<'t, T> {
    pub fn insert(&self, pool: &Pool) -> StorageResult<()> {
        if self.txn.get_bytes(POOLS, &pool.id)?.is_some() {
            return Err(StorageError::Conflict(format!("pool {} already exists", pool.id)));
        }
        self.txn.put_json(POOLS, &pool.id, pool)
    }

    pub fn update(&self, pool: &Pool) -> StorageResult<()> {
        self.txn.put_json(POOLS, &pool.id, pool)
    }
}

#[cfg(test)]
pub(crate) fn sample_pool(id: &str) -> Pool {
    let now = Utc::now();
    Pool {
        id: id.to_string(),
        name: format!("Pool {id}"),
        pool_address: "0x00000000000000000000000000000000000000aa".to_string(),
        nft_collection: "0x00000000000000000000000000000000000000cc".to_string(),
        chain_id: 11011,
        pool_type: "floor".to_string(),
        buy_price: "500000000000000000".to_string(),
        sell_price: "800000000000000000".to_string(),
        creator_fee: 2.5,
        status: PoolStatus::Funding,
        total_contribution: "0".to_string(),
        creator_id: "creator".to_string(),
        created_at: now,
        updated_at: now,
    }
}
