// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory chain for tests.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use alloy::{
    primitives::{keccak256, Address, U256},
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
};
use async_trait::async_trait;

use super::{
    client::{ChainError, ChainProvider},
    pool_contract::{invest_calldata, IPool},
    types::*,
};

const TRANSFER_GAS: u64 = 21_000;
const CONTRACT_GAS: u64 = 80_000;
const GAS_PRICE: u128 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: String,
    pub from: Address,
    pub request: TxRequest,
}

#[derive(Default)]
struct MockState {
    balances: HashMap<Address, U256>,
    offline: bool,
    reverting: bool,
    dropping_receipts: bool,
    sent: Vec<SentTx>,
    receipts: HashMap<String, TxReceipt>,
    pool_totals: HashMap<Address, U256>,
}

/// Chain double with balances, outages and reverts.
pub struct MockChain {
    network: NetworkConfig,
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(network: NetworkConfig) -> Self {
        Self {
            network,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.state.lock().unwrap().balances.insert(address, wei);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    /// Make every call fail as an unreachable node would.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Make gas estimation fail as a reverting call would.
    pub fn set_reverting(&self, reverting: bool) {
        self.state.lock().unwrap().reverting = reverting;
    }

    /// Accept sends but fail every receipt lookup, as a node that drops
    /// the connection after broadcast would.
    pub fn set_dropping_receipts(&self, dropping: bool) {
        self.state.lock().unwrap().dropping_receipts = dropping;
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    fn gas_for(tx: &TxRequest) -> u64 {
        tx.gas_limit.unwrap_or(match &tx.data {
            Some(data) if !data.is_empty() => CONTRACT_GAS,
            _ => TRANSFER_GAS,
        })
    }
}

#[async_trait]
impl ChainProvider for MockChain {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, _from: Address, tx: &TxRequest) -> Result<GasEstimate, ChainError> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        if state.reverting {
            return Err(ChainError::EstimationFailed("execution reverted".into()));
        }
        Ok(GasEstimate::new(
            Self::gas_for(tx),
            tx.gas_price.unwrap_or(GAS_PRICE),
        ))
    }

    async fn send_transaction(
        &self,
        signer: PrivateKeySigner,
        tx: TxRequest,
    ) -> Result<String, ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(ChainError::Rpc("connection refused".into()));
        }

        let from = signer.address();
        let gas_used = Self::gas_for(&tx);
        let fee = U256::from(gas_used) * U256::from(tx.gas_price.unwrap_or(GAS_PRICE));
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if balance < tx.value + fee {
            return Err(ChainError::InsufficientFunds(
                "insufficient funds for gas * price + value".into(),
            ));
        }

        state.balances.insert(from, balance - tx.value - fee);
        *state.balances.entry(tx.to).or_default() += tx.value;

        let hash = format!(
            "{:?}",
            keccak256(format!("{}:{from}:{}", self.network.chain_id, state.sent.len()))
        );

        let mut logs = Vec::new();
        if tx.data.as_ref() == Some(&invest_calldata()) {
            let total = state.pool_totals.entry(tx.to).or_default();
            *total += tx.value;
            let event = IPool::ParticipationUpdated {
                participant: from,
                amount: tx.value,
                totalContribution: *total,
            };
            let data = event.encode_log_data();
            logs.push(ReceiptLog {
                address: tx.to,
                topics: data.topics().to_vec(),
                data: data.data.clone(),
            });
        }

        let block_number = state.sent.len() as u64 + 1;
        state.receipts.insert(
            hash.clone(),
            TxReceipt {
                tx_hash: hash.clone(),
                block_number,
                gas_used,
                success: true,
                logs,
            },
        );
        state.sent.push(SentTx {
            hash: hash.clone(),
            from,
            request: tx,
        });
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, ChainError> {
        let state = self.state.lock().unwrap();
        if state.offline || state.dropping_receipts {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        state
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::ReceiptTimeout(tx_hash.to_string()))
    }
}
