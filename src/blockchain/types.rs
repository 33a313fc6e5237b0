// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shape network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Public RPC endpoint, used unless overridden by configuration
    pub default_rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Shape mainnet configuration.
pub const SHAPE_MAINNET: NetworkConfig = NetworkConfig {
    name: "Shape",
    chain_id: 360,
    default_rpc_url: "https://mainnet.shape.network",
    explorer_url: "https://shapescan.xyz",
};

/// Shape Sepolia testnet configuration.
pub const SHAPE_SEPOLIA: NetworkConfig = NetworkConfig {
    name: "Shape Sepolia",
    chain_id: 11011,
    default_rpc_url: "https://sepolia.shape.network",
    explorer_url: "https://sepolia.shapescan.xyz",
};

/// Networks this deployment knows how to reach.
pub const SUPPORTED_NETWORKS: [NetworkConfig; 2] = [SHAPE_MAINNET, SHAPE_SEPOLIA];

pub fn network_by_chain_id(chain_id: u64) -> Option<NetworkConfig> {
    SUPPORTED_NETWORKS
        .iter()
        .find(|n| n.chain_id == chain_id)
        .cloned()
}

/// Outgoing transaction parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub value: U256,
    pub data: Option<Bytes>,
    /// Gas limit override
    pub gas_limit: Option<u64>,
    /// Legacy gas price override in wei
    pub gas_price: Option<u128>,
}

/// Gas estimation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasEstimate {
    /// Estimated gas limit
    pub gas_limit: u64,
    /// Current gas price in wei
    pub gas_price: u128,
    /// `gas_limit * gas_price`
    pub estimated_cost_wei: U256,
}

impl GasEstimate {
    pub fn new(gas_limit: u64, gas_price: u128) -> Self {
        Self {
            gas_limit,
            gas_price,
            estimated_cost_wei: U256::from(gas_limit) * U256::from(gas_price),
        }
    }
}

/// A log emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Transaction receipt after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: String,
    /// Block number where transaction was included
    pub block_number: u64,
    /// Gas actually used
    pub gas_used: u64,
    /// Whether the transaction was successful
    pub success: bool,
    pub logs: Vec<ReceiptLog>,
}

/// Lifecycle state of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxOutcome {
    Pending,
    Confirmed,
    Failed,
}

/// Result of submitting a transaction, as reported to API clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    /// Transaction hash
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Gas used, as a decimal string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    pub status: TxOutcome,
}

impl TransactionResult {
    pub fn new(hash: String, receipt: Option<&TxReceipt>) -> Self {
        match receipt {
            Some(receipt) => Self {
                hash,
                block_number: Some(receipt.block_number),
                gas_used: Some(receipt.gas_used.to_string()),
                status: if receipt.success {
                    TxOutcome::Confirmed
                } else {
                    TxOutcome::Failed
                },
            },
            None => Self {
                hash,
                block_number: None,
                gas_used: None,
                status: TxOutcome::Pending,
            },
        }
    }
}
