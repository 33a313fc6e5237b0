// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain access for custodial wallets.
//!
//! [`ChainProvider`] is the seam between custody logic and a JSON-RPC node.
//! [`RpcChainClient`] implements it over an alloy HTTP provider; tests swap in
//! an in-memory chain.

use std::{str::FromStr, time::Duration};

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, B256, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::TransportError,
};
use async_trait::async_trait;

use super::types::*;

/// HTTP provider type for Shape RPC (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Delay between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Give up waiting for a receipt after this many polls (~2 minutes).
const RECEIPT_POLL_ATTEMPTS: u32 = 60;

/// Operations the custody service needs from a chain node.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Network this provider talks to.
    fn network(&self) -> &NetworkConfig;

    /// Native balance in wei.
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Estimate gas for `tx` sent from `from`, priced at the current gas price.
    async fn estimate_gas(&self, from: Address, tx: &TxRequest) -> Result<GasEstimate, ChainError>;

    /// Sign `tx` with `signer` and broadcast it. Returns the transaction hash
    /// once the node has accepted it.
    async fn send_transaction(
        &self,
        signer: PrivateKeySigner,
        tx: TxRequest,
    ) -> Result<String, ChainError>;

    /// Block until the transaction is mined.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, ChainError>;
}

/// JSON-RPC backed chain client.
pub struct RpcChainClient {
    /// Network configuration
    network: NetworkConfig,
    rpc_url: url::Url,
    /// Alloy HTTP provider for reads
    provider: HttpProvider,
}

impl RpcChainClient {
    /// Create a new client for `network` reachable at `rpc_url`.
    pub fn new(network: NetworkConfig, rpc_url: &str) -> Result<Self, ChainError> {
        let rpc_url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());

        Ok(Self {
            network,
            rpc_url,
            provider,
        })
    }
}

#[async_trait]
impl ChainProvider for RpcChainClient {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn estimate_gas(&self, from: Address, tx: &TxRequest) -> Result<GasEstimate, ChainError> {
        let request = build_request(tx).from(from);

        let gas_limit = self.provider.estimate_gas(request).await.map_err(|e| {
            if e.is_transport_error() {
                ChainError::Rpc(e.to_string())
            } else {
                ChainError::EstimationFailed(e.to_string())
            }
        })?;

        let gas_price = match tx.gas_price {
            Some(price) => price,
            None => self
                .provider
                .get_gas_price()
                .await
                .map_err(|e| ChainError::Rpc(format!("Failed to get gas price: {e}")))?,
        };

        Ok(GasEstimate::new(gas_limit, gas_price))
    }

    async fn send_transaction(
        &self,
        signer: PrivateKeySigner,
        tx: TxRequest,
    ) -> Result<String, ChainError> {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(self.rpc_url.clone());

        let pending = provider
            .send_transaction(build_request(&tx))
            .await
            .map_err(classify_send_error)?;

        Ok(format!("{:?}", pending.tx_hash()))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, ChainError> {
        let hash =
            B256::from_str(tx_hash).map_err(|e| ChainError::InvalidTxHash(e.to_string()))?;

        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| ChainError::Rpc(format!("Failed to get receipt: {e}")))?;

            if let Some(receipt) = receipt {
                return Ok(to_receipt(tx_hash, &receipt));
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }

        Err(ChainError::ReceiptTimeout(tx_hash.to_string()))
    }
}

fn build_request(tx: &TxRequest) -> TransactionRequest {
    let mut request = TransactionRequest::default().to(tx.to).value(tx.value);
    if let Some(data) = &tx.data {
        request = request.input(data.clone().into());
    }
    if let Some(limit) = tx.gas_limit {
        request = request.gas_limit(limit);
    }
    if let Some(price) = tx.gas_price {
        request = request.gas_price(price);
    }
    request
}

fn classify_send_error(e: TransportError) -> ChainError {
    let message = e.to_string();
    if is_insufficient_funds(&message) {
        ChainError::InsufficientFunds(message)
    } else if e.is_transport_error() {
        ChainError::Rpc(message)
    } else {
        ChainError::TransactionFailed(message)
    }
}

fn is_insufficient_funds(message: &str) -> bool {
    message.to_ascii_lowercase().contains("insufficient funds")
}

fn to_receipt(tx_hash: &str, receipt: &TransactionReceipt) -> TxReceipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| ReceiptLog {
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
        })
        .collect();

    TxReceipt {
        tx_hash: tx_hash.to_string(),
        block_number: receipt.block_number.unwrap_or(0),
        gas_used: receipt.gas_used,
        success: receipt.status(),
        logs,
    }
}

/// Parse a `0x` address, accepting any letter case.
pub fn parse_address(value: &str) -> Result<Address, ChainError> {
    Address::from_str(value.trim()).map_err(|e| ChainError::InvalidAddress(format!("{value}: {e}")))
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Gas estimation failed: {0}")]
    EstimationFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Timed out waiting for receipt of {0}")]
    ReceiptTimeout(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),
}
