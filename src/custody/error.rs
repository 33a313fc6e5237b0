// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::blockchain::ChainError;
use crate::crypto::VaultError;
use crate::storage::StorageError;

/// Failures of custodial wallet operations.
#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("User not found")]
    UserNotFound,

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("No managed wallet found")]
    NoManagedWallet,

    #[error("Wallet encryption key is not configured")]
    EncryptionKeyMissing,

    #[error("Failed to decrypt private key")]
    DecryptionFailed,

    #[error("Failed to encrypt private key")]
    EncryptionFailed,

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Broadcast succeeded but the receipt could not be fetched.
    #[error("Transaction {hash} was sent but its receipt is unavailable: {reason}")]
    Unconfirmed {
        hash: String,
        chain_id: u64,
        reason: String,
    },

    #[error("Gas estimation failed: {0}")]
    EstimationFailed(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ChainError> for CustodyError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::InsufficientFunds(msg) => Self::InsufficientFunds(msg),
            ChainError::Rpc(msg) => Self::RpcUnavailable(msg),
            ChainError::InvalidRpcUrl(msg) => Self::RpcUnavailable(msg),
            ChainError::ReceiptTimeout(hash) => {
                Self::RpcUnavailable(format!("timed out waiting for receipt of {hash}"))
            }
            ChainError::EstimationFailed(msg) => Self::EstimationFailed(msg),
            ChainError::TransactionFailed(msg) => Self::TransactionFailed(msg),
            ChainError::InvalidPrivateKey(_) => Self::DecryptionFailed,
            ChainError::UnsupportedChain(id) => Self::UnsupportedChain(id),
            e @ (ChainError::InvalidAddress(_)
            | ChainError::InvalidAmount(_)
            | ChainError::InvalidTxHash(_)) => Self::InvalidRequest(e.to_string()),
        }
    }
}

impl From<VaultError> for CustodyError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::DecryptionFailed => Self::DecryptionFailed,
            VaultError::EncryptionFailed | VaultError::InvalidPlaintext => Self::EncryptionFailed,
        }
    }
}
