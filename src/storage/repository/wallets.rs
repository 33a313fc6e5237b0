// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Managed (custodial) wallet records.
//!
//! The encrypted private key lives on the stored row only. API responses use
//! [`WalletResponse`], which has no key field at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::crypto::EncryptedKey;
use crate::storage::database::{
    ordered_millis, ReadTxn, StorageError, StorageResult, WriteTxn, WALLETS, WALLETS_BY_USER,
    WALLETS_BY_WALLET_ID,
};

/// A server-held wallet owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedWallet {
    pub id: String,
    /// Lowercase address, used as the external wallet identifier.
    pub wallet_id: String,
    pub address: String,
    pub encrypted_private_key: EncryptedKey,
    pub name: String,
    pub user_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet as exposed via the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub id: String,
    pub wallet_id: String,
    pub address: String,
    pub name: String,
    pub user_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ManagedWallet> for WalletResponse {
    fn from(wallet: &ManagedWallet) -> Self {
        Self {
            id: wallet.id.clone(),
            wallet_id: wallet.wallet_id.clone(),
            address: wallet.address.clone(),
            name: wallet.name.clone(),
            user_id: wallet.user_id.clone(),
            is_active: wallet.is_active,
            created_at: wallet.created_at,
            updated_at: wallet.updated_at,
        }
    }
}

fn user_index_key(wallet: &ManagedWallet) -> String {
    format!(
        "{}|{}|{}",
        wallet.user_id,
        ordered_millis(wallet.created_at.timestamp_millis()),
        wallet.id
    )
}

pub struct WalletRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: ReadTxn> WalletRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    pub fn get(&self, id: &str) -> StorageResult<Option<ManagedWallet>> {
        self.txn.get_json(WALLETS, id)
    }

    pub fn get_by_wallet_id(&self, wallet_id: &str) -> StorageResult<Option<ManagedWallet>> {
        match self
            .txn
            .get_text(WALLETS_BY_WALLET_ID, &wallet_id.to_lowercase())?
        {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    /// Look a wallet up by row id, falling back to wallet id (address).
    pub fn resolve(&self, key: &str) -> StorageResult<Option<ManagedWallet>> {
        match self.get(key)? {
            Some(wallet) => Ok(Some(wallet)),
            None => self.get_by_wallet_id(key),
        }
    }

    /// Wallets of a user, oldest first.
    pub fn list_by_user(
        &self,
        user_id: &str,
        active_only: bool,
    ) -> StorageResult<Vec<ManagedWallet>> {
        let wallets: Vec<ManagedWallet> =
            self.txn.scan_index(WALLETS_BY_USER, &format!("{user_id}|"), WALLETS)?;
        Ok(wallets
            .into_iter()
            .filter(|w| !active_only || w.is_active)
            .collect())
    }

    /// The user's oldest active wallet, used as their default.
    pub fn first_active(&self, user_id: &str) -> StorageResult<Option<ManagedWallet>> {
        Ok(self.list_by_user(user_id, true)?.into_iter().next())
    }
}

impl<'t, T: WriteTxn> WalletRepository<'t, T> {
    pub fn insert(&self, wallet: &ManagedWallet) -> StorageResult<()> {
        if self
            .txn
            .get_text(WALLETS_BY_WALLET_ID, &wallet.wallet_id)?
            .is_some()
        {
            return Err(StorageError::Conflict(format!(
                "wallet {} already exists",
                wallet.wallet_id
            )));
        }
        self.txn.put_json(WALLETS, &wallet.id, wallet)?;
        self.txn
            .put_text(WALLETS_BY_WALLET_ID, &wallet.wallet_id, &wallet.id)?;
        self.txn
            .put_text(WALLETS_BY_USER, &user_index_key(wallet), &wallet.id)
    }

    /// Overwrite mutable fields (name, active flag). Indexes are unaffected.
    pub fn update(&self, wallet: &ManagedWallet) -> StorageResult<()> {
        self.txn.put_json(WALLETS, &wallet.id, wallet)
    }

    /// Mark the wallet inactive. The encrypted key is retained.
    pub fn soft_delete(&self, id: &str) -> StorageResult<ManagedWallet> {
        let mut wallet = self
            .get(id)?
            .ok_or_else(|| StorageError::NotFound(format!("wallet {id}")))?;
        wallet.is_active = false;
        wallet.updated_at = Utc::now();
        self.txn.put_json(WALLETS, &wallet.id, &wallet)?;
        Ok(wallet)
    }
}
