// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial wallet lifecycle: creation, key use and balance caching.
//!
//! Decrypted keys exist only as a [`PrivateKeySigner`] local to a single
//! call. Every key use is recorded in the audit log.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::CustodyError;
use crate::auth::{request_signature, WalletConnection};
use crate::blockchain::{
    parse_address,
    signing::{generate_keypair, signer_from_hex},
    units::{format_ether, format_units, parse_ether, parse_units, GWEI_DECIMALS},
    ChainProvider, ChainRegistry, TransactionResult, TxReceipt, TxRequest,
};
use crate::crypto::KeyVault;
use crate::storage::{
    AuditEvent, AuditEventType, BalanceRepository, ManagedWallet, StorageError, Store,
    TransactionKind, TransactionRecord, TransactionRepository, UserRepository, WalletBalance,
    WalletRepository,
};

/// Note attached to balances served from cache.
pub const STALE_BALANCE_NOTE: &str = "Balance from cache (RPC unavailable)";

/// A balance as reported to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub address: String,
    /// Wei, decimal string
    pub balance: String,
    #[serde(rename = "balanceETH")]
    pub balance_eth: String,
    pub chain_id: u64,
    pub last_synced_at: chrono::DateTime<Utc>,
    /// Whether the chain could not be reached and the cached row was used
    #[serde(skip)]
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Gas quote for a prospective transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GasQuote {
    /// Estimated gas units
    pub gas_estimate: String,
    /// Gas price in gwei
    pub gas_price: String,
    pub gas_price_wei: String,
    pub estimated_cost_wei: String,
    #[serde(rename = "estimatedCostETH")]
    pub estimated_cost_eth: String,
}

/// A transaction to sign with a managed wallet.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Wallet row id or wallet id (address)
    pub wallet: String,
    pub owner_id: String,
    /// Chain to submit on; the default chain when absent
    pub chain_id: Option<u64>,
    pub tx: TxRequest,
    /// Wait for the receipt before returning
    pub wait: bool,
}

/// Outcome of [`CustodyService::sign_and_submit`].
#[derive(Debug, Clone)]
pub struct Submission {
    pub wallet: ManagedWallet,
    pub chain_id: u64,
    pub hash: String,
    pub receipt: Option<TxReceipt>,
}

impl Submission {
    pub fn result(&self) -> TransactionResult {
        TransactionResult::new(self.hash.clone(), self.receipt.as_ref())
    }
}

/// Withdrawal parameters. Missing fields default to the user's first active
/// wallet and the user's sign-in address.
#[derive(Debug, Clone, Default)]
pub struct WithdrawRequest {
    pub wallet: Option<String>,
    pub to: Option<String>,
    /// Amount in ETH
    pub amount: String,
    pub chain_id: Option<u64>,
}

/// Build a [`TxRequest`] from API-level strings.
///
/// `value` is in ETH and `gas_price_gwei` in gwei. A data value of `0x` is
/// treated as no calldata.
pub fn build_tx_request(
    to: &str,
    value: &str,
    data: Option<&str>,
    gas_limit: Option<u64>,
    gas_price_gwei: Option<&str>,
) -> Result<TxRequest, CustodyError> {
    let to = parse_address(to)?;
    let value = parse_ether(value)?;
    let data = match data.map(str::trim) {
        None | Some("") | Some("0x") => None,
        Some(hex) => Some(
            Bytes::from_str(hex)
                .map_err(|_| CustodyError::InvalidRequest(format!("Invalid calldata: {hex}")))?,
        ),
    };
    let gas_price = match gas_price_gwei {
        Some(gwei) => {
            let wei = parse_units(gwei, GWEI_DECIMALS)?;
            Some(u128::try_from(wei).map_err(|_| {
                CustodyError::InvalidRequest(format!("Gas price out of range: {gwei}"))
            })?)
        }
        None => None,
    };

    Ok(TxRequest {
        to,
        value,
        data,
        gas_limit,
        gas_price,
    })
}

#[derive(Clone)]
pub struct CustodyService {
    store: Arc<Store>,
    chains: ChainRegistry,
    vault: Option<KeyVault>,
    default_chain_id: u64,
}

impl CustodyService {
    pub fn new(
        store: Arc<Store>,
        chains: ChainRegistry,
        vault: Option<KeyVault>,
        default_chain_id: u64,
    ) -> Self {
        Self {
            store,
            chains,
            vault,
            default_chain_id,
        }
    }

    pub fn default_chain_id(&self) -> u64 {
        self.default_chain_id
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    /// Whether private keys can be encrypted and decrypted.
    pub fn has_vault(&self) -> bool {
        self.vault.is_some()
    }

    fn vault(&self) -> Result<&KeyVault, CustodyError> {
        self.vault.as_ref().ok_or(CustodyError::EncryptionKeyMissing)
    }

    fn provider(&self, chain_id: Option<u64>) -> Result<Arc<dyn ChainProvider>, CustodyError> {
        Ok(self.chains.get(chain_id.unwrap_or(self.default_chain_id))?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a managed wallet with a fresh key for `user_id`.
    pub fn create_managed_wallet(
        &self,
        user_id: &str,
        name: Option<&str>,
    ) -> Result<ManagedWallet, CustodyError> {
        let vault = self.vault()?;
        let (private_key, address) = generate_keypair();
        let encrypted_private_key = vault.encrypt(&private_key)?;
        drop(private_key);

        let now = Utc::now();
        let wallet = ManagedWallet {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_id: address.clone(),
            address,
            encrypted_private_key,
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Wallet {}", now.timestamp_millis())),
            user_id: user_id.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.store.write(|txn| {
            if UserRepository::new(txn).get(user_id)?.is_none() {
                return Err(CustodyError::UserNotFound);
            }
            WalletRepository::new(txn).insert(&wallet)?;
            BalanceRepository::new(txn)
                .upsert(&WalletBalance::zero(&wallet.wallet_id, self.default_chain_id))?;
            Ok(())
        })?;

        tracing::info!(
            wallet_id = %wallet.wallet_id,
            user_id = %user_id,
            "Created managed wallet"
        );
        AuditEvent::new(AuditEventType::WalletCreated)
            .with_user(user_id)
            .with_resource("wallet", &wallet.id)
            .with_details(serde_json::json!({ "address": wallet.address }))
            .record(&self.store);

        Ok(wallet)
    }

    /// Active wallets of a user, oldest first.
    pub fn list_wallets(&self, user_id: &str) -> Result<Vec<ManagedWallet>, CustodyError> {
        Ok(self
            .store
            .read(|txn| WalletRepository::new(txn).list_by_user(user_id, true))?)
    }

    /// An active wallet owned by `owner_id`, looked up by row id or address.
    ///
    /// Foreign and deactivated wallets are reported as not found.
    pub fn get_wallet(&self, key: &str, owner_id: &str) -> Result<ManagedWallet, CustodyError> {
        self.store
            .read(|txn| WalletRepository::new(txn).resolve(key))?
            .filter(|w| w.user_id == owner_id && w.is_active)
            .ok_or(CustodyError::WalletNotFound)
    }

    /// Rename or (de)activate a wallet.
    pub fn update_wallet(
        &self,
        key: &str,
        owner_id: &str,
        name: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<ManagedWallet, CustodyError> {
        self.store.write(|txn| {
            let repo = WalletRepository::new(txn);
            let mut wallet = repo
                .resolve(key)?
                .filter(|w| w.user_id == owner_id)
                .ok_or(CustodyError::WalletNotFound)?;
            if let Some(name) = name {
                wallet.name = name.trim().to_string();
            }
            if let Some(active) = is_active {
                wallet.is_active = active;
            }
            wallet.updated_at = Utc::now();
            repo.update(&wallet)?;
            Ok(wallet)
        })
    }

    /// Soft-delete a wallet. The encrypted key is retained.
    pub fn delete_wallet(&self, key: &str, owner_id: &str) -> Result<ManagedWallet, CustodyError> {
        let wallet = self.get_wallet(key, owner_id)?;
        let wallet = self
            .store
            .write(|txn| WalletRepository::new(txn).soft_delete(&wallet.id))?;

        tracing::info!(wallet_id = %wallet.wallet_id, user_id = %owner_id, "Deactivated managed wallet");
        AuditEvent::new(AuditEventType::WalletDeleted)
            .with_user(owner_id)
            .with_resource("wallet", &wallet.id)
            .record(&self.store);
        Ok(wallet)
    }

    /// Recover the signer of a wallet from its stored envelope.
    ///
    /// Fails with `DecryptionFailed` unless the key controls `wallet.address`.
    pub fn decrypt_private_key(
        &self,
        wallet: &ManagedWallet,
    ) -> Result<PrivateKeySigner, CustodyError> {
        let private_key = self
            .vault()?
            .decrypt_for(&wallet.encrypted_private_key, &wallet.address)?;
        Ok(signer_from_hex(&private_key)?)
    }

    // =========================================================================
    // Key use
    // =========================================================================

    /// Sign `request.tx` with the wallet key and broadcast it.
    pub async fn sign_and_submit(&self, request: SubmitRequest) -> Result<Submission, CustodyError> {
        let wallet = self.get_wallet(&request.wallet, &request.owner_id)?;
        let provider = self.provider(request.chain_id)?;
        let chain_id = provider.network().chain_id;
        let signer = self.decrypt_private_key(&wallet)?;

        let to = request.tx.to;
        let value = request.tx.value;
        let hash = match provider.send_transaction(signer, request.tx).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    wallet_id = %wallet.wallet_id,
                    chain_id,
                    "Transaction submission failed"
                );
                AuditEvent::new(AuditEventType::TransactionBroadcast)
                    .with_user(&request.owner_id)
                    .with_resource("wallet", &wallet.id)
                    .with_details(serde_json::json!({ "to": to.to_string(), "value": value.to_string() }))
                    .failed(e.to_string())
                    .record(&self.store);
                return Err(e.into());
            }
        };

        tracing::info!(tx_hash = %hash, wallet_id = %wallet.wallet_id, chain_id, "Transaction sent");
        AuditEvent::new(AuditEventType::TransactionBroadcast)
            .with_user(&request.owner_id)
            .with_resource("wallet", &wallet.id)
            .with_details(serde_json::json!({
                "tx_hash": hash,
                "to": to.to_string(),
                "value": value.to_string(),
                "chain_id": chain_id,
            }))
            .record(&self.store);

        let receipt = if request.wait {
            match provider.wait_for_receipt(&hash).await {
                Ok(receipt) => Some(receipt),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        tx_hash = %hash,
                        chain_id,
                        "Receipt unavailable for sent transaction"
                    );
                    return Err(CustodyError::Unconfirmed {
                        hash,
                        chain_id,
                        reason: CustodyError::from(e).to_string(),
                    });
                }
            }
        } else {
            None
        };

        Ok(Submission {
            wallet,
            chain_id,
            hash,
            receipt,
        })
    }

    /// EIP-191 signature over `message` with the wallet key.
    pub async fn sign_message(
        &self,
        key: &str,
        owner_id: &str,
        message: &str,
    ) -> Result<String, CustodyError> {
        let wallet = self.get_wallet(key, owner_id)?;
        let signer = self.decrypt_private_key(&wallet)?;

        let signed = request_signature(Some(&signer as &dyn WalletConnection), message)
            .await
            .map_err(|e| CustodyError::InvalidRequest(e.to_string()))?;

        AuditEvent::new(AuditEventType::MessageSigned)
            .with_user(owner_id)
            .with_resource("wallet", &wallet.id)
            .record(&self.store);
        Ok(signed.signature)
    }

    /// Gas estimate for sending `tx` from the wallet.
    pub async fn estimate_gas(
        &self,
        key: &str,
        owner_id: &str,
        chain_id: Option<u64>,
        tx: &TxRequest,
    ) -> Result<GasQuote, CustodyError> {
        let wallet = self.get_wallet(key, owner_id)?;
        let provider = self.provider(chain_id)?;
        let from = parse_address(&wallet.address)?;

        let estimate = provider.estimate_gas(from, tx).await?;
        Ok(GasQuote {
            gas_estimate: estimate.gas_limit.to_string(),
            gas_price: format_units(U256::from(estimate.gas_price), GWEI_DECIMALS),
            gas_price_wei: estimate.gas_price.to_string(),
            estimated_cost_wei: estimate.estimated_cost_wei.to_string(),
            estimated_cost_eth: format_ether(estimate.estimated_cost_wei),
        })
    }

    /// Send ETH from a managed wallet, by default to the user's own address.
    ///
    /// Waits for the receipt and records the transaction. Nothing is recorded
    /// if submission fails.
    pub async fn withdraw(
        &self,
        user_id: &str,
        request: WithdrawRequest,
    ) -> Result<TransactionResult, CustodyError> {
        let amount_wei = parse_ether(&request.amount)?;
        if amount_wei.is_zero() {
            return Err(CustodyError::InvalidRequest("Amount must be greater than zero".into()));
        }

        let (user, wallet) = self.store.read(|txn| {
            let user = UserRepository::new(txn).get(user_id)?;
            let wallet = match &request.wallet {
                Some(key) => WalletRepository::new(txn).resolve(key)?,
                None => WalletRepository::new(txn).first_active(user_id)?,
            };
            Ok((user, wallet))
        })?;
        let user = user.ok_or(CustodyError::UserNotFound)?;
        let wallet = wallet
            .filter(|w| w.user_id == user_id && w.is_active)
            .ok_or(CustodyError::WalletNotFound)?;

        let to = request.to.as_deref().unwrap_or(&user.wallet_address);
        let tx = TxRequest {
            to: parse_address(to)?,
            value: amount_wei,
            ..TxRequest::default()
        };

        let to = to.to_lowercase();
        let result = self
            .submit_and_record(
                SubmitRequest {
                    wallet: wallet.id.clone(),
                    owner_id: user_id.to_string(),
                    chain_id: request.chain_id,
                    tx,
                    wait: true,
                },
                |result, chain_id| TransactionRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    tx_hash: result.hash.clone(),
                    kind: TransactionKind::Withdrawal,
                    amount: format_ether(amount_wei),
                    amount_wei: amount_wei.to_string(),
                    token_address: None,
                    chain_id,
                    status: result.status,
                    user_id: user_id.to_string(),
                    managed_wallet_id: wallet.id.clone(),
                    pool_id: None,
                    to,
                    block_number: result.block_number,
                    gas_used: result.gas_used.clone(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        AuditEvent::new(AuditEventType::Withdrawal)
            .with_user(user_id)
            .with_resource("wallet", &wallet.id)
            .with_details(serde_json::json!({ "tx_hash": result.hash, "amount_wei": amount_wei.to_string() }))
            .record(&self.store);

        Ok(result)
    }

    /// Send a caller-built transaction and record it as a transfer.
    pub async fn transfer(&self, request: SubmitRequest) -> Result<TransactionResult, CustodyError> {
        let wallet = self.get_wallet(&request.wallet, &request.owner_id)?;
        let owner_id = request.owner_id.clone();
        let to = request.tx.to;
        let value = request.tx.value;

        self.submit_and_record(request, |result, chain_id| TransactionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            tx_hash: result.hash.clone(),
            kind: TransactionKind::Transfer,
            amount: format_ether(value),
            amount_wei: value.to_string(),
            token_address: None,
            chain_id,
            status: result.status,
            user_id: owner_id,
            managed_wallet_id: wallet.id.clone(),
            pool_id: None,
            to: to.to_string().to_lowercase(),
            block_number: result.block_number,
            gas_used: result.gas_used.clone(),
            created_at: Utc::now(),
        })
        .await
    }

    /// Submit, wait for the receipt and record the transaction built by
    /// `record`.
    ///
    /// A transaction that was broadcast but whose receipt could not be
    /// fetched is recorded as `pending` before the error is returned.
    async fn submit_and_record(
        &self,
        request: SubmitRequest,
        record: impl FnOnce(&TransactionResult, u64) -> TransactionRecord,
    ) -> Result<TransactionResult, CustodyError> {
        let (result, chain_id, unconfirmed) = match self.sign_and_submit(request).await {
            Ok(submission) => (submission.result(), submission.chain_id, None),
            Err(CustodyError::Unconfirmed {
                hash,
                chain_id,
                reason,
            }) => (
                TransactionResult::new(hash.clone(), None),
                chain_id,
                Some(CustodyError::Unconfirmed {
                    hash,
                    chain_id,
                    reason,
                }),
            ),
            Err(e) => return Err(e),
        };

        let record = record(&result, chain_id);
        self.store
            .write_blocking(move |txn| TransactionRepository::new(txn).insert(&record))
            .await?;

        match unconfirmed {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    /// Recorded transactions of a wallet, newest first.
    pub fn history(
        &self,
        key: &str,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, CustodyError> {
        let wallet = self.get_wallet(key, owner_id)?;
        Ok(self
            .store
            .read(|txn| TransactionRepository::new(txn).list_by_wallet(&wallet.id, limit))?)
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Refresh the cached balance from the chain.
    ///
    /// When the node is unreachable the cached row (or a zero row) is returned
    /// unchanged and flagged as stale.
    pub async fn sync_balance(
        &self,
        wallet: &ManagedWallet,
        chain_id: Option<u64>,
    ) -> Result<BalanceSnapshot, CustodyError> {
        let provider = self.provider(chain_id)?;
        let chain_id = provider.network().chain_id;
        let address = parse_address(&wallet.address)?;

        match provider.get_balance(address).await {
            Ok(wei) => {
                let row = WalletBalance {
                    wallet_id: wallet.wallet_id.clone(),
                    chain_id,
                    balance: wei.to_string(),
                    balance_eth: format_ether(wei),
                    last_synced_at: Utc::now(),
                };
                let row = self
                    .store
                    .write_blocking(move |txn| {
                        BalanceRepository::new(txn).upsert(&row)?;
                        Ok::<_, StorageError>(row)
                    })
                    .await?;
                Ok(snapshot(&wallet.address, row, false))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    wallet_id = %wallet.wallet_id,
                    chain_id,
                    "Balance RPC failed, serving cached balance"
                );
                let cached = self
                    .store
                    .read(|txn| BalanceRepository::new(txn).get(&wallet.wallet_id, chain_id))?
                    .unwrap_or_else(|| WalletBalance::zero(&wallet.wallet_id, chain_id));
                Ok(snapshot(&wallet.address, cached, true))
            }
        }
    }
}

fn snapshot(address: &str, row: WalletBalance, stale: bool) -> BalanceSnapshot {
    BalanceSnapshot {
        address: address.to_string(),
        balance: row.balance,
        balance_eth: row.balance_eth,
        chain_id: row.chain_id,
        last_synced_at: row.last_synced_at,
        stale,
        note: stale.then(|| STALE_BALANCE_NOTE.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blockchain::mock::MockChain;
    use crate::blockchain::{SHAPE_MAINNET, SHAPE_SEPOLIA};
    use crate::storage::User;

    pub(crate) struct Fixture {
        pub service: CustodyService,
        pub store: Arc<Store>,
        pub mainnet: Arc<MockChain>,
        pub sepolia: Arc<MockChain>,
        pub user: User,
    }

    pub(crate) fn fixture() -> Fixture {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mainnet = Arc::new(MockChain::new(SHAPE_MAINNET));
        let sepolia = Arc::new(MockChain::new(SHAPE_SEPOLIA));
        let chains = ChainRegistry::new()
            .with_provider(mainnet.clone())
            .with_provider(sepolia.clone());
        let service = CustodyService::new(
            store.clone(),
            chains,
            Some(KeyVault::new("test-master-key")),
            SHAPE_MAINNET.chain_id,
        );

        let user = User::new("0x00000000000000000000000000000000000000f1");
        store.write(|txn| UserRepository::new(txn).insert(&user)).unwrap();

        Fixture {
            service,
            store,
            mainnet,
            sepolia,
            user,
        }
    }

    fn wei(eth: &str) -> U256 {
        parse_ether(eth).unwrap()
    }

    #[test]
    fn create_wallet_persists_encrypted_key_and_zero_balance() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();

        assert_eq!(wallet.wallet_id, wallet.address);
        assert!(wallet.name.starts_with("Wallet "));
        let signer = f.service.decrypt_private_key(&wallet).unwrap();
        assert_eq!(signer.address().to_string().to_lowercase(), wallet.address);

        let balance = f
            .store
            .read(|txn| BalanceRepository::new(txn).get(&wallet.wallet_id, 360))
            .unwrap()
            .unwrap();
        assert_eq!(balance.balance, "0");
        assert_eq!(balance.balance_eth, "0.0");
    }

    #[test]
    fn create_wallet_requires_known_user_and_master_key() {
        let f = fixture();
        assert!(matches!(
            f.service.create_managed_wallet("nobody", Some("x")),
            Err(CustodyError::UserNotFound)
        ));

        let keyless = CustodyService::new(f.store.clone(), ChainRegistry::new(), None, 360);
        assert!(matches!(
            keyless.create_managed_wallet(&f.user.id, None),
            Err(CustodyError::EncryptionKeyMissing)
        ));
    }

    #[test]
    fn foreign_wallet_is_not_found() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, Some("Main")).unwrap();
        assert_eq!(wallet.name, "Main");

        assert!(f.service.get_wallet(&wallet.id, &f.user.id).is_ok());
        assert!(f.service.get_wallet(&wallet.address, &f.user.id).is_ok());
        assert!(matches!(
            f.service.get_wallet(&wallet.id, "someone-else"),
            Err(CustodyError::WalletNotFound)
        ));
    }

    #[test]
    fn delete_wallet_hides_it() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        f.service.delete_wallet(&wallet.id, &f.user.id).unwrap();

        assert!(f.service.list_wallets(&f.user.id).unwrap().is_empty());
        assert!(matches!(
            f.service.get_wallet(&wallet.id, &f.user.id),
            Err(CustodyError::WalletNotFound)
        ));
    }

    #[test]
    fn update_wallet_renames() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        let updated = f
            .service
            .update_wallet(&wallet.id, &f.user.id, Some("Savings"), None)
            .unwrap();
        assert_eq!(updated.name, "Savings");
        assert!(updated.is_active);
    }

    #[tokio::test]
    async fn sync_balance_updates_cache_when_online() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        f.mainnet
            .set_balance(parse_address(&wallet.address).unwrap(), wei("1.5"));

        let snapshot = f.service.sync_balance(&wallet, None).await.unwrap();
        assert!(!snapshot.stale);
        assert_eq!(snapshot.balance_eth, "1.5");
        assert_eq!(snapshot.chain_id, 360);

        let cached = f
            .store
            .read(|txn| BalanceRepository::new(txn).get(&wallet.wallet_id, 360))
            .unwrap()
            .unwrap();
        assert_eq!(cached.balance, wei("1.5").to_string());
    }

    #[tokio::test]
    async fn sync_balance_during_outage_returns_cache_unchanged() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        f.mainnet
            .set_balance(parse_address(&wallet.address).unwrap(), wei("2"));
        let fresh = f.service.sync_balance(&wallet, None).await.unwrap();

        f.mainnet.set_offline(true);
        let cached = f.service.sync_balance(&wallet, None).await.unwrap();

        assert!(cached.stale);
        assert_eq!(cached.note.as_deref(), Some(STALE_BALANCE_NOTE));
        assert_eq!(cached.balance, fresh.balance);
        assert_eq!(cached.last_synced_at, fresh.last_synced_at);

        let json = serde_json::to_value(&cached).unwrap();
        assert_eq!(json["note"], STALE_BALANCE_NOTE);
        assert_eq!(json["balanceETH"], "2.0");
    }

    #[tokio::test]
    async fn sync_balance_without_cache_serves_zero_row() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        f.sepolia.set_offline(true);

        let snapshot = f.service.sync_balance(&wallet, Some(11011)).await.unwrap();
        assert!(snapshot.stale);
        assert_eq!(snapshot.balance, "0");
        assert_eq!(snapshot.balance_eth, "0.0");
        assert_eq!(snapshot.chain_id, 11011);
    }

    #[tokio::test]
    async fn sync_balance_rejects_unknown_chain() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        assert!(matches!(
            f.service.sync_balance(&wallet, Some(1)).await,
            Err(CustodyError::UnsupportedChain(1))
        ));
    }

    #[tokio::test]
    async fn sign_and_submit_sends_from_wallet() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        let from = parse_address(&wallet.address).unwrap();
        f.mainnet.set_balance(from, wei("1"));

        let tx = build_tx_request(
            "0x00000000000000000000000000000000000000b0",
            "0.25",
            Some("0x"),
            None,
            Some("2"),
        )
        .unwrap();
        assert_eq!(tx.gas_price, Some(2_000_000_000));

        let submission = f
            .service
            .sign_and_submit(SubmitRequest {
                wallet: wallet.id.clone(),
                owner_id: f.user.id.clone(),
                chain_id: None,
                tx,
                wait: true,
            })
            .await
            .unwrap();

        let sent = f.mainnet.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, from);
        assert_eq!(submission.result().status, crate::blockchain::TxOutcome::Confirmed);
    }

    #[tokio::test]
    async fn insufficient_funds_surfaces_unmodified() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();

        let result = f
            .service
            .sign_and_submit(SubmitRequest {
                wallet: wallet.id.clone(),
                owner_id: f.user.id.clone(),
                chain_id: None,
                tx: build_tx_request(&f.user.wallet_address, "1", None, None, None).unwrap(),
                wait: true,
            })
            .await;
        assert!(matches!(result, Err(CustodyError::InsufficientFunds(_))));
    }

    #[tokio::test]
    async fn withdraw_defaults_to_first_wallet_and_login_address() {
        let f = fixture();
        let first = f.service.create_managed_wallet(&f.user.id, Some("first")).unwrap();
        f.mainnet
            .set_balance(parse_address(&first.address).unwrap(), wei("1"));

        let result = f
            .service
            .withdraw(
                &f.user.id,
                WithdrawRequest {
                    amount: "0.5".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.status, crate::blockchain::TxOutcome::Confirmed);

        let home = parse_address(&f.user.wallet_address).unwrap();
        assert_eq!(f.mainnet.balance_of(home), wei("0.5"));

        let history = f.service.history(&first.id, &f.user.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Withdrawal);
        assert_eq!(history[0].amount, "0.5");
    }

    #[tokio::test]
    async fn dropped_receipt_records_pending_withdrawal() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        f.mainnet
            .set_balance(parse_address(&wallet.address).unwrap(), wei("1"));
        f.mainnet.set_dropping_receipts(true);

        let result = f
            .service
            .withdraw(
                &f.user.id,
                WithdrawRequest {
                    amount: "0.3".into(),
                    ..Default::default()
                },
            )
            .await;
        let sent = f.mainnet.sent();
        assert_eq!(sent.len(), 1);
        let Err(CustodyError::Unconfirmed { hash, chain_id, .. }) = result else {
            panic!("expected an unconfirmed withdrawal");
        };
        assert_eq!(hash, sent[0].hash);
        assert_eq!(chain_id, 360);

        let history = f.service.history(&wallet.id, &f.user.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_hash, hash);
        assert_eq!(history[0].status, crate::blockchain::TxOutcome::Pending);
        assert_eq!(history[0].kind, TransactionKind::Withdrawal);
    }

    #[tokio::test]
    async fn dropped_receipt_records_pending_transfer() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        f.mainnet
            .set_balance(parse_address(&wallet.address).unwrap(), wei("1"));
        f.mainnet.set_dropping_receipts(true);

        let result = f
            .service
            .transfer(SubmitRequest {
                wallet: wallet.address.clone(),
                owner_id: f.user.id.clone(),
                chain_id: None,
                tx: build_tx_request(&f.user.wallet_address, "0.1", None, None, None).unwrap(),
                wait: true,
            })
            .await;
        assert!(matches!(result, Err(CustodyError::Unconfirmed { .. })));

        let history = f.service.history(&wallet.id, &f.user.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, crate::blockchain::TxOutcome::Pending);
        assert_eq!(history[0].kind, TransactionKind::Transfer);
    }

    #[tokio::test]
    async fn swapped_legacy_envelope_is_not_used() {
        let f = fixture();
        let mut wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        let (other_key, _) = generate_keypair();
        wallet.encrypted_private_key = KeyVault::new("test-master-key").encrypt_v1(&other_key);
        f.store
            .write(|txn| WalletRepository::new(txn).update(&wallet))
            .unwrap();

        assert!(matches!(
            f.service.decrypt_private_key(&wallet),
            Err(CustodyError::DecryptionFailed)
        ));
        assert!(matches!(
            f.service.sign_message(&wallet.id, &f.user.id, "gm").await,
            Err(CustodyError::DecryptionFailed)
        ));
    }

    #[tokio::test]
    async fn failed_withdraw_records_nothing() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        f.mainnet
            .set_balance(parse_address(&wallet.address).unwrap(), wei("0.1"));

        let result = f
            .service
            .withdraw(
                &f.user.id,
                WithdrawRequest {
                    amount: "5".into(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(CustodyError::InsufficientFunds(_))));
        assert!(f.service.history(&wallet.id, &f.user.id, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn estimate_gas_reports_gwei_price() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        let tx = build_tx_request(&f.user.wallet_address, "0.1", None, None, None).unwrap();

        let quote = f
            .service
            .estimate_gas(&wallet.id, &f.user.id, None, &tx)
            .await
            .unwrap();
        assert_eq!(quote.gas_estimate, "21000");
        assert_eq!(quote.gas_price, "1.0");
        assert_eq!(quote.estimated_cost_wei, "21000000000000");

        f.mainnet.set_reverting(true);
        assert!(matches!(
            f.service.estimate_gas(&wallet.id, &f.user.id, None, &tx).await,
            Err(CustodyError::EstimationFailed(_))
        ));
    }

    #[tokio::test]
    async fn sign_message_is_recoverable() {
        let f = fixture();
        let wallet = f.service.create_managed_wallet(&f.user.id, None).unwrap();
        let signature = f
            .service
            .sign_message(&wallet.id, &f.user.id, "hello pools")
            .await
            .unwrap();

        let signer = crate::auth::proof::recover_signer("hello pools", &signature).unwrap();
        assert_eq!(signer.to_string().to_lowercase(), wallet.address);
    }

    #[test]
    fn build_tx_request_rejects_garbage() {
        assert!(matches!(
            build_tx_request("nope", "1", None, None, None),
            Err(CustodyError::InvalidRequest(_))
        ));
        assert!(matches!(
            build_tx_request("0x00000000000000000000000000000000000000b0", "1", Some("0xzz"), None, None),
            Err(CustodyError::InvalidRequest(_))
        ));
    }
}
