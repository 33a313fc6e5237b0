// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthService, ReplayPolicy, SessionKeys};
use crate::auto_invest::{AutoInvestScheduler, PoolMonitor, RuleService};
use crate::blockchain::{ChainError, ChainRegistry, RpcChainClient, SHAPE_MAINNET, SHAPE_SEPOLIA};
use crate::config::AppConfig;
use crate::crypto::KeyVault;
use crate::custody::CustodyService;
use crate::pools::PoolService;
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub sessions: SessionKeys,
    pub auth: AuthService,
    pub custody: CustodyService,
    pub pools: PoolService,
    pub rules: RuleService,
    pub scheduler: Arc<AutoInvestScheduler>,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: &AppConfig, chains: ChainRegistry) -> Self {
        let sessions = SessionKeys::new(config.session_secret.as_bytes(), config.session_ttl);
        let auth = AuthService::new(
            store.clone(),
            ReplayPolicy {
                enforce: config.enforce_replay,
                max_age: config.proof_max_age,
            },
        );
        let vault = config.wallet_encryption_key.as_deref().map(KeyVault::new);
        let custody = CustodyService::new(store.clone(), chains, vault, config.default_chain_id);
        let pools = PoolService::new(store.clone(), custody.clone(), config.invest_chain_id);
        let monitor = Arc::new(PoolMonitor::new(store.clone(), pools.clone()));
        let scheduler = Arc::new(AutoInvestScheduler::new(monitor, config.auto_invest_interval));

        Self {
            rules: RuleService::new(store.clone()),
            store,
            sessions,
            auth,
            custody,
            pools,
            scheduler,
        }
    }

    pub fn monitor(&self) -> &Arc<PoolMonitor> {
        self.scheduler.monitor()
    }
}

/// RPC clients for the Shape networks at the configured endpoints.
pub fn rpc_chains(config: &AppConfig) -> Result<ChainRegistry, ChainError> {
    Ok(ChainRegistry::new()
        .with_provider(Arc::new(RpcChainClient::new(
            SHAPE_MAINNET,
            &config.mainnet_rpc_url,
        )?))
        .with_provider(Arc::new(RpcChainClient::new(
            SHAPE_SEPOLIA,
            &config.sepolia_rpc_url,
        )?)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::{generate_message, Credentials, SessionUser};
    use crate::blockchain::mock::MockChain;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use crate::storage::{User, UserRepository};

    pub(crate) struct TestApp {
        pub state: AppState,
        pub mainnet: Arc<MockChain>,
        pub sepolia: Arc<MockChain>,
    }

    impl TestApp {
        /// Insert a user and return the session that identifies them.
        pub(crate) fn sign_in(&self, address: &str) -> SessionUser {
            let user = User::new(address);
            self.state
                .store
                .write(|txn| UserRepository::new(txn).insert(&user))
                .unwrap();
            SessionUser {
                user_id: user.id,
                wallet_address: user.wallet_address,
                expires_at: i64::MAX,
            }
        }
    }

    /// Key behind [`signed_credentials`].
    pub(crate) const TEST_KEY: &str =
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    /// A fresh challenge signed with [`TEST_KEY`]. The address is sent in
    /// checksum (mixed) case.
    pub(crate) fn signed_credentials() -> Credentials {
        let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let address = signer.address().to_string();
        let challenge = generate_message(&address, None);
        let signature = signer
            .sign_message_sync(challenge.message.as_bytes())
            .unwrap();
        Credentials {
            address,
            signature: format!("0x{}", alloy::hex::encode(signature.as_bytes())),
            message: None,
            timestamp: Some(challenge.timestamp),
            nonce: Some(challenge.nonce),
        }
    }

    pub(crate) fn test_config() -> AppConfig {
        AppConfig::from_lookup(|name| match name {
            "SESSION_SECRET" => Some("test-session-secret".to_string()),
            "WALLET_ENCRYPTION_KEY" => Some("test-master-key".to_string()),
            _ => None,
        })
        .unwrap()
    }

    pub(crate) fn test_app() -> TestApp {
        let mainnet = Arc::new(MockChain::new(SHAPE_MAINNET));
        let sepolia = Arc::new(MockChain::new(SHAPE_SEPOLIA));
        let chains = ChainRegistry::new()
            .with_provider(mainnet.clone())
            .with_provider(sepolia.clone());
        let store = Arc::new(Store::open_in_memory().unwrap());
        TestApp {
            state: AppState::new(store, &test_config(), chains),
            mainnet,
            sepolia,
        }
    }
}
