// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{collections::HashMap, sync::Arc};

use super::client::{ChainError, ChainProvider};

/// Chain providers by chain id.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    providers: HashMap<u64, Arc<dyn ChainProvider>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn ChainProvider>) -> Self {
        self.providers.insert(provider.network().chain_id, provider);
        self
    }

    pub fn get(&self, chain_id: u64) -> Result<Arc<dyn ChainProvider>, ChainError> {
        self.providers
            .get(&chain_id)
            .cloned()
            .ok_or(ChainError::UnsupportedChain(chain_id))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.providers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{mock::MockChain, SHAPE_MAINNET, SHAPE_SEPOLIA};

    #[test]
    fn resolves_registered_chains() {
        let registry = ChainRegistry::new()
            .with_provider(Arc::new(MockChain::new(SHAPE_SEPOLIA)))
            .with_provider(Arc::new(MockChain::new(SHAPE_MAINNET)));

        assert_eq!(registry.get(360).unwrap().network().chain_id, 360);
        assert_eq!(registry.chain_ids(), vec![360, 11011]);
        assert!(matches!(registry.get(1), Err(ChainError::UnsupportedChain(1))));
    }
}
