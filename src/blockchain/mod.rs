// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module for the Shape network.
//!
//! This module provides functionality for:
//! - Querying native ETH balances
//! - Gas estimation and transaction broadcasting with custodial keys
//! - Encoding pool contract calls and decoding their events

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod pool_contract;
pub mod registry;
pub mod signing;
pub mod types;
pub mod units;

pub use client::{parse_address, ChainError, ChainProvider, RpcChainClient};
pub use registry::ChainRegistry;
pub use types::*;
