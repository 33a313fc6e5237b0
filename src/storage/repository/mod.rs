// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the custody database.
//!
//! Each repository borrows a transaction, so several repositories can take
//! part in one [`Store::write`](super::Store::write) unit of work.

pub mod auto_invest;
pub mod balances;
pub mod nonces;
pub mod pools;
pub mod transactions;
pub mod users;
pub mod wallets;

pub use auto_invest::{
    AutoInvestRepository, AutoInvestment, AutoInvestmentRule, AutoInvestmentStatus,
};
pub use balances::{BalanceRepository, WalletBalance};
pub use nonces::NonceRepository;
pub use pools::{Pool, PoolRepository, PoolStatus};
pub use transactions::{TransactionKind, TransactionRecord, TransactionRepository};
pub use users::{User, UserRepository};
pub use wallets::{ManagedWallet, WalletRepository, WalletResponse};
