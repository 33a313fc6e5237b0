// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Custody Storage
//!
//! All persistent state (users, managed wallets, balances, pools, recorded
//! transactions, auto-investment rules, spent proof nonces and the audit log)
//! lives in a single embedded redb database under `DATA_DIR`.
//!
//! ## Important Notes
//!
//! - Private keys are stored only in encrypted form (see [`crate::crypto`])
//! - Multi-row updates must go through one [`Store::write`] call
//! - API types never carry `encrypted_private_key`

pub mod audit;
pub mod database;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{ReadTxn, StorageError, StorageResult, Store, WriteTxn};
pub use repository::{
    AutoInvestRepository, AutoInvestment, AutoInvestmentRule, AutoInvestmentStatus,
    BalanceRepository, ManagedWallet, NonceRepository, Pool, PoolRepository, PoolStatus,
    TransactionKind, TransactionRecord, TransactionRepository, User, UserRepository,
    WalletBalance, WalletRepository, WalletResponse,
};
