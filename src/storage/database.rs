// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded custody database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! Every table maps a string key to JSON bytes (or, for index tables, the
//! UTF-8 id of the referenced row).
//!
//! - `users`: user_id → User
//! - `users_by_address`: lowercase address → user_id
//! - `wallets`: id → ManagedWallet
//! - `wallets_by_wallet_id`: wallet_id (lowercase address) → id
//! - `wallets_by_user`: `user_id|created_ms|id` → id
//! - `wallet_balances`: `wallet_id|chain_id` → WalletBalance
//! - `pools`: pool_id → Pool
//! - `transactions`: id → TransactionRecord
//! - `wallet_tx_index`: `managed_wallet_id|!created_ms|id` → id (newest first)
//! - `auto_rules`: rule_id → AutoInvestmentRule
//! - `auto_investments`: `rule_id|pool_id` → AutoInvestment
//! - `proof_nonces`: `address|nonce` → expiry (unix ms)
//! - `audit_events`: `created_ms|event_id` → AuditEvent
//!
//! ## Units of Work
//!
//! [`Store::write`] runs a closure inside a single write transaction. The
//! transaction commits when the closure returns `Ok` and aborts otherwise, so
//! multi-row updates (pool total + transaction log, user find-or-create) are
//! all-or-nothing. Async callers use [`Store::write_blocking`], which runs the
//! same unit of work on tokio's blocking pool.

use std::path::Path;
use std::sync::Arc;

use redb::{
    backends::InMemoryBackend, Database, ReadTransaction, ReadableDatabase, ReadableTable,
    TableDefinition, TableHandle, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

/// Table shape shared by every custody table.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

// =============================================================================
// Table Definitions
// =============================================================================

pub const USERS: JsonTable = TableDefinition::new("users");
pub const USERS_BY_ADDRESS: JsonTable = TableDefinition::new("users_by_address");
pub const WALLETS: JsonTable = TableDefinition::new("wallets");
pub const WALLETS_BY_WALLET_ID: JsonTable = TableDefinition::new("wallets_by_wallet_id");
pub const WALLETS_BY_USER: JsonTable = TableDefinition::new("wallets_by_user");
pub const WALLET_BALANCES: JsonTable = TableDefinition::new("wallet_balances");
pub const POOLS: JsonTable = TableDefinition::new("pools");
pub const TRANSACTIONS: JsonTable = TableDefinition::new("transactions");
pub const WALLET_TX_INDEX: JsonTable = TableDefinition::new("wallet_tx_index");
pub const AUTO_RULES: JsonTable = TableDefinition::new("auto_rules");
pub const AUTO_INVESTMENTS: JsonTable = TableDefinition::new("auto_investments");
pub const PROOF_NONCES: JsonTable = TableDefinition::new("proof_nonces");
pub const AUDIT_EVENTS: JsonTable = TableDefinition::new("audit_events");

const ALL_TABLES: [JsonTable; 13] = [
    USERS,
    USERS_BY_ADDRESS,
    WALLETS,
    WALLETS_BY_WALLET_ID,
    WALLETS_BY_USER,
    WALLET_BALANCES,
    POOLS,
    TRANSACTIONS,
    WALLET_TX_INDEX,
    AUTO_RULES,
    AUTO_INVESTMENTS,
    PROOF_NONCES,
    AUDIT_EVENTS,
];

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt index entry in {0}")]
    CorruptIndex(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage task failed: {0}")]
    Task(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Transaction Access
// =============================================================================

/// Read access shared by read and write transactions.
pub trait ReadTxn {
    /// Raw value stored under `key`.
    fn get_bytes(&self, table: JsonTable, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// All `(key, value)` pairs whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, table: JsonTable, prefix: &str)
        -> StorageResult<Vec<(String, Vec<u8>)>>;

    fn get_json<V: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StorageResult<Option<V>> {
        match self.get_bytes(table, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_text(&self, table: JsonTable, key: &str) -> StorageResult<Option<String>> {
        match self.get_bytes(table, key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::CorruptIndex(table.name().to_string())),
            None => Ok(None),
        }
    }

    fn scan_json<V: DeserializeOwned>(&self, table: JsonTable, prefix: &str) -> StorageResult<Vec<V>> {
        self.scan_prefix(table, prefix)?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(StorageError::from))
            .collect()
    }

    /// Follow an index table to rows in `target`, skipping dangling entries.
    fn scan_index<V: DeserializeOwned>(
        &self,
        index: JsonTable,
        prefix: &str,
        target: JsonTable,
    ) -> StorageResult<Vec<V>> {
        let mut rows = Vec::new();
        for (_, id) in self.scan_prefix(index, prefix)? {
            let id = String::from_utf8(id)
                .map_err(|_| StorageError::CorruptIndex(index.name().to_string()))?;
            if let Some(row) = self.get_json(target, &id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

/// Mutations available inside a write transaction.
pub trait WriteTxn: ReadTxn {
    fn put_bytes(&self, table: JsonTable, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Returns whether a value was present.
    fn remove(&self, table: JsonTable, key: &str) -> StorageResult<bool>;

    fn put_json<V: Serialize>(&self, table: JsonTable, key: &str, value: &V) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_bytes(table, key, &bytes)
    }

    fn put_text(&self, table: JsonTable, key: &str, value: &str) -> StorageResult<()> {
        self.put_bytes(table, key, value.as_bytes())
    }
}

fn collect_prefix(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    prefix: &str,
) -> StorageResult<Vec<(String, Vec<u8>)>> {
    let mut entries = Vec::new();
    for entry in table.range(prefix..)? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        entries.push((key.to_string(), value.value().to_vec()));
    }
    Ok(entries)
}

impl ReadTxn for ReadTransaction {
    fn get_bytes(&self, table: JsonTable, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let table = self.open_table(table)?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn scan_prefix(&self, table: JsonTable, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let table = self.open_table(table)?;
        collect_prefix(&table, prefix)
    }
}

impl ReadTxn for WriteTransaction {
    fn get_bytes(&self, table: JsonTable, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let table = self.open_table(table)?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn scan_prefix(&self, table: JsonTable, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let table = self.open_table(table)?;
        collect_prefix(&table, prefix)
    }
}

impl WriteTxn for WriteTransaction {
    fn put_bytes(&self, table: JsonTable, key: &str, value: &[u8]) -> StorageResult<()> {
        let mut table = self.open_table(table)?;
        table.insert(key, value)?;
        Ok(())
    }

    fn remove(&self, table: JsonTable, key: &str) -> StorageResult<bool> {
        let mut table = self.open_table(table)?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Embedded ACID store holding all custody state.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        Self::initialize(db)
    }

    /// Volatile store used by tests and ephemeral deployments.
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::initialize(db)
    }

    // Pre-create all tables so later read transactions don't fail
    fn initialize(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        for table in ALL_TABLES {
            write_txn.open_table(table)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Open a read snapshot on every table.
    pub fn check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        for table in ALL_TABLES {
            read_txn.open_table(table)?;
        }
        Ok(())
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> StorageResult<T>) -> StorageResult<T> {
        let read_txn = self.db.begin_read()?;
        f(&read_txn)
    }

    /// Run `f` as one unit of work: commit on `Ok`, abort on `Err`.
    pub fn write<T, E>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        match f(&write_txn) {
            Ok(value) => {
                write_txn.commit().map_err(StorageError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = write_txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    /// [`Store::write`] on tokio's blocking pool, for async callers.
    ///
    /// Commits on a file-backed store fsync, so they stay off the runtime
    /// workers.
    pub async fn write_blocking<T, E, F>(self: &Arc<Self>, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StorageError> + Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.write(f))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// Zero-padded millisecond timestamp for lexicographically ordered keys.
pub fn ordered_millis(ms: i64) -> String {
    format!("{:016x}", ms.max(0) as u64)
}

/// Inverted millisecond timestamp so forward scans yield newest first.
pub fn inverted_millis(ms: i64) -> String {
    format!("{:016x}", !(ms.max(0) as u64))
}
