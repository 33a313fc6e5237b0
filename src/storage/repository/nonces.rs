// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Spent ownership-proof nonces.

use crate::storage::database::{ReadTxn, StorageResult, WriteTxn, PROOF_NONCES};

fn nonce_key(address: &str, nonce: &str) -> String {
    format!("{}|{nonce}", address.to_lowercase())
}

pub struct NonceRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: WriteTxn> NonceRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    /// Record `nonce` as spent for `address` until `expires_at_ms`.
    ///
    /// Returns `false` if the nonce is still recorded (a replay). Expired rows
    /// for the address are pruned first.
    pub fn consume(
        &self,
        address: &str,
        nonce: &str,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> StorageResult<bool> {
        let prefix = format!("{}|", address.to_lowercase());
        for (key, value) in self.txn.scan_prefix(PROOF_NONCES, &prefix)? {
            let expiry = std::str::from_utf8(&value)
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0);
            if expiry <= now_ms {
                self.txn.remove(PROOF_NONCES, &key)?;
            }
        }

        let key = nonce_key(address, nonce);
        if self.txn.get_bytes(PROOF_NONCES, &key)?.is_some() {
            return Ok(false);
        }
        self.txn
            .put_text(PROOF_NONCES, &key, &expires_at_ms.to_string())?;
        Ok(true)
    }
}
