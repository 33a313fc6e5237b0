// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User records keyed by wallet address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{
    ReadTxn, StorageError, StorageResult, WriteTxn, USERS, USERS_BY_ADDRESS,
};

/// A user, identified by the wallet that proved ownership at sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Lowercase `0x` address, unique across users.
    pub wallet_address: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New user with the default display name `Wallet 0x1234...`.
    pub fn new(wallet_address: &str) -> Self {
        let wallet_address = wallet_address.to_lowercase();
        let prefix: String = wallet_address.chars().take(8).collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("Wallet {prefix}..."),
            wallet_address,
            created_at: Utc::now(),
        }
    }
}

pub struct UserRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: ReadTxn> UserRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    pub fn get(&self, user_id: &str) -> StorageResult<Option<User>> {
        self.txn.get_json(USERS, user_id)
    }

    pub fn find_by_address(&self, wallet_address: &str) -> StorageResult<Option<User>> {
        match self
            .txn
            .get_text(USERS_BY_ADDRESS, &wallet_address.to_lowercase())?
        {
            Some(user_id) => self.get(&user_id),
            None => Ok(None),
        }
    }
}

impl<'t, T: WriteTxn> UserRepository<'t, T> {
    /// Insert a new user. Fails with `Conflict` if the address is taken.
    pub fn insert(&self, user: &User) -> StorageResult<()> {
        let address = user.wallet_address.to_lowercase();
        if self.txn.get_text(USERS_BY_ADDRESS, &address)?.is_some() {
            return Err(StorageError::Conflict(format!(
                "user for {address} already exists"
            )));
        }
        self.txn.put_json(USERS, &user.id, user)?;
        self.txn.put_text(USERS_BY_ADDRESS, &address, &user.id)
    }

    /// Return the user for `wallet_address`, creating it with `create` if absent.
    ///
    /// Returns the user and whether it was created.
    pub fn find_or_insert_with(
        &self,
        wallet_address: &str,
        create: impl FnOnce() -> User,
    ) -> StorageResult<(User, bool)> {
        if let Some(existing) = self.find_by_address(wallet_address)? {
            return Ok((existing, false));
        }
        let user = create();
        self.insert(&user)?;
        Ok((user, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;

    #[test]
    fn default_name_uses_address_prefix() {
        let user = User::new("0xABCDEF1234567890abcdef1234567890ABCDEF12");
        assert_eq!(user.wallet_address, "0xabcdef1234567890abcdef1234567890abcdef12");
        assert_eq!(user.name, "Wallet 0xabcdef...");
    }

    #[test]
    fn find_by_address_is_case_insensitive() {
        let store = Store::open_in_memory().unwrap();
        let user = User::new("0xabcdef1234567890abcdef1234567890abcdef12");
        store.write(|txn| UserRepository::new(txn).insert(&user)).unwrap();

        let found = store
            .read(|txn| {
                UserRepository::new(txn)
                    .find_by_address("0xABCDEF1234567890ABCDEF1234567890ABCDEF12")
            })
            .unwrap();
        assert_eq!(found, Some(user));
    }

    #[test]
    fn insert_rejects_duplicate_address() {
        let store = Store::open_in_memory().unwrap();
        let first = User::new("0xabcdef1234567890abcdef1234567890abcdef12");
        let second = User::new("0xabcdef1234567890abcdef1234567890abcdef12");
        store.write(|txn| UserRepository::new(txn).insert(&first)).unwrap();

        let result = store.write(|txn| UserRepository::new(txn).insert(&second));
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[test]
    fn find_or_insert_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let address = "0xabcdef1234567890abcdef1234567890abcdef12";

        let (first, created) = store
            .write(|txn| {
                UserRepository::new(txn).find_or_insert_with(address, || User::new(address))
            })
            .unwrap();
        assert!(created);

        let (second, created) = store
            .write(|txn| {
                UserRepository::new(txn).find_or_insert_with(address, || User::new(address))
            })
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }
}
