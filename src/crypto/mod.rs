// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material protection.

pub mod vault;

pub use vault::{EncryptedKey, KeyScheme, KeyVault, VaultError};
