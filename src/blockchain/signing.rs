// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key generation and signer construction for custodial wallets.
//!
//! Custodial keys travel as `0x`-prefixed hex strings (66 characters), the
//! same representation the vault seals. They are turned into an alloy
//! [`PrivateKeySigner`] only for the duration of a signing operation.

use alloy::{primitives::keccak256, signers::local::PrivateKeySigner};
use k256::{ecdsa::SigningKey, elliptic_curve::rand_core::OsRng};

use super::client::ChainError;

/// Generate a secp256k1 keypair and derive its EVM address.
///
/// EVM addresses are derived by:
/// 1. Generate secp256k1 private key
/// 2. Get uncompressed public key (65 bytes: 0x04 || x || y)
/// 3. Take keccak256 hash of the public key without the 0x04 prefix
/// 4. Take the last 20 bytes of the hash
///
/// # Returns
/// `(private_key_hex, address)`, both `0x`-prefixed and lowercase.
pub fn generate_keypair() -> (String, String) {
    let signing_key = SigningKey::random(&mut OsRng);

    let public_key = signing_key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&public_key.as_bytes()[1..]);

    let private_key = format!("0x{}", alloy::hex::encode(signing_key.to_bytes()));
    let address = format!("0x{}", alloy::hex::encode(&hash[12..]));
    (private_key, address)
}

/// Whether `value` looks like a `0x`-prefixed 32-byte hex private key.
pub fn is_private_key_hex(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Build a signer from a hex private key (with or without `0x`).
pub fn signer_from_hex(private_key: &str) -> Result<PrivateKeySigner, ChainError> {
    let hex = private_key.strip_prefix("0x").unwrap_or(private_key);
    let key_bytes =
        alloy::hex::decode(hex).map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))?;

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_keypair_produces_valid_address() {
        let (private_key, address) = generate_keypair();

        assert!(is_private_key_hex(&private_key));
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42, "EVM address must be 42 characters");
        assert_eq!(address, address.to_lowercase());
    }

    #[test]
    fn derived_address_matches_signer() {
        let (private_key, address) = generate_keypair();
        let signer = signer_from_hex(&private_key).unwrap();
        assert_eq!(signer.address().to_string().to_lowercase(), address);
    }

    #[test]
    fn generate_keypair_produces_unique_addresses() {
        let mut addresses = std::collections::HashSet::new();
        for _ in 0..10 {
            let (_, address) = generate_keypair();
            assert!(addresses.insert(address), "Generated duplicate address");
        }
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(!is_private_key_hex("0x1234"));
        assert!(!is_private_key_hex(&"a".repeat(64)));
        assert!(!is_private_key_hex(&format!("0x{}", "g".repeat(64))));
        assert!(signer_from_hex("0xzz").is_err());
    }
}
