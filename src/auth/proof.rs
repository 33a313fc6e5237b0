// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet-ownership proofs.
//!
//! A user proves control of an address by signing a canonical message with
//! EIP-191 `personal_sign`:
//!
//! ```text
//! I am the owner of wallet {address}.
//!
//! Timestamp: {unix_ms}
//! Nonce: {nonce}
//!
//! This signature is used to verify wallet ownership for ShapeCraft UsePools.
//! ```
//!
//! Everything here is pure except [`request_signature`], which talks to a
//! connected wallet through the [`WalletConnection`] trait.

use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, Signature};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::StorageError;

/// Closing sentence of every ownership message.
pub const OWNERSHIP_STATEMENT: &str =
    "This signature is used to verify wallet ownership for ShapeCraft UsePools.";

/// Minimum nonce length accepted in an ownership message.
pub const MIN_NONCE_LEN: usize = 8;

/// Tolerated clock skew for timestamps from the future (60 seconds).
pub const FUTURE_SKEW_MS: i64 = 60_000;

const MESSAGE_PREFIX: &str = "I am the owner of wallet ";

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("No wallet connected")]
    WalletNotConnected,

    #[error("Signature request rejected: {0}")]
    SigningRejected(String),

    #[error("Malformed signature")]
    MalformedSignature,

    #[error("Message is not a wallet ownership statement")]
    MalformedMessage,

    #[error("Message does not match the supplied address, timestamp or nonce")]
    ComponentMismatch,

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Nonce must be at least {MIN_NONCE_LEN} characters")]
    NonceTooShort,

    #[error("Ownership proof has expired")]
    Expired,

    #[error("Ownership proof timestamp is in the future")]
    FromFuture,

    #[error("Timestamp and nonce are required to register a wallet")]
    MissingChallengeData,

    #[error("Nonce has already been used")]
    NonceReused,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A freshly generated message for the client to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipChallenge {
    pub message: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub nonce: String,
}

/// The fields embedded in an ownership message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofComponents {
    pub wallet_address: String,
    pub timestamp: i64,
    pub nonce: String,
}

/// A signed ownership message.
#[derive(Debug, Clone)]
pub struct OwnershipProof {
    pub wallet_address: String,
    pub timestamp: i64,
    pub nonce: String,
    pub message: String,
    pub signature: String,
}

/// Render the canonical ownership message. The address is used as given.
pub fn ownership_message(wallet_address: &str, timestamp: i64, nonce: &str) -> String {
    format!(
        "{MESSAGE_PREFIX}{wallet_address}.\n\nTimestamp: {timestamp}\nNonce: {nonce}\n\n{OWNERSHIP_STATEMENT}"
    )
}

/// Build a challenge for `wallet_address` stamped with the current time.
pub fn generate_message(wallet_address: &str, nonce: Option<&str>) -> OwnershipChallenge {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let nonce = nonce
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    OwnershipChallenge {
        message: ownership_message(&wallet_address.to_lowercase(), timestamp, &nonce),
        timestamp,
        nonce,
    }
}

/// Extract the address, timestamp and nonce from a canonical message.
pub fn parse_message(message: &str) -> Option<ProofComponents> {
    let rest = message.strip_prefix(MESSAGE_PREFIX)?;
    let (wallet_address, rest) = rest.split_once(".\n\nTimestamp: ")?;
    let (timestamp, rest) = rest.split_once("\nNonce: ")?;
    let nonce = rest.strip_suffix(OWNERSHIP_STATEMENT)?.strip_suffix("\n\n")?;

    if nonce.is_empty() || nonce.contains('\n') {
        return None;
    }
    Some(ProofComponents {
        wallet_address: wallet_address.to_string(),
        timestamp: timestamp.parse().ok()?,
        nonce: nonce.to_string(),
    })
}

/// Check address format, nonce length and the timestamp window.
pub fn validate_components(
    components: &ProofComponents,
    max_age: Duration,
    now_ms: i64,
) -> Result<(), ProofError> {
    Address::from_str(&components.wallet_address)
        .map_err(|_| ProofError::InvalidAddress(components.wallet_address.clone()))?;

    if components.nonce.chars().count() < MIN_NONCE_LEN {
        return Err(ProofError::NonceTooShort);
    }

    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    if components.timestamp > now_ms.saturating_add(FUTURE_SKEW_MS) {
        return Err(ProofError::FromFuture);
    }
    if now_ms.saturating_sub(components.timestamp) > max_age_ms {
        return Err(ProofError::Expired);
    }
    Ok(())
}

/// Recover the EIP-191 signer of `message`.
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, ProofError> {
    let signature = Signature::from_str(signature).map_err(|_| ProofError::MalformedSignature)?;
    signature
        .recover_address_from_msg(message)
        .map_err(|_| ProofError::MalformedSignature)
}

/// Whether `proof.signature` over `proof.message` was produced by
/// `proof.wallet_address`. Malformed input yields `false`.
pub fn verify_proof(proof: &OwnershipProof) -> bool {
    let Ok(expected) = Address::from_str(&proof.wallet_address) else {
        return false;
    };
    match recover_signer(&proof.message, &proof.signature) {
        Ok(signer) => signer == expected,
        Err(_) => false,
    }
}

/// A wallet able to produce `personal_sign` signatures.
#[async_trait]
pub trait WalletConnection: Send + Sync {
    fn account(&self) -> Address;

    async fn personal_sign(&self, message: &str) -> Result<Signature, ProofError>;
}

#[async_trait]
impl WalletConnection for PrivateKeySigner {
    fn account(&self) -> Address {
        self.address()
    }

    async fn personal_sign(&self, message: &str) -> Result<Signature, ProofError> {
        self.sign_message_sync(message.as_bytes())
            .map_err(|e| ProofError::SigningRejected(e.to_string()))
    }
}

/// A signature returned by a wallet connection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    /// 65-byte `r || s || v` signature, hex encoded
    pub signature: String,
    pub signer: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// Ask the connected wallet to sign `message`.
pub async fn request_signature(
    connection: Option<&dyn WalletConnection>,
    message: &str,
) -> Result<SignedMessage, ProofError> {
    let connection = connection.ok_or(ProofError::WalletNotConnected)?;
    let signature = connection.personal_sign(message).await?;
    Ok(SignedMessage {
        signature: format!("0x{}", alloy::hex::encode(signature.as_bytes())),
        signer: connection.account().to_string().to_lowercase(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn signer() -> PrivateKeySigner {
        KEY.parse().unwrap()
    }

    fn signed_proof(signer: &PrivateKeySigner) -> OwnershipProof {
        let address = signer.address().to_string();
        let challenge = generate_message(&address, None);
        let signature = signer.sign_message_sync(challenge.message.as_bytes()).unwrap();
        OwnershipProof {
            wallet_address: address,
            timestamp: challenge.timestamp,
            nonce: challenge.nonce,
            message: challenge.message,
            signature: format!("0x{}", alloy::hex::encode(signature.as_bytes())),
        }
    }

    #[test]
    fn message_matches_canonical_layout() {
        let message = ownership_message("0xabc", 1_700_000_000_000, "nonce123");
        assert_eq!(
            message,
            "I am the owner of wallet 0xabc.\n\nTimestamp: 1700000000000\nNonce: nonce123\n\nThis signature is used to verify wallet ownership for ShapeCraft UsePools."
        );
    }

    #[test]
    fn generate_message_lowercases_address_and_fills_nonce() {
        let challenge = generate_message("0xABCDEF0000000000000000000000000000000001", None);
        assert!(challenge
            .message
            .contains("wallet 0xabcdef0000000000000000000000000000000001."));
        assert!(challenge.nonce.len() >= MIN_NONCE_LEN);
        assert!(challenge.nonce.chars().all(|c| c.is_ascii_alphanumeric()));

        let fixed = generate_message("0xabc", Some("myNonce99"));
        assert_eq!(fixed.nonce, "myNonce99");
    }

    #[test]
    fn parse_message_round_trips_components() {
        let challenge = generate_message("0x00000000000000000000000000000000000000aa", None);
        let parsed = parse_message(&challenge.message).unwrap();
        assert_eq!(parsed.wallet_address, "0x00000000000000000000000000000000000000aa");
        assert_eq!(parsed.timestamp, challenge.timestamp);
        assert_eq!(parsed.nonce, challenge.nonce);

        assert!(parse_message("hello").is_none());
        assert!(parse_message(&challenge.message.replace("Timestamp: ", "Timestamp: x")).is_none());
    }

    #[test]
    fn validate_components_enforces_window_and_nonce() {
        let now = 1_700_000_000_000;
        let mut components = ProofComponents {
            wallet_address: "0x00000000000000000000000000000000000000aa".to_string(),
            timestamp: now - 1_000,
            nonce: "abcdefgh".to_string(),
        };
        let max_age = Duration::from_secs(300);
        assert!(validate_components(&components, max_age, now).is_ok());

        components.timestamp = now - 301_000;
        assert!(matches!(
            validate_components(&components, max_age, now),
            Err(ProofError::Expired)
        ));

        components.timestamp = now + FUTURE_SKEW_MS + 1;
        assert!(matches!(
            validate_components(&components, max_age, now),
            Err(ProofError::FromFuture)
        ));

        components.timestamp = now;
        components.nonce = "short".to_string();
        assert!(matches!(
            validate_components(&components, max_age, now),
            Err(ProofError::NonceTooShort)
        ));

        components.nonce = "abcdefgh".to_string();
        components.wallet_address = "0xnothex".to_string();
        assert!(matches!(
            validate_components(&components, max_age, now),
            Err(ProofError::InvalidAddress(_))
        ));
    }

    #[test]
    fn signed_proof_verifies_case_insensitively() {
        let signer = signer();
        let mut proof = signed_proof(&signer);
        assert!(verify_proof(&proof));

        proof.wallet_address = proof.wallet_address.to_uppercase().replacen("0X", "0x", 1);
        assert!(verify_proof(&proof));
    }

    #[test]
    fn flipping_any_signature_byte_fails_verification() {
        let signer = signer();
        let proof = signed_proof(&signer);
        let bytes = alloy::hex::decode(&proof.signature).unwrap();

        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let candidate = OwnershipProof {
                signature: format!("0x{}", alloy::hex::encode(&tampered)),
                ..proof.clone()
            };
            assert!(!verify_proof(&candidate), "byte {i} flip still verified");
        }
    }

    #[test]
    fn other_signer_or_message_fails() {
        let proof = signed_proof(&signer());
        let (other_key, _) = crate::blockchain::signing::generate_keypair();
        let other = crate::blockchain::signing::signer_from_hex(&other_key).unwrap();
        let forged = OwnershipProof {
            wallet_address: other.address().to_string(),
            ..proof.clone()
        };
        assert!(!verify_proof(&forged));

        let altered = OwnershipProof {
            message: proof.message.replace("Nonce", "N0nce"),
            ..proof.clone()
        };
        assert!(!verify_proof(&altered));

        let garbage = OwnershipProof {
            signature: "0x1234".to_string(),
            ..proof
        };
        assert!(!verify_proof(&garbage));
    }

    #[tokio::test]
    async fn request_signature_requires_connection() {
        let result = request_signature(None, "hello").await;
        assert!(matches!(result, Err(ProofError::WalletNotConnected)));
    }

    #[tokio::test]
    async fn request_signature_returns_recoverable_signature() {
        let signer = signer();
        let signed = request_signature(Some(&signer as &dyn WalletConnection), "hello").await.unwrap();
        assert_eq!(signed.signer, signer.address().to_string().to_lowercase());
        assert_eq!(recover_signer("hello", &signed.signature).unwrap(), signer.address());
    }
}
