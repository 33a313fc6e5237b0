// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encryption at rest for custodial private keys.
//!
//! Every stored key carries the scheme it was sealed with, so decryption
//! dispatches on the tag instead of guessing the envelope format.
//!
//! | Scheme | Cipher | Key derivation | Envelope (base64) |
//! |--------|--------|----------------|-------------------|
//! | `v1` | AES-256-CBC, PKCS#7 | PBKDF2-HMAC-SHA512, 100k rounds | salt(64) ‖ iv(16) ‖ ct |
//! | `v2` | AES-256-GCM | PBKDF2-HMAC-SHA256, 100k rounds | salt(16) ‖ nonce(12) ‖ ct ‖ tag |
//!
//! `v1` is the legacy envelope and is only ever decrypted. New keys are
//! always sealed with `v2`.

use std::{fmt, num::NonZeroU32, sync::Arc};

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64ct::{Base64, Encoding};
use ring::{
    aead, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use serde::{Deserialize, Serialize};

use crate::blockchain::signing::{is_private_key_hex, signer_from_hex};

const PBKDF2_ROUNDS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(rounds) => rounds,
    None => unreachable!(),
};
const KEY_LEN: usize = 32;

const V1_SALT_LEN: usize = 64;
const V1_IV_LEN: usize = 16;

const V2_SALT_LEN: usize = 16;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Envelope format of an encrypted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    V1,
    V2,
}

/// An encrypted private key together with its envelope tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    pub scheme: KeyScheme,
    pub ciphertext: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("private key decryption failed")]
    DecryptionFailed,

    #[error("private key encryption failed")]
    EncryptionFailed,

    #[error("refusing to encrypt a value that is not a private key")]
    InvalidPlaintext,
}

/// Symmetric vault keyed by the server master secret.
#[derive(Clone)]
pub struct KeyVault {
    master: Arc<str>,
    rng: SystemRandom,
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault").field("master", &"<redacted>").finish()
    }
}

impl KeyVault {
    pub fn new(master_key: impl Into<String>) -> Self {
        Self {
            master: Arc::from(master_key.into()),
            rng: SystemRandom::new(),
        }
    }

    /// Seal a `0x`-prefixed hex private key with the current scheme.
    pub fn encrypt(&self, private_key: &str) -> Result<EncryptedKey, VaultError> {
        if !is_private_key_hex(private_key) {
            return Err(VaultError::InvalidPlaintext);
        }

        let mut salt = [0u8; V2_SALT_LEN];
        let mut nonce = [0u8; aead::NONCE_LEN];
        self.rng.fill(&mut salt).map_err(|_| VaultError::EncryptionFailed)?;
        self.rng.fill(&mut nonce).map_err(|_| VaultError::EncryptionFailed)?;

        let key = self.v2_key(&salt)?;
        let mut sealed = private_key.as_bytes().to_vec();
        key.seal_in_place_append_tag(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::empty(),
            &mut sealed,
        )
        .map_err(|_| VaultError::EncryptionFailed)?;

        let mut envelope = Vec::with_capacity(V2_SALT_LEN + aead::NONCE_LEN + sealed.len());
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&sealed);

        Ok(EncryptedKey {
            scheme: KeyScheme::V2,
            ciphertext: Base64::encode_string(&envelope),
        })
    }

    /// Recover the hex private key from an envelope of either scheme.
    pub fn decrypt(&self, encrypted: &EncryptedKey) -> Result<String, VaultError> {
        let envelope =
            Base64::decode_vec(&encrypted.ciphertext).map_err(|_| VaultError::DecryptionFailed)?;

        let plaintext = match encrypted.scheme {
            KeyScheme::V1 => self.open_v1(&envelope)?,
            KeyScheme::V2 => self.open_v2(envelope)?,
        };

        let private_key = String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed)?;
        // CBC has no integrity check; a wrong key or flipped bit that still
        // unpads cleanly must not yield a usable "key".
        if !is_private_key_hex(&private_key) {
            return Err(VaultError::DecryptionFailed);
        }
        Ok(private_key)
    }

    /// Recover the private key controlling `address`.
    ///
    /// A `v1` envelope with a flipped IV byte still unpads to a well-formed
    /// key, just not this one, so the derived address is compared too.
    pub fn decrypt_for(&self, encrypted: &EncryptedKey, address: &str) -> Result<String, VaultError> {
        let private_key = self.decrypt(encrypted)?;
        let signer = signer_from_hex(&private_key).map_err(|_| VaultError::DecryptionFailed)?;
        if !signer.address().to_string().eq_ignore_ascii_case(address) {
            return Err(VaultError::DecryptionFailed);
        }
        Ok(private_key)
    }

    fn open_v1(&self, envelope: &[u8]) -> Result<Vec<u8>, VaultError> {
        if envelope.len() <= V1_SALT_LEN + V1_IV_LEN {
            return Err(VaultError::DecryptionFailed);
        }
        let (salt, rest) = envelope.split_at(V1_SALT_LEN);
        let (iv, ciphertext) = rest.split_at(V1_IV_LEN);

        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA512,
            PBKDF2_ROUNDS,
            salt,
            self.master.as_bytes(),
            &mut key,
        );

        Aes256CbcDec::new_from_slices(&key, iv)
            .map_err(|_| VaultError::DecryptionFailed)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)
    }

    fn open_v2(&self, envelope: Vec<u8>) -> Result<Vec<u8>, VaultError> {
        if envelope.len() < V2_SALT_LEN + aead::NONCE_LEN + aead::AES_256_GCM.tag_len() {
            return Err(VaultError::DecryptionFailed);
        }
        let (salt, rest) = envelope.split_at(V2_SALT_LEN);
        let (nonce, sealed) = rest.split_at(aead::NONCE_LEN);

        let key = self.v2_key(salt).map_err(|_| VaultError::DecryptionFailed)?;
        let nonce =
            aead::Nonce::try_assume_unique_for_key(nonce).map_err(|_| VaultError::DecryptionFailed)?;

        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::DecryptionFailed)?;
        Ok(plaintext.to_vec())
    }

    fn v2_key(&self, salt: &[u8]) -> Result<aead::LessSafeKey, VaultError> {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ROUNDS,
            salt,
            self.master.as_bytes(),
            &mut key,
        );
        let unbound =
            aead::UnboundKey::new(&aead::AES_256_GCM, &key).map_err(|_| VaultError::EncryptionFailed)?;
        Ok(aead::LessSafeKey::new(unbound))
    }

    /// Produce a legacy envelope, for exercising the read path.
    #[cfg(test)]
    pub(crate) fn encrypt_v1(&self, private_key: &str) -> EncryptedKey {
        use aes::cipher::BlockEncryptMut;
        type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

        let mut salt = [0u8; V1_SALT_LEN];
        let mut iv = [0u8; V1_IV_LEN];
        self.rng.fill(&mut salt).unwrap();
        self.rng.fill(&mut iv).unwrap();

        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA512,
            PBKDF2_ROUNDS,
            &salt,
            self.master.as_bytes(),
            &mut key,
        );
        let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(private_key.as_bytes());

        let mut envelope = salt.to_vec();
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&ciphertext);
        EncryptedKey {
            scheme: KeyScheme::V1,
            ciphertext: Base64::encode_string(&envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::generate_keypair;

    fn flip_byte(encrypted: &EncryptedKey, index: usize) -> EncryptedKey {
        let mut bytes = Base64::decode_vec(&encrypted.ciphertext).unwrap();
        let index = index.min(bytes.len() - 1);
        bytes[index] ^= 0x01;
        EncryptedKey {
            scheme: encrypted.scheme,
            ciphertext: Base64::encode_string(&bytes),
        }
    }

    #[test]
    fn v2_round_trip() {
        let vault = KeyVault::new("master-secret");
        let (private_key, _) = generate_keypair();

        let sealed = vault.encrypt(&private_key).unwrap();
        assert_eq!(sealed.scheme, KeyScheme::V2);
        assert!(!sealed.ciphertext.contains(&private_key[2..]));
        assert_eq!(vault.decrypt(&sealed).unwrap(), private_key);
    }

    #[test]
    fn legacy_v1_envelope_decrypts() {
        let vault = KeyVault::new("master-secret");
        let (private_key, _) = generate_keypair();

        let legacy = vault.encrypt_v1(&private_key);
        assert_eq!(vault.decrypt(&legacy).unwrap(), private_key);
    }

    #[test]
    fn tampered_v2_ciphertext_fails() {
        let vault = KeyVault::new("master-secret");
        let (private_key, _) = generate_keypair();
        let sealed = vault.encrypt(&private_key).unwrap();

        for index in [0, V2_SALT_LEN, V2_SALT_LEN + aead::NONCE_LEN, usize::MAX] {
            let tampered = flip_byte(&sealed, index);
            assert!(matches!(
                vault.decrypt(&tampered),
                Err(VaultError::DecryptionFailed)
            ));
        }
    }

    #[test]
    fn tampered_v1_ciphertext_fails() {
        let vault = KeyVault::new("master-secret");
        let (private_key, address) = generate_keypair();
        let legacy = vault.encrypt_v1(&private_key);
        assert_eq!(vault.decrypt_for(&legacy, &address).unwrap(), private_key);

        let total = Base64::decode_vec(&legacy.ciphertext).unwrap().len();
        let iv_bytes = V1_SALT_LEN..V1_SALT_LEN + V1_IV_LEN;
        for index in [0, V1_SALT_LEN + V1_IV_LEN, total - 1].into_iter().chain(iv_bytes) {
            let tampered = flip_byte(&legacy, index);
            assert!(matches!(
                vault.decrypt_for(&tampered, &address),
                Err(VaultError::DecryptionFailed)
            ));
        }
    }

    #[test]
    fn envelope_for_another_address_fails() {
        let vault = KeyVault::new("master-secret");
        let (private_key, _) = generate_keypair();
        let (_, other_address) = generate_keypair();
        let sealed = vault.encrypt(&private_key).unwrap();

        assert!(matches!(
            vault.decrypt_for(&sealed, &other_address),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn wrong_master_key_fails() {
        let (private_key, _) = generate_keypair();
        let sealed = KeyVault::new("one").encrypt(&private_key).unwrap();
        assert!(KeyVault::new("two").decrypt(&sealed).is_err());
    }

    #[test]
    fn scheme_tag_mismatch_fails() {
        let vault = KeyVault::new("master-secret");
        let (private_key, _) = generate_keypair();
        let mut sealed = vault.encrypt(&private_key).unwrap();
        sealed.scheme = KeyScheme::V1;
        assert!(vault.decrypt(&sealed).is_err());
    }

    #[test]
    fn malformed_base64_fails() {
        let vault = KeyVault::new("master-secret");
        let bogus = EncryptedKey {
            scheme: KeyScheme::V2,
            ciphertext: "not base64 !!".into(),
        };
        assert!(matches!(vault.decrypt(&bogus), Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn rejects_non_key_plaintext() {
        let vault = KeyVault::new("master-secret");
        assert!(matches!(
            vault.encrypt("hello"),
            Err(VaultError::InvalidPlaintext)
        ));
    }

    #[test]
    fn envelope_serializes_with_lowercase_tag() {
        let key = EncryptedKey {
            scheme: KeyScheme::V1,
            ciphertext: "abc".into(),
        };
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["scheme"], "v1");
    }

    #[test]
    fn debug_redacts_master_key() {
        let vault = KeyVault::new("super-secret");
        assert!(!format!("{vault:?}").contains("super-secret"));
    }
}
