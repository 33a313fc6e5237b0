// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Users sign in by proving control of a wallet address.
//!
//! ## Auth Flow
//!
//! 1. Client fetches a challenge (`GET /api/auth/challenge?address=`)
//! 2. Wallet signs the challenge with `personal_sign`
//! 3. Server:
//!    - Recovers the signer and compares it with the claimed address
//!    - Rejects expired proofs and reused nonces
//!    - Finds or creates the user for the address
//!    - Issues an HS256 session token (body + `wallet_session` cookie)
//!
//! ## Security
//!
//! - All wallet, pool and auto-invest endpoints require a session
//! - Clock skew tolerance is 60 seconds

pub mod error;
pub mod extractor;
pub mod proof;
pub mod service;
pub mod session;

pub use error::AuthError;
pub use extractor::Auth;
pub use proof::{
    generate_message, request_signature, verify_proof, OwnershipChallenge, OwnershipProof,
    ProofError, SignedMessage, WalletConnection,
};
pub use service::{AuthService, Credentials, ReplayPolicy};
pub use session::{SessionKeys, SessionUser, SESSION_COOKIE};
