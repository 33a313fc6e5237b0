// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pool Custody Server - Custodial Shape Wallet Service
//!
//! Users sign in by signing a challenge with their own wallet. The server
//! then holds managed wallets for them, invests from those wallets into NFT
//! liquidity pools and runs rule-driven auto-investment in the background.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Wallet-ownership proofs and session tokens
//! - `blockchain` - Shape (EVM) chain access
//! - `crypto` - Private key envelopes
//! - `custody` - Managed wallet lifecycle and signing
//! - `pools` - Pool registry and investment
//! - `auto_invest` - Investment rules, monitor and scheduler
//! - `storage` - Embedded database (redb)

pub mod api;
pub mod auth;
pub mod auto_invest;
pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod models;
pub mod pools;
pub mod state;
pub mod storage;
