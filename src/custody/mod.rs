// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial wallet management.

pub mod error;
pub mod service;

pub use error::CustodyError;
pub use service::{
    build_tx_request, BalanceSnapshot, CustodyService, GasQuote, SubmitRequest, Submission,
    WithdrawRequest, STALE_BALANCE_NOTE,
};
