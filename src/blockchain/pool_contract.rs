// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Binding for the NFT pool contract.

use alloy::{
    primitives::{Address, Bytes},
    sol,
    sol_types::{SolCall, SolEvent},
};

use super::types::TxReceipt;

sol! {
    /// Investment surface of a pool contract.
    interface IPool {
        /// Contribute the attached value to the pool.
        function invest() external payable;

        /// Emitted whenever a participant's contribution changes.
        event ParticipationUpdated(address indexed participant, uint256 amount, uint256 totalContribution);
    }
}

/// Calldata for `invest()`.
pub fn invest_calldata() -> Bytes {
    IPool::investCall {}.abi_encode().into()
}

/// Find the `ParticipationUpdated` event emitted by `pool` in a receipt.
pub fn find_participation(
    receipt: &TxReceipt,
    pool: Address,
) -> Option<IPool::ParticipationUpdated> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == pool)
        .find_map(|log| {
            IPool::ParticipationUpdated::decode_raw_log(log.topics.iter().copied(), &log.data).ok()
        })
}
