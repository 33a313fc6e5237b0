// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal amount conversion between display strings and base units.

use alloy::primitives::U256;

use super::client::ChainError;

/// Decimals of the native token (ETH on Shape).
pub const ETHER_DECIMALS: u8 = 18;

/// Decimals of the gwei unit used for gas prices.
pub const GWEI_DECIMALS: u8 = 9;

/// Parse a human-readable amount to base units.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1.5")
/// * `decimals` - Number of decimals (18 for ETH, 9 for gwei)
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, ChainError> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(ChainError::InvalidAmount(format!("`{amount}` is not a number")));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(ChainError::InvalidAmount(format!("`{amount}` is not a number")));
    }
    if fraction.len() > decimals as usize {
        return Err(ChainError::InvalidAmount(format!(
            "Too many decimal places (max {decimals})"
        )));
    }

    let digits = format!("{whole}{fraction:0<width$}", width = decimals as usize);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10)
        .map_err(|_| ChainError::InvalidAmount(format!("`{amount}` is out of range")))
}

/// Format base units with a decimal point, always keeping one fractional
/// digit (`1.0`, `0.05`).
pub fn format_units(amount: U256, decimals: u8) -> String {
    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    let fraction = format!("{:0>width$}", remainder, width = decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{fraction}")
    }
}

pub fn parse_ether(amount: &str) -> Result<U256, ChainError> {
    parse_units(amount, ETHER_DECIMALS)
}

pub fn format_ether(wei: U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Parse a wei amount stored as a decimal string.
pub fn parse_wei(wei: &str) -> Result<U256, ChainError> {
    U256::from_str_radix(wei.trim(), 10)
        .map_err(|_| ChainError::InvalidAmount(format!("`{wei}` is not a wei amount")))
}

/// Lossy ETH value for threshold comparisons (rule limits, price caps).
pub fn wei_to_eth_f64(wei: U256) -> f64 {
    format_ether(wei).parse().unwrap_or(f64::MAX)
}
