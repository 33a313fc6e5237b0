// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request bodies and query strings accepted by the REST API. Response types
//! mostly live next to the services that produce them.
//!
//! ## Lenient numbers
//!
//! Browser clients send numeric fields either as JSON numbers or as strings
//! (`"0.05"`). The `de_*` helpers accept both; an empty string is treated as
//! absent.
//!
//! ## Model Categories
//!
//! - **Auth**: challenge query
//! - **Wallets**: creation, updates, withdrawals, raw transactions, signing
//! - **Pools**: listing filters and investments
//! - **Auto-invest**: rule creation/updates and scheduler control

use serde::{Deserialize, Deserializer};
use utoipa::{IntoParams, ToSchema};

use crate::storage::PoolStatus;

// =============================================================================
// Lenient number parsing
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    /// Decimal text of the value; `None` for blank strings.
    fn into_text(self) -> Option<String> {
        match self {
            Numeric::Number(n) => Some(n.to_string()),
            Numeric::Text(s) if s.trim().is_empty() => None,
            Numeric::Text(s) => Some(s.trim().to_string()),
        }
    }
}

fn parse_f64<E: serde::de::Error>(text: &str) -> Result<f64, E> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| E::custom(format!("`{text}` is not a number")))
}

/// A required decimal amount kept as text, e.g. an ETH value.
pub fn de_amount<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Numeric::deserialize(d)?
        .into_text()
        .ok_or_else(|| serde::de::Error::custom("amount is required"))
}

pub fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let text = de_amount(d)?;
    parse_f64(&text)
}

pub fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<Numeric>::deserialize(d)?.and_then(Numeric::into_text) {
        Some(text) => parse_f64(&text).map(Some),
        None => Ok(None),
    }
}

pub fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(de_opt_f64(d)?.map(|v| v.trunc() as i64))
}

/// For patch bodies: absent → `None`, `null`/blank → `Some(None)`.
/// Use together with `#[serde(default)]`.
pub fn de_patch_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<f64>>, D::Error> {
    de_opt_f64(d).map(Some)
}

pub fn de_patch_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<i64>>, D::Error> {
    de_opt_i64(d).map(Some)
}

// =============================================================================
// Auth Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ChallengeQuery {
    /// Wallet address to prove ownership of
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct AddressQuery {
    /// Wallet address, any letter case
    pub address: String,
}

// =============================================================================
// Wallet Models
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    /// Must match the session user when present
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawBody {
    /// Amount in ETH
    #[serde(deserialize_with = "de_amount")]
    #[schema(value_type = String)]
    pub amount: String,
    /// Wallet to pay from; the first active wallet when absent
    #[serde(default)]
    pub wallet_id: Option<String>,
    /// Recipient; the user's own address when absent
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// A raw transaction to send from a managed wallet.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionRequest {
    pub to: String,
    /// Value in ETH
    #[serde(default, deserialize_with = "de_opt_amount")]
    #[schema(value_type = Option<String>)]
    pub value: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    #[schema(value_type = Option<String>)]
    pub gas_limit: Option<String>,
    /// Gas price in gwei
    #[serde(default, deserialize_with = "de_opt_amount")]
    #[schema(value_type = Option<String>)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

fn de_opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Numeric>::deserialize(d)?.and_then(Numeric::into_text))
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct EstimateQuery {
    pub to: String,
    /// Value in ETH
    pub value: Option<String>,
    pub data: Option<String>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of records (default 50)
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ChainQuery {
    pub chain_id: Option<u64>,
}

// =============================================================================
// Pool Models
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PoolListQuery {
    pub status: Option<PoolStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestBody {
    pub pool_id: String,
    /// Amount in ETH
    #[serde(deserialize_with = "de_amount")]
    #[schema(value_type = String)]
    pub amount: String,
    #[serde(default)]
    pub wallet_id: Option<String>,
}

// =============================================================================
// Auto-invest Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    pub name: String,
    /// Managed wallet row id paying for investments
    pub wallet_id: String,
    /// ETH per matching pool
    #[serde(deserialize_with = "de_f64")]
    pub investment_amount: f64,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub max_buy_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub min_sell_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub max_creator_fee: Option<f64>,
    #[serde(default, alias = "minPoolAge", deserialize_with = "de_opt_i64")]
    pub min_pool_age_minutes: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub max_investment_per_day: Option<f64>,
    #[serde(default)]
    pub pool_types: Vec<String>,
    #[serde(default)]
    pub chains: Vec<u64>,
    #[serde(default)]
    pub allowed_collections: Vec<String>,
    #[serde(default)]
    pub require_verified_creator: bool,
}

/// Partial rule update. Nullable limits distinguish "absent" from `null`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub wallet_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub investment_amount: Option<f64>,
    #[serde(default, deserialize_with = "de_patch_f64")]
    #[schema(value_type = Option<f64>)]
    pub max_buy_price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "de_patch_f64")]
    #[schema(value_type = Option<f64>)]
    pub min_sell_price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "de_patch_f64")]
    #[schema(value_type = Option<f64>)]
    pub max_creator_fee: Option<Option<f64>>,
    #[serde(default, alias = "minPoolAge", deserialize_with = "de_patch_i64")]
    #[schema(value_type = Option<i64>)]
    pub min_pool_age_minutes: Option<Option<i64>>,
    #[serde(default, deserialize_with = "de_patch_f64")]
    #[schema(value_type = Option<f64>)]
    pub max_investment_per_day: Option<Option<f64>>,
    #[serde(default)]
    pub pool_types: Option<Vec<String>>,
    #[serde(default)]
    pub chains: Option<Vec<u64>>,
    #[serde(default)]
    pub allowed_collections: Option<Vec<String>>,
    #[serde(default)]
    pub require_verified_creator: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerCommand {
    pub action: SchedulerAction,
    /// Cycle interval; the configured default when absent
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amounts_accept_numbers_and_strings() {
        let body: InvestBody = serde_json::from_value(json!({"poolId": "p", "amount": 0.05})).unwrap();
        assert_eq!(body.amount, "0.05");

        let body: InvestBody =
            serde_json::from_value(json!({"poolId": "p", "amount": " 1.5 "})).unwrap();
        assert_eq!(body.amount, "1.5");

        assert!(serde_json::from_value::<InvestBody>(json!({"poolId": "p", "amount": ""})).is_err());
    }

    #[test]
    fn rule_request_parses_string_limits() {
        let rule: CreateRuleRequest = serde_json::from_value(json!({
            "name": "floor sweeper",
            "walletId": "w1",
            "investmentAmount": "0.01",
            "maxBuyPrice": "0.5",
            "minSellPrice": "",
            "minPoolAge": "15",
            "chains": [11011],
        }))
        .unwrap();

        assert_eq!(rule.investment_amount, 0.01);
        assert_eq!(rule.max_buy_price, Some(0.5));
        assert_eq!(rule.min_sell_price, None);
        assert_eq!(rule.min_pool_age_minutes, Some(15));
        assert_eq!(rule.chains, vec![11011]);
        assert!(!rule.require_verified_creator);
    }

    #[test]
    fn rule_patch_distinguishes_null_from_absent() {
        let patch: UpdateRuleRequest =
            serde_json::from_value(json!({"maxBuyPrice": null, "minSellPrice": 0.2})).unwrap();

        assert_eq!(patch.max_buy_price, Some(None));
        assert_eq!(patch.min_sell_price, Some(Some(0.2)));
        assert_eq!(patch.max_creator_fee, None);
        assert_eq!(patch.is_active, None);
    }

    #[test]
    fn scheduler_command_is_lowercase() {
        let cmd: SchedulerCommand = serde_json::from_value(json!({"action": "start"})).unwrap();
        assert_eq!(cmd.action, SchedulerAction::Start);
        assert!(serde_json::from_value::<SchedulerCommand>(json!({"action": "restart"})).is_err());
    }
}
