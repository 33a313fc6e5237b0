// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auto-investment rule management for the session user.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{CreateRuleRequest, UpdateRuleRequest};
use crate::storage::{
    AutoInvestRepository, AutoInvestment, AutoInvestmentRule, ReadTxn, StorageError, StorageResult,
    Store, WalletRepository,
};

#[derive(Debug, thiserror::Error)]
pub enum AutoInvestError {
    #[error("Rule not found or doesn't belong to user")]
    RuleNotFound,

    #[error("Wallet not found or doesn't belong to user")]
    WalletNotOwned,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RuleWallet {
    pub address: String,
    pub name: String,
}

/// A rule with its paying wallet and investment history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RuleView {
    #[serde(flatten)]
    pub rule: AutoInvestmentRule,
    pub wallet: Option<RuleWallet>,
    pub investments: Vec<AutoInvestment>,
}

#[derive(Clone)]
pub struct RuleService {
    store: Arc<Store>,
}

impl RuleService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create_rule(
        &self,
        user_id: &str,
        request: CreateRuleRequest,
    ) -> Result<RuleView, AutoInvestError> {
        if request.name.trim().is_empty() || request.wallet_id.is_empty() {
            return Err(AutoInvestError::Validation(
                "Missing required fields: name, investmentAmount, walletId".into(),
            ));
        }
        validate_amount(request.investment_amount)?;

        let rule = AutoInvestmentRule {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            wallet_id: request.wallet_id,
            name: request.name.trim().to_string(),
            investment_amount: request.investment_amount,
            max_buy_price: request.max_buy_price,
            min_sell_price: request.min_sell_price,
            max_creator_fee: request.max_creator_fee,
            min_pool_age_minutes: request.min_pool_age_minutes,
            max_investment_per_day: request.max_investment_per_day,
            pool_types: request.pool_types,
            chains: request.chains,
            allowed_collections: lowercase(request.allowed_collections),
            require_verified_creator: request.require_verified_creator,
            is_active: true,
            total_invested: 0.0,
            total_investments: 0,
            last_triggered: None,
            created_at: Utc::now(),
        };

        let view = self.store.write(|txn| {
            ensure_wallet_owned(txn, user_id, &rule.wallet_id)?;
            AutoInvestRepository::new(txn).insert_rule(&rule)?;
            Ok::<_, AutoInvestError>(view_of(txn, rule.clone())?)
        })?;

        tracing::info!(rule_id = %view.rule.id, user_id = %user_id, "Created auto-investment rule");
        Ok(view)
    }

    /// Rules of the user, newest first.
    pub fn list_rules(&self, user_id: &str) -> Result<Vec<RuleView>, AutoInvestError> {
        let views = self.store.read(|txn| {
            AutoInvestRepository::new(txn)
                .list_rules_by_user(user_id)?
                .into_iter()
                .map(|rule| view_of(txn, rule))
                .collect::<StorageResult<Vec<_>>>()
        })?;
        Ok(views)
    }

    pub fn update_rule(
        &self,
        user_id: &str,
        rule_id: &str,
        patch: UpdateRuleRequest,
    ) -> Result<RuleView, AutoInvestError> {
        if let Some(amount) = patch.investment_amount {
            validate_amount(amount)?;
        }

        self.store.write(|txn| {
            let repo = AutoInvestRepository::new(txn);
            let mut rule = repo
                .get_rule(rule_id)?
                .filter(|r| r.user_id == user_id)
                .ok_or(AutoInvestError::RuleNotFound)?;

            if let Some(wallet_id) = patch.wallet_id {
                ensure_wallet_owned(txn, user_id, &wallet_id)?;
                rule.wallet_id = wallet_id;
            }
            if let Some(name) = patch.name {
                rule.name = name;
            }
            if let Some(is_active) = patch.is_active {
                rule.is_active = is_active;
            }
            if let Some(amount) = patch.investment_amount {
                rule.investment_amount = amount;
            }
            if let Some(v) = patch.max_buy_price {
                rule.max_buy_price = v;
            }
            if let Some(v) = patch.min_sell_price {
                rule.min_sell_price = v;
            }
            if let Some(v) = patch.max_creator_fee {
                rule.max_creator_fee = v;
            }
            if let Some(v) = patch.min_pool_age_minutes {
                rule.min_pool_age_minutes = v;
            }
            if let Some(v) = patch.max_investment_per_day {
                rule.max_investment_per_day = v;
            }
            if let Some(v) = patch.pool_types {
                rule.pool_types = v;
            }
            if let Some(v) = patch.chains {
                rule.chains = v;
            }
            if let Some(v) = patch.allowed_collections {
                rule.allowed_collections = lowercase(v);
            }
            if let Some(v) = patch.require_verified_creator {
                rule.require_verified_creator = v;
            }

            repo.update_rule(&rule)?;
            Ok(view_of(txn, rule)?)
        })
    }

    /// Delete a rule and its investment history.
    pub fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<(), AutoInvestError> {
        self.store.write(|txn| {
            let repo = AutoInvestRepository::new(txn);
            repo.get_rule(rule_id)?
                .filter(|r| r.user_id == user_id)
                .ok_or(AutoInvestError::RuleNotFound)?;
            repo.delete_rule(rule_id)?;
            Ok::<_, AutoInvestError>(())
        })?;
        tracing::info!(rule_id = %rule_id, user_id = %user_id, "Deleted auto-investment rule");
        Ok(())
    }
}

fn validate_amount(amount: f64) -> Result<(), AutoInvestError> {
    if amount > 0.0 && amount.is_finite() {
        Ok(())
    } else {
        Err(AutoInvestError::Validation(
            "Investment amount must be positive".into(),
        ))
    }
}

fn lowercase(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.to_lowercase()).collect()
}

fn ensure_wallet_owned<T: ReadTxn>(
    txn: &T,
    user_id: &str,
    wallet_id: &str,
) -> Result<(), AutoInvestError> {
    WalletRepository::new(txn)
        .get(wallet_id)?
        .filter(|w| w.user_id == user_id && w.is_active)
        .map(|_| ())
        .ok_or(AutoInvestError::WalletNotOwned)
}

fn view_of<T: ReadTxn>(txn: &T, rule: AutoInvestmentRule) -> StorageResult<RuleView> {
    let wallet = WalletRepository::new(txn)
        .get(&rule.wallet_id)?
        .map(|w| RuleWallet {
            address: w.address,
            name: w.name,
        });
    let investments = AutoInvestRepository::new(txn).list_investments_for_rule(&rule.id)?;
    Ok(RuleView {
        rule,
        wallet,
        investments,
    })
}
