// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auto-investment rules and the per-(rule, pool) investment attempts they
//! produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::database::{
    ReadTxn, StorageError, StorageResult, WriteTxn, AUTO_INVESTMENTS, AUTO_RULES,
};

/// User-defined criteria for investing into newly created pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoInvestmentRule {
    pub id: String,
    pub user_id: String,
    /// Managed wallet the investments are paid from
    pub wallet_id: String,
    pub name: String,
    /// Amount invested per matching pool, in ETH
    pub investment_amount: f64,
    /// Upper bound on the pool buy price, in ETH
    pub max_buy_price: Option<f64>,
    /// Lower bound on the pool sell price, in ETH
    pub min_sell_price: Option<f64>,
    /// Upper bound on the creator fee, in percent
    pub max_creator_fee: Option<f64>,
    pub min_pool_age_minutes: Option<i64>,
    /// Daily spend cap across all of this rule's investments, in ETH
    pub max_investment_per_day: Option<f64>,
    #[serde(default)]
    pub pool_types: Vec<String>,
    #[serde(default)]
    pub chains: Vec<u64>,
    #[serde(default)]
    pub allowed_collections: Vec<String>,
    #[serde(default)]
    pub require_verified_creator: bool,
    pub is_active: bool,
    pub total_invested: f64,
    pub total_investments: u64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoInvestmentStatus {
    Processing,
    Completed,
    Failed,
}

/// One attempt of a rule against a pool. At most one exists per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoInvestment {
    pub id: String,
    pub rule_id: String,
    pub pool_id: String,
    pub user_id: String,
    /// Amount in ETH
    pub amount: f64,
    pub status: AutoInvestmentStatus,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn investment_key(rule_id: &str, pool_id: &str) -> String {
    format!("{rule_id}|{pool_id}")
}

pub struct AutoInvestRepository<'t, T> {
    txn: &'t T,
}

impl<'t, T: ReadTxn> AutoInvestRepository<'t, T> {
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }

    pub fn get_rule(&self, rule_id: &str) -> StorageResult<Option<AutoInvestmentRule>> {
        self.txn.get_json(AUTO_RULES, rule_id)
    }

    pub fn list_rules(&self) -> StorageResult<Vec<AutoInvestmentRule>> {
        self.txn.scan_json(AUTO_RULES, "")
    }

    /// Rules of a user, newest first.
    pub fn list_rules_by_user(&self, user_id: &str) -> StorageResult<Vec<AutoInvestmentRule>> {
        let mut rules = self.list_rules()?;
        rules.retain(|r| r.user_id == user_id);
        rules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rules)
    }

    pub fn list_active_rules(&self) -> StorageResult<Vec<AutoInvestmentRule>> {
        let mut rules = self.list_rules()?;
        rules.retain(|r| r.is_active);
        Ok(rules)
    }

    pub fn get_investment(
        &self,
        rule_id: &str,
        pool_id: &str,
    ) -> StorageResult<Option<AutoInvestment>> {
        self.txn
            .get_json(AUTO_INVESTMENTS, &investment_key(rule_id, pool_id))
    }

    pub fn list_investments_for_rule(&self, rule_id: &str) -> StorageResult<Vec<AutoInvestment>> {
        self.txn.scan_json(AUTO_INVESTMENTS, &format!("{rule_id}|"))
    }

    pub fn list_investments(&self) -> StorageResult<Vec<AutoInvestment>> {
        self.txn.scan_json(AUTO_INVESTMENTS, "")
    }
}

impl<'t, T: WriteTxn> AutoInvestRepository<'t, T> {
    pub fn insert_rule(&self, rule: &AutoInvestmentRule) -> StorageResult<()> {
        if self.txn.get_bytes(AUTO_RULES, &rule.id)?.is_some() {
            return Err(StorageError::Conflict(format!("rule {} already exists", rule.id)));
        }
        self.txn.put_json(AUTO_RULES, &rule.id, rule)
    }

    pub fn update_rule(&self, rule: &AutoInvestmentRule) -> StorageResult<()> {
        self.txn.put_json(AUTO_RULES, &rule.id, rule)
    }

    /// Delete a rule together with its investment history.
    pub fn delete_rule(&self, rule_id: &str) -> StorageResult<bool> {
        for investment in self.list_investments_for_rule(rule_id)? {
            self.txn.remove(
                AUTO_INVESTMENTS,
                &investment_key(&investment.rule_id, &investment.pool_id),
            )?;
        }
        self.txn.remove(AUTO_RULES, rule_id)
    }

    /// Claim the (rule, pool) pair. Fails with `Conflict` if already attempted.
    pub fn insert_investment(&self, investment: &AutoInvestment) -> StorageResult<()> {
        let key = investment_key(&investment.rule_id, &investment.pool_id);
        if self.txn.get_bytes(AUTO_INVESTMENTS, &key)?.is_some() {
            return Err(StorageError::Conflict(format!(
                "rule {} already invested in pool {}",
                investment.rule_id, investment.pool_id
            )));
        }
        self.txn.put_json(AUTO_INVESTMENTS, &key, investment)
    }

    pub fn update_investment(&self, investment: &AutoInvestment) -> StorageResult<()> {
        self.txn.put_json(
            AUTO_INVESTMENTS,
            &investment_key(&investment.rule_id, &investment.pool_id),
            investment,
        )
    }
}

#[cfg(test)]
pub(crate) fn sample_rule(id: &str, user_id: &str, wallet_id: &str) -> AutoInvestmentRule {
    AutoInvestmentRule {
        id: id.to_string(),
        user_id: user_id.to_string(),
        wallet_id: wallet_id.to_string(),
        name: format!("Rule {id}"),
        investment_amount: 0.01,
        max_buy_price: None,
        min_sell_price: None,
        max_creator_fee: None,
        min_pool_age_minutes: None,
        max_investment_per_day: None,
        pool_types: vec![],
        chains: vec![],
        allowed_collections: vec![],
        require_verified_creator: false,
        is_active: true,
        total_invested: 0.0,
        total_investments: 0,
        last_triggered: None,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;

    fn investment(rule_id: &str, pool_id: &str) -> AutoInvestment {
        AutoInvestment {
            id: format!("{rule_id}-{pool_id}"),
            rule_id: rule_id.to_string(),
            pool_id: pool_id.to_string(),
            user_id: "u1".to_string(),
            amount: 0.01,
            status: AutoInvestmentStatus::Processing,
            tx_hash: None,
            error: None,
            executed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn investment_pair_is_claimed_once() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|txn| AutoInvestRepository::new(txn).insert_investment(&investment("r1", "p1")))
            .unwrap();

        let second = store
            .write(|txn| AutoInvestRepository::new(txn).insert_investment(&investment("r1", "p1")));
        assert!(matches!(second, Err(StorageError::Conflict(_))));

        store
            .write(|txn| AutoInvestRepository::new(txn).insert_investment(&investment("r2", "p1")))
            .unwrap();
        let all = store
            .read(|txn| AutoInvestRepository::new(txn).list_investments())
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn delete_rule_drops_its_investments() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|txn| {
                let repo = AutoInvestRepository::new(txn);
                repo.insert_rule(&sample_rule("r1", "u1", "w1"))?;
                repo.insert_rule(&sample_rule("r10", "u1", "w1"))?;
                repo.insert_investment(&investment("r1", "p1"))?;
                repo.insert_investment(&investment("r10", "p1"))
            })
            .unwrap();

        let removed = store
            .write(|txn| AutoInvestRepository::new(txn).delete_rule("r1"))
            .unwrap();
        assert!(removed);

        store
            .read(|txn| {
                let repo = AutoInvestRepository::new(txn);
                assert!(repo.get_rule("r1")?.is_none());
                assert!(repo.get_investment("r1", "p1")?.is_none());
                assert!(repo.get_investment("r10", "p1")?.is_some());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn active_rules_exclude_paused() {
        let store = Store::open_in_memory().unwrap();
        let mut paused = sample_rule("r2", "u1", "w1");
        paused.is_active = false;
        store
            .write(|txn| {
                let repo = AutoInvestRepository::new(txn);
                repo.insert_rule(&sample_rule("r1", "u1", "w1"))?;
                repo.insert_rule(&paused)
            })
            .unwrap();

        let (active, mine) = store
            .read(|txn| {
                let repo = AutoInvestRepository::new(txn);
                Ok((repo.list_active_rules()?, repo.list_rules_by_user("u1")?))
            })
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(mine.len(), 2);
    }
}
