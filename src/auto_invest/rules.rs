// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Matching of pools against auto-investment rules.

use chrono::{DateTime, Utc};

use crate::blockchain::units::{parse_wei, wei_to_eth_f64};
use crate::storage::{AutoInvestment, AutoInvestmentRule, AutoInvestmentStatus, Pool};

/// The first criterion a pool failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Mismatch {
    #[error("pool too young: {age_minutes:.1} < {min} minutes")]
    TooYoung { age_minutes: f64, min: i64 },

    #[error("buy price too high: {price} > {max} ETH")]
    BuyPriceTooHigh { price: f64, max: f64 },

    #[error("sell price too low: {price} < {min} ETH")]
    SellPriceTooLow { price: f64, min: f64 },

    #[error("creator fee too high: {fee}% > {max}%")]
    CreatorFeeTooHigh { fee: f64, max: f64 },

    #[error("pool type {0} not allowed")]
    PoolType(String),

    #[error("chain {0} not allowed")]
    Chain(u64),

    #[error("collection {0} not allowed")]
    Collection(String),

    #[error("would exceed daily limit: {projected} > {max} ETH")]
    DailyLimit { projected: f64, max: f64 },
}

/// Check `pool` against every criterion of `rule`.
///
/// `invested_today` is the amount the rule has already committed since the
/// start of the current UTC day (see [`invested_since`]).
pub fn check_rule(
    rule: &AutoInvestmentRule,
    pool: &Pool,
    now: DateTime<Utc>,
    invested_today: f64,
) -> Result<(), Mismatch> {
    if let Some(min) = rule.min_pool_age_minutes {
        let age_minutes = (now - pool.created_at).num_milliseconds() as f64 / 60_000.0;
        if age_minutes < min as f64 {
            return Err(Mismatch::TooYoung { age_minutes, min });
        }
    }

    if let Some(max) = rule.max_buy_price {
        let price = wei_price(&pool.buy_price);
        if price > max {
            return Err(Mismatch::BuyPriceTooHigh { price, max });
        }
    }

    if let Some(min) = rule.min_sell_price {
        let price = wei_price(&pool.sell_price);
        if price < min {
            return Err(Mismatch::SellPriceTooLow { price, min });
        }
    }

    if let Some(max) = rule.max_creator_fee {
        if pool.creator_fee > max {
            return Err(Mismatch::CreatorFeeTooHigh {
                fee: pool.creator_fee,
                max,
            });
        }
    }

    if !rule.pool_types.is_empty() && !rule.pool_types.contains(&pool.pool_type) {
        return Err(Mismatch::PoolType(pool.pool_type.clone()));
    }

    if !rule.chains.is_empty() && !rule.chains.contains(&pool.chain_id) {
        return Err(Mismatch::Chain(pool.chain_id));
    }

    if !rule.allowed_collections.is_empty() {
        let collection = pool.nft_collection.to_lowercase();
        if !rule
            .allowed_collections
            .iter()
            .any(|c| c.to_lowercase() == collection)
        {
            return Err(Mismatch::Collection(collection));
        }
    }

    if let Some(max) = rule.max_investment_per_day {
        let projected = invested_today + rule.investment_amount;
        if projected > max {
            return Err(Mismatch::DailyLimit { projected, max });
        }
    }

    Ok(())
}

pub fn rule_matches(
    rule: &AutoInvestmentRule,
    pool: &Pool,
    now: DateTime<Utc>,
    invested_today: f64,
) -> bool {
    check_rule(rule, pool, now, invested_today).is_ok()
}

/// Amount committed by a rule's investments created at or after `since`.
/// Failed attempts do not count.
pub fn invested_since(investments: &[AutoInvestment], since: DateTime<Utc>) -> f64 {
    investments
        .iter()
        .filter(|i| i.created_at >= since && i.status != AutoInvestmentStatus::Failed)
        .map(|i| i.amount)
        .sum()
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

fn wei_price(wei: &str) -> f64 {
    parse_wei(wei).map(wei_to_eth_f64).unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::{auto_invest::sample_rule, pools::sample_pool};
    use chrono::Duration;

    fn investment(amount: f64, status: AutoInvestmentStatus, age: Duration) -> AutoInvestment {
        AutoInvestment {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: "r1".into(),
            pool_id: uuid::Uuid::new_v4().to_string(),
            user_id: "u1".into(),
            amount,
            status,
            tx_hash: None,
            error: None,
            executed_at: None,
            created_at: Utc::now() - age,
        }
    }

    #[test]
    fn unconstrained_rule_matches_any_pool() {
        let rule = sample_rule("r1", "u1", "w1");
        assert!(rule_matches(&rule, &sample_pool("p1"), Utc::now(), 0.0));
    }

    #[test]
    fn price_and_fee_limits() {
        let pool = sample_pool("p1");
        let now = Utc::now();

        let mut rule = sample_rule("r1", "u1", "w1");
        rule.max_buy_price = Some(0.4);
        assert!(matches!(
            check_rule(&rule, &pool, now, 0.0),
            Err(Mismatch::BuyPriceTooHigh { .. })
        ));
        rule.max_buy_price = Some(0.5);
        assert!(rule_matches(&rule, &pool, now, 0.0));

        rule.min_sell_price = Some(0.9);
        assert!(matches!(
            check_rule(&rule, &pool, now, 0.0),
            Err(Mismatch::SellPriceTooLow { .. })
        ));
        rule.min_sell_price = Some(0.8);

        rule.max_creator_fee = Some(2.0);
        assert!(matches!(
            check_rule(&rule, &pool, now, 0.0),
            Err(Mismatch::CreatorFeeTooHigh { .. })
        ));
        rule.max_creator_fee = Some(2.5);
        assert!(rule_matches(&rule, &pool, now, 0.0));
    }

    #[test]
    fn minimum_pool_age() {
        let pool = sample_pool("p1");
        let mut rule = sample_rule("r1", "u1", "w1");
        rule.min_pool_age_minutes = Some(10);

        assert!(!rule_matches(&rule, &pool, pool.created_at + Duration::minutes(5), 0.0));
        assert!(rule_matches(&rule, &pool, pool.created_at + Duration::minutes(10), 0.0));
    }

    #[test]
    fn list_filters_and_collection_case() {
        let pool = sample_pool("p1");
        let now = Utc::now();
        let mut rule = sample_rule("r1", "u1", "w1");

        rule.pool_types = vec!["trait".into()];
        assert_eq!(
            check_rule(&rule, &pool, now, 0.0),
            Err(Mismatch::PoolType("floor".into()))
        );
        rule.pool_types = vec!["floor".into(), "trait".into()];

        rule.chains = vec![360];
        assert_eq!(check_rule(&rule, &pool, now, 0.0), Err(Mismatch::Chain(11011)));
        rule.chains = vec![11011];

        rule.allowed_collections = vec!["0x00000000000000000000000000000000000000CC".into()];
        assert!(rule_matches(&rule, &pool, now, 0.0));
        rule.allowed_collections = vec!["0x00000000000000000000000000000000000000dd".into()];
        assert!(matches!(
            check_rule(&rule, &pool, now, 0.0),
            Err(Mismatch::Collection(_))
        ));
    }

    #[test]
    fn daily_limit_counts_pending_and_completed_only() {
        let pool = sample_pool("p1");
        let now = Utc::now();
        let mut rule = sample_rule("r1", "u1", "w1");
        rule.investment_amount = 0.1;
        rule.max_investment_per_day = Some(0.25);

        let history = vec![
            investment(0.1, AutoInvestmentStatus::Completed, Duration::zero()),
            investment(0.1, AutoInvestmentStatus::Failed, Duration::zero()),
            investment(0.1, AutoInvestmentStatus::Completed, Duration::days(2)),
        ];
        let today = invested_since(&history, start_of_day(now));
        assert!((today - 0.1).abs() < 1e-9);
        assert!(rule_matches(&rule, &pool, now, today));

        let with_pending = today + 0.1;
        assert!(matches!(
            check_rule(&rule, &pool, now, with_pending),
            Err(Mismatch::DailyLimit { .. })
        ));
    }
}
