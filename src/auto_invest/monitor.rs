// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Pool Monitor
//!
//! One monitoring cycle matches every active rule against pools that opened
//! for funding recently and invests into each match.
//!
//! ## Cycle
//!
//! 1. Load active rules and `FUNDING` pools created within [`RECENT_POOL_WINDOW`].
//! 2. For each (rule, pool) pair not attempted before, evaluate
//!    [`check_rule`](super::rules::check_rule) with the rule's spend so far today.
//! 3. Claim the pair by recording a `PROCESSING` investment. The pair key is
//!    unique, so a pair is attempted at most once.
//! 4. Invest through [`PoolService::invest_with`]. The investment is marked
//!    `COMPLETED` and the rule statistics are bumped in the same write
//!    transaction that records the deposit. Any failure marks it `FAILED`.
//!
//! Only one cycle runs at a time; a concurrent call returns
//! [`CycleOutcome::Skipped`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::rules::{check_rule, invested_since, start_of_day};
use crate::custody::CustodyError;
use crate::pools::{InvestRequest, PoolError, PoolService};
use crate::storage::{
    AuditEvent, AuditEventType, AutoInvestRepository, AutoInvestment, AutoInvestmentRule,
    AutoInvestmentStatus, Pool, PoolRepository, PoolStatus, StorageError, StorageResult, Store,
};

/// Pools older than this are no longer considered.
pub const RECENT_POOL_WINDOW: Duration = Duration::minutes(30);

/// Summary of one monitoring cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub active_rules: usize,
    pub recent_pools: usize,
    /// Pairs that matched and were attempted in this cycle
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was already running.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStats {
    pub active_rules: usize,
    /// Completed auto-investments
    pub total_investments: usize,
    /// Sum of completed auto-investments, in ETH
    pub total_invested_amount: f64,
}

pub struct PoolMonitor {
    store: Arc<Store>,
    pools: PoolService,
    cycle_in_progress: AtomicBool,
}

/// Clears the in-progress flag when the cycle ends, including on panic or
/// when the cycle future is dropped.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PoolMonitor {
    pub fn new(store: Arc<Store>, pools: PoolService) -> Self {
        Self {
            store,
            pools,
            cycle_in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_cycle_in_progress(&self) -> bool {
        self.cycle_in_progress.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<CycleGuard<'_>> {
        self.cycle_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard(&self.cycle_in_progress))
    }

    pub async fn run_cycle(&self) -> StorageResult<CycleOutcome> {
        let Some(_guard) = self.try_begin() else {
            info!("Pool monitoring already running, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let now = Utc::now();
        let (rules, pools) = self.store.read(|txn| {
            let rules = AutoInvestRepository::new(txn).list_active_rules()?;
            let mut pools = PoolRepository::new(txn).list(Some(PoolStatus::Funding))?;
            pools.retain(|p| p.created_at >= now - RECENT_POOL_WINDOW);
            Ok((rules, pools))
        })?;

        let mut report = CycleReport {
            active_rules: rules.len(),
            recent_pools: pools.len(),
            ..CycleReport::default()
        };
        if rules.is_empty() || pools.is_empty() {
            debug!(
                active_rules = report.active_rules,
                recent_pools = report.recent_pools,
                "Nothing to monitor"
            );
            return Ok(CycleOutcome::Completed(report));
        }

        info!(
            active_rules = report.active_rules,
            recent_pools = report.recent_pools,
            "Starting auto-investment monitoring cycle"
        );

        for rule in &rules {
            for pool in &pools {
                match self.process_pair(rule, pool).await {
                    Ok(None) => {}
                    Ok(Some(true)) => {
                        report.attempted += 1;
                        report.completed += 1;
                    }
                    Ok(Some(false)) => {
                        report.attempted += 1;
                        report.failed += 1;
                    }
                    Err(e) => warn!(
                        rule_id = %rule.id,
                        pool_id = %pool.id,
                        error = %e,
                        "Error processing pool against rule"
                    ),
                }
            }
        }

        info!(
            attempted = report.attempted,
            completed = report.completed,
            failed = report.failed,
            "Auto-investment monitoring cycle completed"
        );
        Ok(CycleOutcome::Completed(report))
    }

    /// `None` when the pair was skipped, otherwise whether the investment
    /// succeeded.
    async fn process_pair(
        &self,
        rule: &AutoInvestmentRule,
        pool: &Pool,
    ) -> StorageResult<Option<bool>> {
        let now = Utc::now();
        let history = self.store.read(|txn| {
            let repo = AutoInvestRepository::new(txn);
            if repo.get_investment(&rule.id, &pool.id)?.is_some() {
                return Ok(None);
            }
            repo.list_investments_for_rule(&rule.id).map(Some)
        })?;
        let Some(history) = history else {
            return Ok(None);
        };

        let invested_today = invested_since(&history, start_of_day(now));
        if let Err(mismatch) = check_rule(rule, pool, now, invested_today) {
            debug!(rule_id = %rule.id, pool_id = %pool.id, %mismatch, "Pool does not match rule");
            return Ok(None);
        }

        let claim = AutoInvestment {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            pool_id: pool.id.clone(),
            user_id: rule.user_id.clone(),
            amount: rule.investment_amount,
            status: AutoInvestmentStatus::Processing,
            tx_hash: None,
            error: None,
            executed_at: None,
            created_at: now,
        };
        let row = claim.clone();
        match self
            .store
            .write_blocking(move |txn| AutoInvestRepository::new(txn).insert_investment(&row))
            .await
        {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => return Ok(None),
            Err(e) => return Err(e),
        }

        info!(
            rule_id = %rule.id,
            pool_id = %pool.id,
            amount_eth = rule.investment_amount,
            "Executing auto-investment"
        );

        let request = InvestRequest {
            user_id: rule.user_id.clone(),
            wallet: Some(rule.wallet_id.clone()),
            pool_id: pool.id.clone(),
            amount: rule.investment_amount.to_string(),
            chain_id: Some(pool.chain_id),
        };
        let completed = claim.clone();
        let result = self
            .pools
            .invest_with(request, move |txn, record| {
                let repo = AutoInvestRepository::new(txn);
                let mut investment = completed;
                investment.status = AutoInvestmentStatus::Completed;
                investment.tx_hash = Some(record.tx_hash.clone());
                investment.executed_at = Some(record.created_at);
                repo.update_investment(&investment)?;

                if let Some(mut rule) = repo.get_rule(&investment.rule_id)? {
                    rule.total_invested += investment.amount;
                    rule.total_investments += 1;
                    rule.last_triggered = Some(record.created_at);
                    repo.update_rule(&rule)?;
                }
                Ok::<_, PoolError>(())
            })
            .await;

        match result {
            Ok(investment) => {
                info!(
                    rule_id = %rule.id,
                    pool_id = %pool.id,
                    tx_hash = %investment.record.tx_hash,
                    "Auto-investment completed"
                );
                AuditEvent::new(AuditEventType::AutoInvestmentExecuted)
                    .with_user(&rule.user_id)
                    .with_resource("auto_investment", &claim.id)
                    .with_details(serde_json::json!({
                        "rule_id": rule.id,
                        "pool_id": pool.id,
                        "tx_hash": investment.record.tx_hash,
                    }))
                    .record(&self.store);
                Ok(Some(true))
            }
            Err(e) => {
                warn!(rule_id = %rule.id, pool_id = %pool.id, error = %e, "Auto-investment failed");
                let mut failed = claim;
                failed.status = AutoInvestmentStatus::Failed;
                failed.error = Some(e.to_string());
                if let PoolError::Custody(CustodyError::Unconfirmed { hash, .. }) = &e {
                    failed.tx_hash = Some(hash.clone());
                }
                let failed = self
                    .store
                    .write_blocking(move |txn| {
                        AutoInvestRepository::new(txn).update_investment(&failed)?;
                        Ok::<_, StorageError>(failed)
                    })
                    .await?;
                AuditEvent::new(AuditEventType::AutoInvestmentExecuted)
                    .with_user(&rule.user_id)
                    .with_resource("auto_investment", &failed.id)
                    .failed(e.to_string())
                    .record(&self.store);
                Ok(Some(false))
            }
        }
    }

    pub fn monitoring_stats(&self) -> StorageResult<MonitoringStats> {
        self.store.read(|txn| {
            let repo = AutoInvestRepository::new(txn);
            let active_rules = repo.list_active_rules()?.len();
            let completed: Vec<AutoInvestment> = repo
                .list_investments()?
                .into_iter()
                .filter(|i| i.status == AutoInvestmentStatus::Completed)
                .collect();
            Ok(MonitoringStats {
                active_rules,
                total_investments: completed.len(),
                total_invested_amount: completed.iter().map(|i| i.amount).sum(),
            })
        })
    }
}
