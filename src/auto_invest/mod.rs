// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rule-driven investment into newly created pools.
//!
//! - [`rules`]: the matching predicate
//! - [`service`]: rule management for the owning user
//! - [`monitor`]: one matching-and-investing cycle
//! - [`scheduler`]: runs the monitor periodically in the background

pub mod monitor;
pub mod rules;
pub mod scheduler;
pub mod service;

pub use monitor::{CycleOutcome, CycleReport, MonitoringStats, PoolMonitor};
pub use rules::{check_rule, rule_matches, Mismatch};
pub use scheduler::{AutoInvestScheduler, SchedulerStatus};
pub use service::{AutoInvestError, RuleService, RuleView};
