// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auto-investment Scheduler
//!
//! Background task that runs a [`PoolMonitor`] cycle immediately on start and
//! then once per interval.
//!
//! ## Shutdown
//!
//! Each run owns a `tokio_util::sync::CancellationToken`. [`stop`] cancels it;
//! the task exits at its next wait point and never interrupts a cycle midway.
//!
//! [`stop`]: AutoInvestScheduler::stop

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::monitor::{CycleOutcome, PoolMonitor};

/// Default interval between monitoring cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub interval_secs: u64,
    pub cycle_in_progress: bool,
}

struct Running {
    interval: Duration,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct AutoInvestScheduler {
    monitor: Arc<PoolMonitor>,
    default_interval: Duration,
    running: Mutex<Option<Running>>,
}

impl AutoInvestScheduler {
    pub fn new(monitor: Arc<PoolMonitor>, default_interval: Duration) -> Self {
        Self {
            monitor,
            default_interval,
            running: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> &Arc<PoolMonitor> {
        &self.monitor
    }

    /// Start the background task. Returns `false` if it was already running.
    pub async fn start(&self, interval: Option<Duration>) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            info!("Auto-investment scheduler is already running");
            return false;
        }

        let interval = interval
            .filter(|i| !i.is_zero())
            .unwrap_or(self.default_interval);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(self.monitor.clone(), interval, shutdown.clone()));

        info!(interval_secs = interval.as_secs(), "Auto-investment scheduler started");
        *running = Some(Running {
            interval,
            shutdown,
            handle,
        });
        true
    }

    /// Stop the background task. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        match self.running.lock().await.take() {
            Some(running) => {
                running.shutdown.cancel();
                info!("Auto-investment scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Stop and wait for an in-flight cycle to finish.
    pub async fn shutdown(&self) {
        if let Some(running) = self.running.lock().await.take() {
            running.shutdown.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "Auto-investment scheduler task failed");
            }
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self.running.lock().await;
        let active = running.as_ref().filter(|r| !r.handle.is_finished());
        SchedulerStatus {
            is_running: active.is_some(),
            interval_secs: active
                .map(|r| r.interval)
                .unwrap_or(self.default_interval)
                .as_secs(),
            cycle_in_progress: self.monitor.is_cycle_in_progress(),
        }
    }
}

async fn run(monitor: Arc<PoolMonitor>, interval: Duration, shutdown: CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        match monitor.run_cycle().await {
            Ok(CycleOutcome::Completed(_)) => {}
            Ok(CycleOutcome::Skipped) => info!("Previous monitoring cycle still running"),
            Err(e) => warn!(error = %e, "Scheduled monitoring cycle failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown.cancelled() => return,
        }
    }
}
