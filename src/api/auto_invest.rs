// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auto-investment endpoints: rule management, the background scheduler
//! and manual monitoring cycles.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    auto_invest::{CycleOutcome, CycleReport, MonitoringStats, RuleView, SchedulerStatus},
    error::ApiError,
    models::{CreateRuleRequest, SchedulerAction, SchedulerCommand, UpdateRuleRequest},
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct RuleListResponse {
    pub success: bool,
    pub rules: Vec<RuleView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RuleResponse {
    pub success: bool,
    pub rule: RuleView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SchedulerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub scheduler: SchedulerStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonitorStatsResponse {
    pub success: bool,
    pub stats: MonitoringStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonitorCycleResponse {
    pub success: bool,
    pub message: String,
    pub report: CycleReport,
    pub stats: MonitoringStats,
}

/// Rules of the signed-in user, with wallet and investment history.
#[utoipa::path(
    get,
    path = "/api/auto-invest/rules",
    tag = "Auto-invest",
    security(("session" = [])),
    responses(
        (status = 200, description = "Rules, newest first", body = RuleListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_rules(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<RuleListResponse>, ApiError> {
    let rules = state.rules.list_rules(&user.user_id)?;
    Ok(Json(RuleListResponse {
        success: true,
        rules,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auto-invest/rules",
    tag = "Auto-invest",
    security(("session" = [])),
    request_body = CreateRuleRequest,
    responses(
        (status = 201, description = "Rule created", body = RuleResponse),
        (status = 400, description = "Missing fields or foreign wallet"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_rule(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), ApiError> {
    let rule = state.rules.create_rule(&user.user_id, request)?;
    Ok((
        StatusCode::CREATED,
        Json(RuleResponse {
            success: true,
            rule,
        }),
    ))
}

/// Partially update a rule. `null` clears an optional limit.
#[utoipa::path(
    patch,
    path = "/api/auto-invest/rules/{rule_id}",
    tag = "Auto-invest",
    security(("session" = [])),
    params(("rule_id" = String, Path, description = "Rule id")),
    request_body = UpdateRuleRequest,
    responses(
        (status = 200, description = "Updated rule", body = RuleResponse),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Rule not found or doesn't belong to user")
    )
)]
pub async fn update_rule(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Json(patch): Json<UpdateRuleRequest>,
) -> Result<Json<RuleResponse>, ApiError> {
    let rule = state.rules.update_rule(&user.user_id, &rule_id, patch)?;
    Ok(Json(RuleResponse {
        success: true,
        rule,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/auto-invest/rules/{rule_id}",
    tag = "Auto-invest",
    security(("session" = [])),
    params(("rule_id" = String, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Rule deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Rule not found or doesn't belong to user")
    )
)]
pub async fn delete_rule(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.rules.delete_rule(&user.user_id, &rule_id)?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Auto-investment rule deleted successfully".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/auto-invest/scheduler",
    tag = "Auto-invest",
    security(("session" = [])),
    responses(
        (status = 200, description = "Scheduler status", body = SchedulerResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn scheduler_status(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Json<SchedulerResponse> {
    Json(SchedulerResponse {
        success: true,
        message: None,
        scheduler: state.scheduler.status().await,
    })
}

/// Start or stop the background scheduler. Both actions are idempotent.
#[utoipa::path(
    post,
    path = "/api/auto-invest/scheduler",
    tag = "Auto-invest",
    security(("session" = [])),
    request_body = SchedulerCommand,
    responses(
        (status = 200, description = "Scheduler status after the action", body = SchedulerResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn control_scheduler(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(command): Json<SchedulerCommand>,
) -> Json<SchedulerResponse> {
    let message = match command.action {
        SchedulerAction::Start => {
            let interval = command.interval_secs.map(Duration::from_secs);
            if state.scheduler.start(interval).await {
                "Scheduler started successfully"
            } else {
                "Scheduler is already running"
            }
        }
        SchedulerAction::Stop => {
            if state.scheduler.stop().await {
                "Scheduler stopped successfully"
            } else {
                "Scheduler is not running"
            }
        }
    };
    tracing::info!(user_id = %user.user_id, action = ?command.action, "Scheduler control");

    Json(SchedulerResponse {
        success: true,
        message: Some(message.to_string()),
        scheduler: state.scheduler.status().await,
    })
}

#[utoipa::path(
    get,
    path = "/api/auto-invest/monitor",
    tag = "Auto-invest",
    security(("session" = [])),
    responses(
        (status = 200, description = "Monitoring statistics", body = MonitorStatsResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn monitor_stats(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<MonitorStatsResponse>, ApiError> {
    let stats = state.monitor().monitoring_stats()?;
    Ok(Json(MonitorStatsResponse {
        success: true,
        stats,
    }))
}

/// Run one monitoring cycle now.
#[utoipa::path(
    post,
    path = "/api/auto-invest/monitor",
    tag = "Auto-invest",
    security(("session" = [])),
    responses(
        (status = 200, description = "Cycle report", body = MonitorCycleResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A cycle is already running")
    )
)]
pub async fn run_monitor(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<MonitorCycleResponse>, ApiError> {
    let monitor = state.monitor();
    let report = match monitor.run_cycle().await? {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped => {
            return Err(ApiError::conflict("A monitoring cycle is already running"))
        }
    };

    Ok(Json(MonitorCycleResponse {
        success: true,
        message: "Monitoring cycle completed".to_string(),
        report,
        stats: monitor.monitoring_stats()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionUser;
    use crate::blockchain::{parse_address, units::parse_ether};
    use crate::pools::RegisterPool;
    use crate::state::test_support::{test_app, TestApp};
    use crate::storage::ManagedWallet;

    fn rule_request(wallet: &ManagedWallet) -> CreateRuleRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Cheap floors",
            "walletId": wallet.id,
            "investmentAmount": "0.05",
            "maxBuyPrice": 1,
            "allowedCollections": ["0x00000000000000000000000000000000000000CC"],
        }))
        .unwrap()
    }

    fn funded_wallet(app: &TestApp, session: &SessionUser) -> ManagedWallet {
        let wallet = app
            .state
            .custody
            .create_managed_wallet(&session.user_id, None)
            .unwrap();
        app.sepolia.set_balance(
            parse_address(&wallet.address).unwrap(),
            parse_ether("1").unwrap(),
        );
        wallet
    }

    #[tokio::test]
    async fn rule_crud_round() {
        let app = test_app();
        let session = app.sign_in("0x00000000000000000000000000000000000000f1");
        let wallet = funded_wallet(&app, &session);

        let (status, Json(created)) = create_rule(
            Auth(session.clone()),
            State(app.state.clone()),
            Json(rule_request(&wallet)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.rule.rule.allowed_collections, vec![
            "0x00000000000000000000000000000000000000cc".to_string()
        ]);

        let rule_id = created.rule.rule.id.clone();
        let Json(updated) = update_rule(
            Auth(session.clone()),
            State(app.state.clone()),
            Path(rule_id.clone()),
            Json(serde_json::from_value(serde_json::json!({ "isActive": false })).unwrap()),
        )
        .await
        .unwrap();
        assert!(!updated.rule.rule.is_active);

        let Json(list) = list_rules(Auth(session.clone()), State(app.state.clone()))
            .await
            .unwrap();
        assert_eq!(list.rules.len(), 1);

        delete_rule(Auth(session.clone()), State(app.state.clone()), Path(rule_id.clone()))
            .await
            .unwrap();
        let err = delete_rule(Auth(session), State(app.state.clone()), Path(rule_id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scheduler_start_and_stop_are_idempotent() {
        let app = test_app();
        let session = app.sign_in("0x00000000000000000000000000000000000000f2");
        let command = |action| {
            Json(SchedulerCommand {
                action,
                interval_secs: Some(30),
            })
        };

        let Json(started) = control_scheduler(
            Auth(session.clone()),
            State(app.state.clone()),
            command(SchedulerAction::Start),
        )
        .await;
        assert!(started.scheduler.is_running);
        assert_eq!(started.scheduler.interval_secs, 30);

        let Json(again) = control_scheduler(
            Auth(session.clone()),
            State(app.state.clone()),
            command(SchedulerAction::Start),
        )
        .await;
        assert_eq!(again.message.as_deref(), Some("Scheduler is already running"));

        let Json(stopped) = control_scheduler(
            Auth(session.clone()),
            State(app.state.clone()),
            command(SchedulerAction::Stop),
        )
        .await;
        assert!(!stopped.scheduler.is_running);

        let Json(status) = scheduler_status(Auth(session), State(app.state.clone())).await;
        assert!(!status.scheduler.is_running);
        app.state.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn manual_cycle_invests_into_matching_pool() {
        let app = test_app();
        let session = app.sign_in("0x00000000000000000000000000000000000000f3");
        let wallet = funded_wallet(&app, &session);
        create_rule(
            Auth(session.clone()),
            State(app.state.clone()),
            Json(rule_request(&wallet)),
        )
        .await
        .unwrap();
        app.state
            .pools
            .register_pool(
                &session.user_id,
                RegisterPool {
                    name: "Fresh pool".into(),
                    pool_address: "0x00000000000000000000000000000000000000e9".into(),
                    nft_collection: "0x00000000000000000000000000000000000000cc".into(),
                    chain_id: None,
                    pool_type: "floor".into(),
                    buy_price: "0.5".into(),
                    sell_price: "0.8".into(),
                    creator_fee: 1.0,
                    status: None,
                },
            )
            .unwrap();

        let Json(cycle) = run_monitor(Auth(session.clone()), State(app.state.clone()))
            .await
            .unwrap();
        assert_eq!(cycle.report.completed, 1);
        assert_eq!(cycle.stats.total_investments, 1);

        let Json(second) = run_monitor(Auth(session.clone()), State(app.state.clone()))
            .await
            .unwrap();
        assert_eq!(second.report.attempted, 0);

        let Json(stats) = monitor_stats(Auth(session), State(app.state.clone()))
            .await
            .unwrap();
        assert_eq!(stats.stats.active_rules, 1);
        assert!((stats.stats.total_invested_amount - 0.05).abs() < 1e-9);
    }
}
