// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{Credentials, OwnershipChallenge},
    auto_invest::{CycleReport, MonitoringStats, RuleView, SchedulerStatus},
    blockchain::{TransactionResult, TxOutcome},
    custody::{BalanceSnapshot, GasQuote},
    models::{
        CreateRuleRequest, CreateWalletRequest, InvestBody, SchedulerAction, SchedulerCommand,
        SendTransactionRequest, SignMessageRequest, UpdateRuleRequest, UpdateWalletRequest,
        WithdrawBody,
    },
    pools::{PoolDetails, PoolStats, RegisterPool},
    state::AppState,
    storage::{
        AutoInvestment, AutoInvestmentRule, AutoInvestmentStatus, Pool, PoolStatus,
        TransactionKind, TransactionRecord, User, WalletBalance, WalletResponse,
    },
};

pub mod auth;
pub mod auto_invest;
pub mod balance;
pub mod health;
pub mod pools;
pub mod transactions;
pub mod users;
pub mod wallets;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Sign-in
        .route("/auth/challenge", get(auth::challenge))
        .route(
            "/auth/session",
            post(auth::create_session).delete(auth::end_session),
        )
        // Users
        .route("/users", get(users::find_user))
        .route("/users/create", post(users::create_user))
        .route("/users/me", get(users::get_current_user))
        // Managed wallets
        .route(
            "/wallets",
            get(wallets::list_wallets).post(wallets::create_wallet),
        )
        .route("/wallets/withdraw", post(wallets::withdraw))
        .route(
            "/wallets/{wallet_id}",
            get(wallets::get_wallet)
                .put(wallets::update_wallet)
                .delete(wallets::delete_wallet),
        )
        .route("/wallets/{wallet_id}/history", get(wallets::wallet_history))
        .route("/wallets/{wallet_id}/sign", post(wallets::sign_message))
        .route(
            "/wallets/{wallet_id}/transactions",
            get(transactions::estimate_transaction).post(transactions::send_transaction),
        )
        .route(
            "/wallets/{wallet_id}/balance",
            get(balance::get_balance).post(balance::sync_balance),
        )
        // Pools
        .route(
            "/pools",
            get(pools::list_pools).post(pools::register_pool),
        )
        .route("/pools/mine", get(pools::my_pools))
        .route("/pools/collection/{address}", get(pools::collection_pools))
        .route("/pools/{identifier}", get(pools::get_pool))
        .route("/pool/invest", post(pools::invest))
        // Auto-investment
        .route(
            "/auto-invest/rules",
            get(auto_invest::list_rules).post(auto_invest::create_rule),
        )
        .route(
            "/auto-invest/rules/{rule_id}",
            axum::routing::put(auto_invest::update_rule)
                .patch(auto_invest::update_rule)
                .delete(auto_invest::delete_rule),
        )
        .route(
            "/auto-invest/scheduler",
            get(auto_invest::scheduler_status).post(auto_invest::control_scheduler),
        )
        .route(
            "/auto-invest/monitor",
            get(auto_invest::monitor_stats).post(auto_invest::run_monitor),
        );

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SessionSecurity;

impl Modify for SessionSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from POST /api/auth/session, or the wallet_session cookie",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::challenge,
        auth::create_session,
        auth::end_session,
        users::create_user,
        users::find_user,
        users::get_current_user,
        wallets::create_wallet,
        wallets::list_wallets,
        wallets::get_wallet,
        wallets::update_wallet,
        wallets::delete_wallet,
        wallets::withdraw,
        wallets::wallet_history,
        wallets::sign_message,
        transactions::estimate_transaction,
        transactions::send_transaction,
        balance::get_balance,
        balance::sync_balance,
        pools::list_pools,
        pools::register_pool,
        pools::my_pools,
        pools::collection_pools,
        pools::get_pool,
        pools::invest,
        auto_invest::list_rules,
        auto_invest::create_rule,
        auto_invest::update_rule,
        auto_invest::delete_rule,
        auto_invest::scheduler_status,
        auto_invest::control_scheduler,
        auto_invest::monitor_stats,
        auto_invest::run_monitor
    ),
    components(
        schemas(
            OwnershipChallenge,
            Credentials,
            User,
            WalletResponse,
            WalletBalance,
            CreateWalletRequest,
            UpdateWalletRequest,
            WithdrawBody,
            SignMessageRequest,
            SendTransactionRequest,
            TransactionResult,
            TxOutcome,
            TransactionRecord,
            TransactionKind,
            BalanceSnapshot,
            GasQuote,
            Pool,
            PoolStatus,
            PoolDetails,
            PoolStats,
            RegisterPool,
            InvestBody,
            AutoInvestmentRule,
            AutoInvestment,
            AutoInvestmentStatus,
            RuleView,
            CreateRuleRequest,
            UpdateRuleRequest,
            SchedulerAction,
            SchedulerCommand,
            SchedulerStatus,
            CycleReport,
            MonitoringStats
        )
    ),
    modifiers(&SessionSecurity),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Wallet-ownership sign-in"),
        (name = "Users", description = "User accounts keyed by wallet address"),
        (name = "Wallets", description = "Managed wallet lifecycle"),
        (name = "Transactions", description = "Raw transactions from managed wallets"),
        (name = "Balance", description = "Cached on-chain balances"),
        (name = "Pools", description = "Pool registry and investment"),
        (name = "Auto-invest", description = "Investment rules and the background monitor")
    )
)]
pub struct ApiDoc;
