// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pool_custody_server::{
    api::router,
    config::{AppConfig, LogFormat},
    state::{rpc_chains, AppState},
    storage::Store,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    info!(?config, "Starting pool custody server");

    if !config.enforce_replay {
        warn!("Proof replay enforcement is disabled; signed ownership messages never expire and nonces are not checked");
    }
    if config.wallet_encryption_key.is_none() {
        warn!("WALLET_ENCRYPTION_KEY is not set; wallet creation and signing are unavailable");
    }

    let store = Arc::new(Store::open(&config.database_path())?);
    let chains = rpc_chains(&config)?;
    let state = AppState::new(store, &config, chains);

    if config.auto_invest_enabled {
        state.scheduler.start(None).await;
    }

    let scheduler = state.scheduler.clone();
    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    match &config.tls {
        Some((cert, key)) => {
            // Must be installed before any TLS configuration is built
            if rustls::crypto::ring::default_provider()
                .install_default()
                .is_err()
            {
                warn!("A rustls crypto provider was already installed");
            }
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            info!(%addr, "Listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, "Listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    scheduler.shutdown().await;
    info!("Server stopped");
    Ok(())
}
