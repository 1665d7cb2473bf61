// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `adsd` — the Agent Dispatch Server.

use std::sync::Arc;

use ads_daemon::project::{ProjectRegistry, RegistryConfig};
use ads_daemon::ws::{AppState, NoopSearch};
use ads_daemon::{broadcast::BroadcastBus, env, http, lifecycle};
use ads_exec::WorkspaceLocks;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn main() -> std::process::ExitCode {
    let _log_guard = lifecycle::init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let state_dir = env::state_dir();
    let _pid_file = lifecycle::PidFile::acquire(&state_dir)?;

    let shutdown = CancellationToken::new();
    let bus = Arc::new(BroadcastBus::new());
    let config = RegistryConfig {
        state_dir: state_dir.clone(),
        allowed_dirs: env::allowed_dirs(),
        queue_enabled: env::task_queue_enabled(),
        queue_auto_start: env::task_queue_auto_start(),
        default_model: env::task_queue_default_model(),
        plan_model: env::task_queue_plan_model(),
        notify_timezone: env::notify_timezone(),
    };
    let registry = Arc::new(ProjectRegistry::new(
        config,
        WorkspaceLocks::new(),
        Arc::clone(&bus),
        shutdown.clone(),
    ));

    let app = Arc::new(AppState {
        registry,
        bus,
        auth_token: env::auth_token(),
        max_clients: env::max_clients(),
        allowed_origins: env::allowed_origins(),
        ping_interval: env::ws_ping_interval(),
        max_missed_pongs: env::ws_max_missed_pongs(),
        explored_enabled: env::explored_enabled(),
        explored_max_items: env::explored_max_items(),
        explored_dedupe: env::explored_dedupe(),
        search: Arc::new(NoopSearch),
        shutdown: shutdown.clone(),
    });

    let addr = format!("{}:{}", env::web_host(), env::web_port());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, state_dir = %state_dir.display(), "adsd listening");

    let router = http::router(Arc::clone(&app));
    let signal_token = shutdown.clone();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        lifecycle::wait_for_shutdown(signal_token).await;
    });

    let drain = env::drain_timeout();
    tokio::select! {
        result = server => result?,
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(drain).await;
        } => {
            info!("drain timeout elapsed; exiting");
        }
    }

    // Fold each opened store's WAL into a snapshot before exit.
    for project in app.registry.opened() {
        if let Err(e) = project.store.snapshot_now() {
            error!(project = %project.project_id, error = %e, "shutdown snapshot failed");
        }
    }
    info!("adsd stopped");
    Ok(())
}
