// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::handlers::{
    benchmark_status_handler, benchmark_trigger_handler, catalog_handler, frame_handler,
    log_start_handler, log_status_handler, log_stop_handler, overview_handler, reset_handler,
    selection_handler, visibility_handler, SharedState,
};
use crate::app_state::AppState;
use crate::benchmark::HostBenchmarks;
use crate::cli::ServeArgs;
use crate::device::{get_device_reader, get_host_reader};
use crate::error::{Error, Result};
use crate::utils::get_hostname;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/frame", get(frame_handler))
        .route("/overview", get(overview_handler))
        .route("/metrics/catalog", get(catalog_handler))
        .route("/metrics/{key}/visibility", put(visibility_handler))
        .route("/selection", put(selection_handler))
        .route("/log", get(log_status_handler))
        .route("/log/start", post(log_start_handler))
        .route("/log/stop", post(log_stop_handler))
        .route(
            "/benchmarks/{kind}",
            get(benchmark_status_handler).post(benchmark_trigger_handler),
        )
        .route("/reset", post(reset_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Refresh the published frame every `interval` until shutdown.
pub fn spawn_refresh_loop(
    state: SharedState,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    state.refresh().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Refresh loop stopped");
    })
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown requested");
}

/// Run the sampler, the refresh loop and the HTTP API until shutdown.
pub async fn run_server(args: &ServeArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;

    let device_reader = get_device_reader(config.mock_devices)
        .map_err(|e| Error::PlatformInit(e.to_string()))?;
    let state: SharedState = Arc::new(AppState::new(
        config.clone(),
        device_reader,
        Arc::new(HostBenchmarks),
        get_hostname(),
    )?);

    if config.log_on_start {
        state.start_logging(None)?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler = state.sampler(get_host_reader()).spawn();
    let refresh = spawn_refresh_loop(state.clone(), config.refresh_interval, shutdown_rx);

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    match listener.local_addr() {
        Ok(addr) => tracing::info!("API server listening on {addr}"),
        Err(e) => tracing::warn!("API server listening on an unknown address: {e}"),
    }

    let served = axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &served {
        tracing::error!("API server error: {e}");
    }

    let _ = shutdown_tx.send(true);
    sampler.shutdown().await;
    if let Err(e) = refresh.await {
        tracing::error!("Refresh task ended abnormally: {e}");
    }
    state.runner.cancel_all();
    state.stop_logging()?;

    served.map_err(Error::from)
}
