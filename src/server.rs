//! HTTP entry point that triggers a labeling run

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::{LabelerError, Result};
use crate::workflow::LabelingRun;

/// Body returned after a completed run
pub const SUCCESS_MESSAGE: &str = "Email labeling process initiated.";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessBody {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Clone)]
pub struct AppState {
    runner: Arc<dyn LabelingRun>,
    // One run at a time, so overlapping requests cannot create the same label twice
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(runner: Arc<dyn LabelingRun>) -> Self {
        Self {
            runner,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub fn router(state: AppState, route: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(route, get(trigger_labeling).post(trigger_labeling))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Runs the workflow to completion, then reports success or a caller-safe error
pub async fn trigger_labeling(State(state): State<AppState>) -> Response {
    let _guard = state.run_lock.lock().await;

    // A panic inside the run must still produce a response
    let runner = Arc::clone(&state.runner);
    let result = match tokio::spawn(async move { runner.run_once().await }).await {
        Ok(result) => result,
        Err(e) => Err(LabelerError::UnhandledRunError(e.to_string())),
    };

    match result {
        Ok(summary) => {
            info!(
                "Run {} finished: {} labeled, {} skipped, {} failed",
                summary.run_id,
                summary.messages_labeled,
                summary.messages_skipped,
                summary.messages_failed
            );
            (
                StatusCode::OK,
                Json(SuccessBody {
                    message: SUCCESS_MESSAGE.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Error in labeling route: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.public_message().to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Bind the listener for the configured host name or address
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            LabelerError::ConfigError(format!(
                "cannot listen on {}:{}: {}",
                config.host, config.port, e
            ))
        })
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let listener = bind(config).await?;
    let app = router(state, &config.route);
    info!("Listening on http://{}{}", listener.local_addr()?, config.route);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
