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

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::benchmark::{max_problem_size, BenchmarkKind, BenchmarkParams, JobSnapshot, TriggerOutcome};
use crate::device::Overview;
use crate::error::Error;
use crate::metrics::MetricDescriptor;
use crate::recorder::LogStatus;
use crate::utils::available_memory_bytes;
use crate::view::{Frame, SelectionUpdate};

pub type SharedState = Arc<AppState>;

/// Error body `{"error": "..."}` with a status derived from the crate error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::UnknownMetric(_) => StatusCode::NOT_FOUND,
            Error::Parse(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::LogNotOpen => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub async fn frame_handler(State(state): State<SharedState>) -> Json<Frame> {
    Json(state.frame.read().await.clone())
}

pub async fn overview_handler(State(state): State<SharedState>) -> Json<Overview> {
    Json(state.overview())
}

pub async fn catalog_handler(State(state): State<SharedState>) -> Json<Vec<MetricDescriptor>> {
    Json(state.display.lock().await.catalog().descriptors().to_vec())
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub devices: String,
}

pub async fn selection_handler(
    State(state): State<SharedState>,
    Json(request): Json<SelectionRequest>,
) -> Json<serde_json::Value> {
    let update = state.display.lock().await.set_selection(&request.devices);
    match update {
        SelectionUpdate::Invalid => Json(json!({ "selection": "Invalid" })),
        SelectionUpdate::Updated(devices) => {
            // Redraw right away instead of waiting for the refresh timer.
            state.refresh().await;
            Json(json!({ "selection": devices }))
        }
        SelectionUpdate::Unchanged => {
            Json(json!({ "selection": state.display.lock().await.selection() }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

pub async fn visibility_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(request): Json<VisibilityRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .display
        .lock()
        .await
        .set_visible(&key, request.visible)?;
    Ok(Json(json!({ "key": key, "visible": request.visible })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogStartRequest {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

pub async fn log_start_handler(
    State(state): State<SharedState>,
    Json(request): Json<LogStartRequest>,
) -> ApiResult<Json<LogStatus>> {
    state.start_logging(request.path)?;
    Ok(Json(state.log_status()))
}

pub async fn log_stop_handler(State(state): State<SharedState>) -> ApiResult<Json<LogStatus>> {
    Ok(Json(state.stop_logging()?))
}

pub async fn log_status_handler(State(state): State<SharedState>) -> Json<LogStatus> {
    Json(state.log_status())
}

/// Missing fields fall back to the per-kind defaults.
#[derive(Debug, Default, Deserialize)]
pub struct BenchmarkRequest {
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub repeats: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkResponse {
    pub outcome: TriggerOutcome,
    pub job: JobSnapshot,
}

pub async fn benchmark_trigger_handler(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    Json(request): Json<BenchmarkRequest>,
) -> ApiResult<(StatusCode, Json<BenchmarkResponse>)> {
    let kind: BenchmarkKind = kind.parse().map_err(|e: Error| ApiError {
        status: StatusCode::NOT_FOUND,
        message: e.to_string(),
    })?;
    let defaults = kind.default_params();
    let params = BenchmarkParams {
        size: request.size.unwrap_or(defaults.size),
        repeats: request.repeats.unwrap_or(defaults.repeats),
    };
    params.check_size(kind, available_memory_bytes())?;

    let outcome = state.runner.trigger(kind, params);
    let status = match outcome {
        TriggerOutcome::Started => StatusCode::ACCEPTED,
        TriggerOutcome::AlreadyBusy => StatusCode::CONFLICT,
    };
    let job = state.runner.poll(kind);
    Ok((status, Json(BenchmarkResponse { outcome, job })))
}

/// Job snapshot plus the largest size the host can currently run.
#[derive(Debug, Serialize)]
pub struct BenchmarkStatusResponse {
    #[serde(flatten)]
    pub job: JobSnapshot,
    pub max_size: usize,
}

pub async fn benchmark_status_handler(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<BenchmarkStatusResponse>> {
    let kind: BenchmarkKind = kind.parse().map_err(|e: Error| ApiError {
        status: StatusCode::NOT_FOUND,
        message: e.to_string(),
    })?;
    Ok(Json(BenchmarkStatusResponse {
        job: state.runner.poll(kind),
        max_size: max_problem_size(kind, available_memory_bytes()),
    }))
}

pub async fn reset_handler(State(state): State<SharedState>) -> StatusCode {
    state.display.lock().await.reset();
    *state.frame.write().await = Frame::default();
    StatusCode::NO_CONTENT
}
