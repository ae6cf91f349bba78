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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use super::report::{format_matrix_multiply, format_stream, BoundedString};
use super::{
    BenchmarkKind, BenchmarkParams, Benchmarks, MatrixMultiplyResult, StreamResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    Busy,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerOutcome {
    Started,
    /// A run of this kind is in progress; nothing was started.
    AlreadyBusy,
}

/// Point-in-time view of one benchmark job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub kind: BenchmarkKind,
    pub state: JobState,
    /// Parameters of the current or last run.
    pub params: Option<BenchmarkParams>,
    /// Report of the last finished run. Kept while a new run is busy.
    pub result: Option<BoundedString>,
}

struct JobRecord {
    state: JobState,
    params: Option<BenchmarkParams>,
    result: Option<BoundedString>,
    cancel: Arc<AtomicBool>,
}

impl JobRecord {
    fn idle() -> Self {
        Self {
            state: JobState::Idle,
            params: None,
            result: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

type Jobs = Arc<[Mutex<JobRecord>; 2]>;

fn lock(jobs: &Jobs, kind: BenchmarkKind) -> MutexGuard<'_, JobRecord> {
    jobs[kind.index()]
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Runs at most one benchmark per kind on the blocking thread pool and
/// keeps the last report of each.
///
/// Job records have their own locks and never touch the metric store, so
/// polling a benchmark cannot stall sampling.
pub struct BenchmarkRunner {
    backend: Arc<dyn Benchmarks>,
    jobs: Jobs,
}

fn failure_report(kind: BenchmarkKind, size: usize, code: &str) -> String {
    match kind {
        BenchmarkKind::Dgemm => format_matrix_multiply(size, &MatrixMultiplyResult::failed(code)),
        BenchmarkKind::Stream => format_stream(size, &StreamResult::failed(code)),
    }
}

impl BenchmarkRunner {
    pub fn new(backend: Arc<dyn Benchmarks>) -> Self {
        Self {
            backend,
            jobs: Arc::new([Mutex::new(JobRecord::idle()), Mutex::new(JobRecord::idle())]),
        }
    }

    /// Start a run unless one of the same kind is busy. Must be called from
    /// within a Tokio runtime.
    pub fn trigger(&self, kind: BenchmarkKind, params: BenchmarkParams) -> TriggerOutcome {
        let cancel = {
            let mut job = lock(&self.jobs, kind);
            if job.state == JobState::Busy {
                tracing::debug!("{kind} benchmark already running, ignoring trigger");
                return TriggerOutcome::AlreadyBusy;
            }
            job.state = JobState::Busy;
            job.params = Some(params);
            job.cancel = Arc::new(AtomicBool::new(false));
            job.cancel.clone()
        };

        tracing::info!(
            "Starting {kind} benchmark (size {}, {} repeats)",
            params.size,
            params.repeats
        );

        let backend = self.backend.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let BenchmarkParams { size, repeats } = params;
            match kind {
                BenchmarkKind::Dgemm => {
                    format_matrix_multiply(size, &backend.run_matrix_multiply(size, repeats, &cancel))
                }
                BenchmarkKind::Stream => {
                    format_stream(size, &backend.run_stream_bandwidth(size, repeats, &cancel))
                }
            }
        });

        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            let report = match worker.await {
                Ok(report) => report,
                Err(e) if e.is_panic() => {
                    tracing::error!("{kind} benchmark panicked");
                    failure_report(kind, params.size, "PANIC")
                }
                Err(e) => {
                    tracing::error!("{kind} benchmark worker failed: {e}");
                    failure_report(kind, params.size, "ABORTED")
                }
            };

            let result = BoundedString::new(report)
                .or_else(|e| {
                    tracing::warn!("{kind} benchmark report rejected: {e}");
                    BoundedString::new(failure_report(kind, params.size, "RESULT_TOO_LONG"))
                })
                .ok();

            let mut job = lock(&jobs, kind);
            job.state = JobState::Done;
            job.result = result;
            tracing::info!("{kind} benchmark finished");
        });

        TriggerOutcome::Started
    }

    pub fn poll(&self, kind: BenchmarkKind) -> JobSnapshot {
        let job = lock(&self.jobs, kind);
        JobSnapshot {
            kind,
            state: job.state,
            params: job.params,
            result: job.result.clone(),
        }
    }

    /// Poll until the job is no longer busy.
    pub async fn wait(&self, kind: BenchmarkKind, poll_interval: Duration) -> JobSnapshot {
        loop {
            let snapshot = self.poll(kind);
            if snapshot.state != JobState::Busy {
                return snapshot;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Ask every running job to stop at its next repeat boundary.
    pub fn cancel_all(&self) {
        for kind in BenchmarkKind::ALL {
            let job = lock(&self.jobs, kind);
            if job.state == JobState::Busy {
                tracing::info!("Cancelling {kind} benchmark");
                job.cancel.store(true, Ordering::Relaxed);
            }
        }
    }
}
