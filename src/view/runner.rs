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

use tokio::time::MissedTickBehavior;

use crate::api::shutdown_signal;
use crate::app_state::AppState;
use crate::benchmark::{BenchmarkParams, BenchmarkRunner, HostBenchmarks};
use crate::cli::{BenchArgs, RecordArgs};
use crate::device::{get_device_reader, get_host_reader};
use crate::error::{Error, Result};
use crate::recorder::lock_logger;
use crate::utils::{available_memory_bytes, get_hostname};

const BENCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Headless sampling straight into a log file.
pub async fn run_record_mode(args: &RecordArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;

    let device_reader = get_device_reader(config.mock_devices)
        .map_err(|e| Error::PlatformInit(e.to_string()))?;
    let state = AppState::new(
        config.clone(),
        device_reader,
        Arc::new(HostBenchmarks),
        get_hostname(),
    )?;

    let path = state.start_logging(None)?;
    println!("Recording to {}", path.display());

    let sampler = state.sampler(get_host_reader()).spawn();
    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let stop = shutdown_signal();
    tokio::pin!(stop);

    // Flush at the sampling cadence so the file trails the store by one tick.
    let mut flush = tokio::time::interval(config.sample_interval);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = flush.tick() => {
                if let Err(e) = lock_logger(&state.logger).consume(&state.store) {
                    tracing::warn!("Failed to append to log: {e}");
                }
            }
            _ = &mut deadline => break,
            _ = &mut stop => break,
        }
    }

    sampler.shutdown().await;
    let status = state.stop_logging()?;
    println!("Wrote {} row(s) to {}", status.rows_written, path.display());
    Ok(())
}

/// Run one host benchmark to completion and print the report.
pub async fn run_bench_mode(args: &BenchArgs) -> Result<()> {
    let defaults = args.kind.default_params();
    let params = BenchmarkParams {
        size: args.size.unwrap_or(defaults.size),
        repeats: args.repeats.unwrap_or(defaults.repeats),
    };

    params.check_size(args.kind, available_memory_bytes())?;

    let runner = BenchmarkRunner::new(Arc::new(HostBenchmarks));
    runner.trigger(args.kind, params);

    let snapshot = tokio::select! {
        snapshot = runner.wait(args.kind, BENCH_POLL_INTERVAL) => snapshot,
        _ = shutdown_signal() => {
            runner.cancel_all();
            runner.wait(args.kind, BENCH_POLL_INTERVAL).await
        }
    };

    match snapshot.result {
        Some(report) => println!("{report}"),
        None => println!("{} produced no report", args.kind),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::BenchmarkKind;

    #[tokio::test]
    async fn test_bench_rejects_oversized_problem() {
        let args = BenchArgs {
            kind: BenchmarkKind::Dgemm,
            size: Some(usize::MAX),
            repeats: Some(1),
        };
        assert!(matches!(run_bench_mode(&args).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_record_mode_writes_a_log() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.hwout");
        let args = RecordArgs {
            output: Some(output.clone()),
            duration_secs: Some(1),
            sampling: crate::cli::SamplingArgs {
                buffer_size: 50,
                sample_interval_ms: 100,
                mock: Some(2),
                keys: None,
            },
        };
        run_record_mode(&args).await.unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("Watching Mock GPU 0, Mock GPU 1 on "));
        assert_eq!(lines.last().map(|l| l.starts_with("End date: ")), Some(true));
        // header + at least one data row + trailer
        assert!(lines.len() > 5);
        assert!(lines[3].contains(" | "));
    }
}
