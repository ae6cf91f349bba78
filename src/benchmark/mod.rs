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

//! On-demand throughput benchmarks: dense matrix multiply and STREAM
//! memory bandwidth.

pub mod dgemm;
pub mod report;
pub mod runner;
pub mod stream;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::common::config::AppConfig;
use crate::error::Error;

pub use report::BoundedString;
pub use runner::{BenchmarkRunner, JobSnapshot, JobState, TriggerOutcome};

/// Error code reported by a run stopped through its cancel flag.
pub const CANCELLED: &str = "CANCELLED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkKind {
    Dgemm,
    Stream,
}

impl BenchmarkKind {
    pub const ALL: [BenchmarkKind; 2] = [BenchmarkKind::Dgemm, BenchmarkKind::Stream];

    fn index(self) -> usize {
        match self {
            BenchmarkKind::Dgemm => 0,
            BenchmarkKind::Stream => 1,
        }
    }

    pub fn default_params(self) -> BenchmarkParams {
        let size = match self {
            BenchmarkKind::Dgemm => AppConfig::DEFAULT_DGEMM_SIZE,
            BenchmarkKind::Stream => AppConfig::DEFAULT_STREAM_SIZE,
        };
        BenchmarkParams {
            size,
            repeats: AppConfig::DEFAULT_BENCHMARK_REPEATS,
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchmarkKind::Dgemm => write!(f, "dgemm"),
            BenchmarkKind::Stream => write!(f, "stream"),
        }
    }
}

impl FromStr for BenchmarkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dgemm" => Ok(BenchmarkKind::Dgemm),
            "stream" => Ok(BenchmarkKind::Stream),
            other => Err(Error::Parse(format!("unknown benchmark '{other}'"))),
        }
    }
}

/// Problem size (matrix dimension or vector length) and repeat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkParams {
    pub size: usize,
    pub repeats: usize,
}

impl BenchmarkParams {
    /// Reject an empty problem or one whose operands do not fit into
    /// `memory_bytes`.
    pub fn check_size(&self, kind: BenchmarkKind, memory_bytes: u64) -> Result<(), Error> {
        if self.size == 0 {
            return Err(Error::Config(format!("{kind} size must be positive")));
        }
        let max_size = max_problem_size(kind, memory_bytes);
        if self.size > max_size {
            return Err(Error::Config(format!(
                "{kind} size {} exceeds the largest size fitting in memory ({max_size})",
                self.size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BenchmarkStatus {
    Ok,
    Error(String),
}

impl BenchmarkStatus {
    pub fn error(code: impl Into<String>) -> Self {
        BenchmarkStatus::Error(code.into())
    }
}

/// GF/s statistics over all repeats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixMultiplyResult {
    pub status: BenchmarkStatus,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

impl MatrixMultiplyResult {
    pub fn failed(code: impl Into<String>) -> Self {
        Self {
            status: BenchmarkStatus::error(code),
            avg: 0.0,
            min: 0.0,
            max: 0.0,
            stddev: 0.0,
        }
    }
}

/// Best GiB/s per kernel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamResult {
    pub status: BenchmarkStatus,
    pub copy: f64,
    pub scale: f64,
    pub add: f64,
    pub triad: f64,
}

impl StreamResult {
    pub fn failed(code: impl Into<String>) -> Self {
        Self {
            status: BenchmarkStatus::error(code),
            copy: 0.0,
            scale: 0.0,
            add: 0.0,
            triad: 0.0,
        }
    }
}

/// Benchmark backend. Implementations must check `cancel` between repeats
/// and report [`CANCELLED`] when it is set.
pub trait Benchmarks: Send + Sync {
    fn run_matrix_multiply(&self, size: usize, repeats: usize, cancel: &AtomicBool)
        -> MatrixMultiplyResult;

    fn run_stream_bandwidth(&self, size: usize, repeats: usize, cancel: &AtomicBool)
        -> StreamResult;
}

/// CPU implementations of both benchmarks.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostBenchmarks;

impl Benchmarks for HostBenchmarks {
    fn run_matrix_multiply(
        &self,
        size: usize,
        repeats: usize,
        cancel: &AtomicBool,
    ) -> MatrixMultiplyResult {
        dgemm::run(size, repeats, cancel)
    }

    fn run_stream_bandwidth(&self, size: usize, repeats: usize, cancel: &AtomicBool) -> StreamResult {
        stream::run(size, repeats, cancel)
    }
}

/// Largest problem size that fits three operands of f64 into `memory_bytes`.
pub fn max_problem_size(kind: BenchmarkKind, memory_bytes: u64) -> usize {
    match kind {
        BenchmarkKind::Dgemm => dgemm::max_matrix_size(memory_bytes),
        BenchmarkKind::Stream => stream::max_vector_size(memory_bytes),
    }
}

/// Running mean, extrema and variance over repeats.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunningStats {
    count: usize,
    avg: f64,
    min: f64,
    max: f64,
    var_sum: f64,
}

impl RunningStats {
    pub(crate) fn new() -> Self {
        Self {
            count: 0,
            avg: 0.0,
            min: f64::MAX,
            max: 0.0,
            var_sum: 0.0,
        }
    }

    pub(crate) fn push(&mut self, value: f64) {
        let r = self.count as f64;
        if self.count > 0 {
            self.var_sum += (r * (value - self.avg)).powi(2) / (r * (r + 1.0));
        }
        self.avg = (value + r * self.avg) / (r + 1.0);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }

    pub(crate) fn avg(&self) -> f64 {
        self.avg
    }

    pub(crate) fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    pub(crate) fn max(&self) -> f64 {
        self.max
    }

    /// Normalised by `count + 1`.
    pub(crate) fn stddev(&self) -> f64 {
        (self.var_sum / (self.count as f64 + 1.0)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("dgemm".parse::<BenchmarkKind>().unwrap(), BenchmarkKind::Dgemm);
        assert_eq!("STREAM".parse::<BenchmarkKind>().unwrap(), BenchmarkKind::Stream);
        assert!("linpack".parse::<BenchmarkKind>().is_err());
        assert_eq!(BenchmarkKind::Stream.to_string(), "stream");
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::new();
        for v in [2.0, 4.0, 6.0] {
            stats.push(v);
        }
        assert!((stats.avg() - 4.0).abs() < 1e-12);
        assert_eq!(stats.min(), 2.0);
        assert_eq!(stats.max(), 6.0);
        // Sum of squared deviations is 8, normalised by 3 + 1.
        assert!((stats.stddev() - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_max_problem_size() {
        // 3 * 1000^2 doubles
        assert_eq!(max_problem_size(BenchmarkKind::Dgemm, 24_000_000), 1000);
        assert_eq!(max_problem_size(BenchmarkKind::Stream, 24_000), 1000);
    }

    #[test]
    fn test_check_size_bounds() {
        let params = |size| BenchmarkParams { size, repeats: 1 };
        assert!(params(1000).check_size(BenchmarkKind::Dgemm, 24_000_000).is_ok());
        assert!(matches!(
            params(1001).check_size(BenchmarkKind::Dgemm, 24_000_000),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            params(0).check_size(BenchmarkKind::Stream, 24_000),
            Err(Error::Config(_))
        ));
    }
}
