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

use std::fmt;

use serde::Serialize;

use super::{BenchmarkStatus, MatrixMultiplyResult, StreamResult};
use crate::common::config::AppConfig;
use crate::error::{Error, Result};

pub const RESULT_LIMIT: usize = AppConfig::BENCHMARK_RESULT_BYTES;

/// String of at most `LIMIT` bytes. Longer input is rejected, never
/// truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BoundedString<const LIMIT: usize = RESULT_LIMIT>(String);

impl<const LIMIT: usize> BoundedString<LIMIT> {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.len() > LIMIT {
            return Err(Error::ResultTooLong {
                len: value.len(),
                limit: LIMIT,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const fn limit() -> usize {
        LIMIT
    }
}

impl<const LIMIT: usize> fmt::Display for BoundedString<LIMIT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn format_matrix_multiply(size: usize, result: &MatrixMultiplyResult) -> String {
    match &result.status {
        BenchmarkStatus::Ok => format!(
            "DGEMM result for N = {size}\n  Avg: {:6.1} GF/s\n  Min: {:6.1} GF/s\n  Max: {:6.1} GF/s\n  Stddev: {:6.1} GF/s",
            result.avg, result.min, result.max, result.stddev
        ),
        BenchmarkStatus::Error(code) => format!("DGEMM failed: Error {code}"),
    }
}

pub fn format_stream(size: usize, result: &StreamResult) -> String {
    match &result.status {
        BenchmarkStatus::Ok => format!(
            "STREAM result for N = {size}\n   Copy: {:6.1} GiB/s\n  Scale: {:6.1} GiB/s\n    Add: {:6.1} GiB/s\n  Triad: {:6.1} GiB/s",
            result.copy, result.scale, result.add, result.triad
        ),
        BenchmarkStatus::Error(code) => format!("STREAM failed: Error {code}"),
    }
}
