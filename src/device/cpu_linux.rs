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

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::device::error::{DeviceError, DeviceResult};
use crate::device::traits::HostReader;
use crate::metrics::catalog::CPU;

/// Cumulative jiffy counters of the aggregate "cpu " line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuJiffies {
    pub total: u64,
    pub idle: u64,
}

/// Host CPU load from `/proc/stat`, computed from the delta between two
/// consecutive reads. The first read has no baseline and reports 0.
pub struct LinuxCpuReader {
    stat_path: PathBuf,
    previous: Option<CpuJiffies>,
}

impl Default for LinuxCpuReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxCpuReader {
    pub fn new() -> Self {
        Self::with_stat_path("/proc/stat")
    }

    pub fn with_stat_path(path: impl Into<PathBuf>) -> Self {
        Self {
            stat_path: path.into(),
            previous: None,
        }
    }

    /// Feed one `/proc/stat` snapshot and return the load since the last one.
    pub fn update(&mut self, stat_content: &str) -> DeviceResult<f64> {
        let current = parse_cpu_jiffies(stat_content)?;
        let usage = match self.previous {
            Some(previous) => usage_percent(previous, current),
            None => 0.0,
        };
        self.previous = Some(current);
        Ok(usage)
    }
}

impl HostReader for LinuxCpuReader {
    fn read_out(&mut self) -> DeviceResult<HashMap<String, f64>> {
        let content = fs::read_to_string(&self.stat_path)?;
        let usage = self.update(&content)?;
        Ok(HashMap::from([(CPU.to_string(), usage)]))
    }
}

pub fn parse_cpu_jiffies(content: &str) -> DeviceResult<CpuJiffies> {
    let cpu_line = content
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or_else(|| DeviceError::ParseError("no aggregate cpu line in /proc/stat".into()))?;

    let fields: Vec<u64> = cpu_line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| DeviceError::ParseError(format!("bad jiffy counter: {e}")))?;

    if fields.len() < 7 {
        return Err(DeviceError::ParseError(format!(
            "expected at least 7 jiffy counters, got {}",
            fields.len()
        )));
    }

    // user nice system idle iowait irq softirq [steal ...]
    let total: u64 = fields.iter().take(8).sum();
    let idle = fields[3] + fields[4];
    Ok(CpuJiffies { total, idle })
}

pub fn usage_percent(previous: CpuJiffies, current: CpuJiffies) -> f64 {
    let total = current.total.saturating_sub(previous.total);
    let idle = current.idle.saturating_sub(previous.idle);
    if total == 0 {
        return 0.0;
    }
    let active = total.saturating_sub(idle);
    (active as f64 / total as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT_A: &str = "cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 50 0 50 400 0 0 0 0 0 0\nintr 1\n";
    const STAT_B: &str = "cpu  150 0 150 900 0 0 0 0 0 0\ncpu0 75 0 75 450 0 0 0 0 0 0\nintr 2\n";

    #[test]
    fn test_parse_aggregate_line() {
        let jiffies = parse_cpu_jiffies(STAT_A).unwrap();
        assert_eq!(jiffies, CpuJiffies { total: 1000, idle: 800 });
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_cpu_jiffies("intr 1 2 3").is_err());
        assert!(parse_cpu_jiffies("cpu  1 2 x 4 5 6 7").is_err());
        assert!(parse_cpu_jiffies("cpu  1 2 3").is_err());
    }

    #[test]
    fn test_first_sample_is_zero_then_delta() {
        let mut reader = LinuxCpuReader::new();
        assert_eq!(reader.update(STAT_A).unwrap(), 0.0);
        // 200 jiffies elapsed, 100 of them idle.
        let usage = reader.update(STAT_B).unwrap();
        assert!((usage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_usage_without_progress_is_zero() {
        let j = CpuJiffies { total: 10, idle: 5 };
        assert_eq!(usage_percent(j, j), 0.0);
    }

    #[test]
    fn test_read_out_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stat");
        std::fs::write(&path, STAT_A).unwrap();

        let mut reader = LinuxCpuReader::with_stat_path(&path);
        let first = reader.read_out().unwrap();
        assert_eq!(first.get(CPU), Some(&0.0));

        std::fs::write(&path, STAT_B).unwrap();
        let second = reader.read_out().unwrap();
        assert!((second[CPU] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut reader = LinuxCpuReader::with_stat_path("/nonexistent/stat");
        assert!(matches!(reader.read_out(), Err(DeviceError::Io(_))));
    }
}
