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

use sysinfo::{CpuRefreshKind, System};

use crate::device::error::DeviceResult;
use crate::device::traits::HostReader;
use crate::metrics::catalog::CPU;

/// Host CPU load through `sysinfo`, used where `/proc/stat` is unavailable.
///
/// sysinfo computes usage between two refreshes, so the first read after
/// construction reports whatever the initial refresh measured (usually 0).
pub struct SysinfoCpuReader {
    system: System,
}

impl Default for SysinfoCpuReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoCpuReader {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage());
        Self { system }
    }
}

impl HostReader for SysinfoCpuReader {
    fn read_out(&mut self) -> DeviceResult<HashMap<String, f64>> {
        self.system
            .refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage());
        let usage = self.system.global_cpu_usage() as f64;
        Ok(HashMap::from([(CPU.to_string(), usage.clamp(0.0, 100.0))]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_cpu_key_in_range() {
        let mut reader = SysinfoCpuReader::new();
        let values = reader.read_out().unwrap();
        let usage = values[CPU];
        assert!((0.0..=100.0).contains(&usage));
    }
}
