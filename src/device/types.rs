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

use serde::{Deserialize, Serialize};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryInfo {
    pub free: u64,  // Free device memory in bytes
    pub total: u64, // Total device memory in bytes
    pub used: u64,  // Used device memory in bytes
}

impl MemoryInfo {
    pub fn total_gib(&self) -> f64 {
        self.total as f64 / BYTES_PER_GIB
    }
}

/// Static and slow-changing properties of one device, shown in the overview.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeviceProperties {
    pub index: usize,
    pub name: String,
    pub persistence_enabled: Option<bool>,
    pub memory: Option<MemoryInfo>,
    pub total_memory_gib: Option<f64>,
    pub processes: Vec<u32>,
}

impl DeviceProperties {
    /// "Active processes: 2 [1234, 5678]"
    pub fn process_summary(&self) -> String {
        let mut summary = format!("Active processes: {}", self.processes.len());
        if !self.processes.is_empty() {
            let pids: Vec<String> = self.processes.iter().map(|p| p.to_string()).collect();
            summary.push_str(&format!(" [{}]", pids.join(", ")));
        }
        summary
    }
}

/// Host-level overview: which devices are watched on which machine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Overview {
    pub host_name: String,
    pub device_count: usize,
    pub devices: Vec<DeviceProperties>,
}
