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

use super::error::DeviceResult;
use super::types::MemoryInfo;

/// Accelerator readout.
///
/// `read_out` refreshes an internal snapshot; the getters only read that
/// snapshot, so one sampling cycle sees a consistent set of values.
pub trait DeviceReader: Send {
    fn read_out(&mut self) -> DeviceResult<()>;

    fn device_count(&self) -> usize;

    /// Value of one metric from the last snapshot.
    fn get_item(&self, index: usize, key: &str) -> DeviceResult<f64>;

    /// Keys this reader can produce.
    fn supported_keys(&self) -> Vec<String>;

    /// All readable metrics of one device. Faulty metrics are left out.
    fn get_items(&self, index: usize) -> HashMap<String, f64> {
        self.supported_keys()
            .into_iter()
            .filter_map(|key| {
                let value = self.get_item(index, &key).ok()?;
                Some((key, value))
            })
            .collect()
    }

    fn get_memory_info(&self, index: usize) -> DeviceResult<MemoryInfo>;

    fn get_process_info(&self, index: usize) -> DeviceResult<Vec<u32>>;

    fn get_device_name(&self, index: usize) -> String;

    fn persistence_enabled(&self, _index: usize) -> Option<bool> {
        None
    }
}

/// Host-level readout, e.g. `{"CPU": 12.5}`.
pub trait HostReader: Send {
    fn read_out(&mut self) -> DeviceResult<HashMap<String, f64>>;
}
