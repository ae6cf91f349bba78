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

//! Simulated accelerators for development and demos without a GPU.

use rand::{rng, Rng};

use crate::device::error::{DeviceError, DeviceResult};
use crate::device::traits::DeviceReader;
use crate::device::types::MemoryInfo;
use crate::metrics::catalog::{
    FREQUENCY, GPU_UTILIZATION, MEMORY_USED, MEMORY_UTILIZATION, PCIE, POWER, TEMPERATURE,
};

const MOCK_MEMORY_TOTAL: u64 = 16 * 1024 * 1024 * 1024;
const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
struct MockGpu {
    utilization: f64,
    memory_utilization: f64,
    memory_used_bytes: u64,
    temperature: f64,
    power_watts: f64,
    frequency_mhz: f64,
    pcie_tx_kbs: f64,
    processes: Vec<u32>,
}

impl MockGpu {
    fn new() -> Self {
        let mut rng = rng();
        Self {
            utilization: rng.random_range(0.0..30.0),
            memory_utilization: rng.random_range(0.0..20.0),
            memory_used_bytes: rng.random_range(512 * 1024 * 1024..4 * 1024 * 1024 * 1024),
            temperature: 40.0,
            power_watts: 60.0,
            frequency_mhz: 1200.0,
            pcie_tx_kbs: 0.0,
            processes: Vec::new(),
        }
    }

    /// Random walk with temperature, power and clock following utilization.
    fn update(&mut self) {
        let mut rng = rng();

        self.utilization = (self.utilization + rng.random_range(-5.0..5.0)).clamp(0.0, 100.0);
        self.memory_utilization =
            (self.utilization * 0.6 + rng.random_range(-3.0..3.0)).clamp(0.0, 100.0);

        let memory_delta = rng.random_range(-(256 * 1024 * 1024)..(256 * 1024 * 1024));
        self.memory_used_bytes = self
            .memory_used_bytes
            .saturating_add_signed(memory_delta)
            .min(MOCK_MEMORY_TOTAL);

        self.power_watts =
            (50.0 + self.utilization * 2.5 + rng.random_range(-5.0..5.0)).clamp(30.0, 300.0);
        self.temperature =
            (35.0 + self.utilization * 0.4 + rng.random_range(-1.0..1.0)).clamp(30.0, 90.0);
        self.frequency_mhz =
            (1000.0 + self.utilization * 8.0 + rng.random_range(-50.0..50.0)).clamp(300.0, 1980.0);
        self.pcie_tx_kbs = (self.utilization * 100.0 + rng.random_range(0.0..500.0)).max(0.0);

        // An occasional process starts or finishes.
        if rng.random_bool(0.05) {
            if self.processes.is_empty() || rng.random_bool(0.5) {
                self.processes.push(rng.random_range(1000..65000));
            } else {
                self.processes.pop();
            }
        }
    }

    fn value(&self, key: &str) -> Option<f64> {
        let value = match key {
            TEMPERATURE => self.temperature,
            FREQUENCY => self.frequency_mhz,
            PCIE => self.pcie_tx_kbs,
            POWER => self.power_watts,
            GPU_UTILIZATION => self.utilization,
            MEMORY_UTILIZATION => self.memory_utilization,
            MEMORY_USED => self.memory_used_bytes as f64 / MIB,
            _ => return None,
        };
        Some(value)
    }
}

pub struct MockDeviceReader {
    gpus: Vec<MockGpu>,
}

impl MockDeviceReader {
    pub fn new(device_count: usize) -> Self {
        Self {
            gpus: (0..device_count).map(|_| MockGpu::new()).collect(),
        }
    }

    fn gpu(&self, index: usize) -> DeviceResult<&MockGpu> {
        self.gpus.get(index).ok_or(DeviceError::NoSuchDevice(index))
    }
}

impl DeviceReader for MockDeviceReader {
    fn read_out(&mut self) -> DeviceResult<()> {
        self.gpus.iter_mut().for_each(MockGpu::update);
        Ok(())
    }

    fn device_count(&self) -> usize {
        self.gpus.len()
    }

    fn get_item(&self, index: usize, key: &str) -> DeviceResult<f64> {
        self.gpu(index)?
            .value(key)
            .ok_or_else(|| DeviceError::Unsupported(key.to_string()))
    }

    fn supported_keys(&self) -> Vec<String> {
        [
            TEMPERATURE,
            FREQUENCY,
            PCIE,
            POWER,
            GPU_UTILIZATION,
            MEMORY_UTILIZATION,
            MEMORY_USED,
        ]
        .iter()
        .map(|k| k.to_string())
        .collect()
    }

    fn get_memory_info(&self, index: usize) -> DeviceResult<MemoryInfo> {
        let gpu = self.gpu(index)?;
        Ok(MemoryInfo {
            free: MOCK_MEMORY_TOTAL - gpu.memory_used_bytes,
            total: MOCK_MEMORY_TOTAL,
            used: gpu.memory_used_bytes,
        })
    }

    fn get_process_info(&self, index: usize) -> DeviceResult<Vec<u32>> {
        Ok(self.gpu(index)?.processes.clone())
    }

    fn get_device_name(&self, index: usize) -> String {
        format!("Mock GPU {index}")
    }

    fn persistence_enabled(&self, _index: usize) -> Option<bool> {
        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_values_stay_in_range() {
        let mut reader = MockDeviceReader::new(2);
        for _ in 0..200 {
            reader.read_out().unwrap();
            for i in 0..2 {
                let util = reader.get_item(i, GPU_UTILIZATION).unwrap();
                assert!((0.0..=100.0).contains(&util));
                let temp = reader.get_item(i, TEMPERATURE).unwrap();
                assert!((30.0..=90.0).contains(&temp));
                let mem = reader.get_memory_info(i).unwrap();
                assert!(mem.used <= mem.total);
            }
        }
    }

    #[test]
    fn test_unknown_key_and_device() {
        let reader = MockDeviceReader::new(1);
        assert!(matches!(
            reader.get_item(0, "FanSpeed"),
            Err(DeviceError::Unsupported(_))
        ));
        assert!(matches!(
            reader.get_item(3, POWER),
            Err(DeviceError::NoSuchDevice(3))
        ));
        assert_eq!(reader.get_items(0).len(), reader.supported_keys().len());
    }
}
