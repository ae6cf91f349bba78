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

use nvml_wrapper::enum_wrappers::device::{Clock, ClockId, PcieUtilCounter, TemperatureSensor};
use nvml_wrapper::{Device, Nvml};

use crate::device::error::{DeviceError, DeviceResult};
use crate::device::traits::DeviceReader;
use crate::device::types::MemoryInfo;
use crate::metrics::catalog::{
    FREQUENCY, GPU_UTILIZATION, MEMORY_USED, MEMORY_UTILIZATION, PCIE, POWER, TEMPERATURE,
};

const SUPPORTED_KEYS: [&str; 7] = [
    TEMPERATURE,
    FREQUENCY,
    PCIE,
    POWER,
    GPU_UTILIZATION,
    MEMORY_UTILIZATION,
    MEMORY_USED,
];

/// Last readout of one device. Metrics that failed to read are absent.
#[derive(Debug, Default, Clone)]
struct DeviceSnapshot {
    metrics: HashMap<String, f64>,
    memory: Option<MemoryInfo>,
    processes: Vec<u32>,
}

/// Per-device static info, fetched once at construction.
#[derive(Debug, Clone)]
struct DeviceStaticInfo {
    name: String,
    persistence_enabled: Option<bool>,
}

pub struct NvidiaDeviceReader {
    nvml: Nvml,
    static_info: Vec<DeviceStaticInfo>,
    snapshots: Vec<DeviceSnapshot>,
}

impl NvidiaDeviceReader {
    /// Initialise NVML and enumerate devices. Fails if the library is
    /// unavailable or reports no devices.
    pub fn new() -> DeviceResult<Self> {
        let nvml = Nvml::init()?;
        let count = nvml.device_count()?;
        if count == 0 {
            return Err(DeviceError::Other("NVML reports no devices".into()));
        }

        let mut static_info = Vec::with_capacity(count as usize);
        for i in 0..count {
            let device = nvml.device_by_index(i)?;
            static_info.push(DeviceStaticInfo {
                name: device.name().unwrap_or_else(|_| format!("GPU {i}")),
                persistence_enabled: device.is_in_persistent_mode().ok(),
            });
        }

        tracing::info!("NVML initialised with {count} device(s)");
        Ok(Self {
            nvml,
            snapshots: vec![DeviceSnapshot::default(); static_info.len()],
            static_info,
        })
    }

    fn snapshot(&self, index: usize) -> DeviceResult<&DeviceSnapshot> {
        self.snapshots
            .get(index)
            .ok_or(DeviceError::NoSuchDevice(index))
    }
}

fn read_device(device: &Device<'_>) -> DeviceSnapshot {
    let mut metrics = HashMap::new();

    if let Ok(t) = device.temperature(TemperatureSensor::Gpu) {
        metrics.insert(TEMPERATURE.to_string(), t as f64);
    }
    if let Ok(clock) = device.clock(Clock::Graphics, ClockId::Current) {
        metrics.insert(FREQUENCY.to_string(), clock as f64);
    }
    if let Ok(tx) = device.pcie_throughput(PcieUtilCounter::Send) {
        metrics.insert(PCIE.to_string(), tx as f64);
    }
    // NVML reports milliwatts
    if let Ok(mw) = device.power_usage() {
        metrics.insert(POWER.to_string(), mw as f64 / 1000.0);
    }
    if let Ok(util) = device.utilization_rates() {
        metrics.insert(GPU_UTILIZATION.to_string(), util.gpu as f64);
        metrics.insert(MEMORY_UTILIZATION.to_string(), util.memory as f64);
    }

    let memory = device.memory_info().ok().map(|m| MemoryInfo {
        free: m.free,
        total: m.total,
        used: m.used,
    });
    if let Some(mem) = memory {
        metrics.insert(MEMORY_USED.to_string(), mem.used as f64 / (1024.0 * 1024.0));
    }

    let processes = device
        .running_compute_processes()
        .map(|procs| procs.into_iter().map(|p| p.pid).filter(|&pid| pid > 0).collect())
        .unwrap_or_default();

    DeviceSnapshot {
        metrics,
        memory,
        processes,
    }
}

impl DeviceReader for NvidiaDeviceReader {
    fn read_out(&mut self) -> DeviceResult<()> {
        for (i, slot) in self.snapshots.iter_mut().enumerate() {
            match self.nvml.device_by_index(i as u32) {
                Ok(device) => *slot = read_device(&device),
                Err(e) => {
                    tracing::warn!("Failed to open GPU {i}: {e}");
                    *slot = DeviceSnapshot::default();
                }
            }
        }
        Ok(())
    }

    fn device_count(&self) -> usize {
        self.static_info.len()
    }

    fn get_item(&self, index: usize, key: &str) -> DeviceResult<f64> {
        self.snapshot(index)?
            .metrics
            .get(key)
            .copied()
            .ok_or_else(|| DeviceError::Unsupported(key.to_string()))
    }

    fn supported_keys(&self) -> Vec<String> {
        SUPPORTED_KEYS.iter().map(|k| k.to_string()).collect()
    }

    fn get_memory_info(&self, index: usize) -> DeviceResult<MemoryInfo> {
        self.snapshot(index)?
            .memory
            .ok_or_else(|| DeviceError::Unsupported("memory info".into()))
    }

    fn get_process_info(&self, index: usize) -> DeviceResult<Vec<u32>> {
        Ok(self.snapshot(index)?.processes.clone())
    }

    fn get_device_name(&self, index: usize) -> String {
        self.static_info
            .get(index)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| format!("GPU {index}"))
    }

    fn persistence_enabled(&self, index: usize) -> Option<bool> {
        self.static_info.get(index)?.persistence_enabled
    }
}
