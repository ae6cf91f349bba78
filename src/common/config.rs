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

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Application configuration constants
pub struct AppConfig;

impl AppConfig {
    // History buffers
    pub const DEFAULT_BUFFER_SIZE: usize = 50;
    pub const MAX_BUFFER_SIZE: usize = 100_000;

    // Data Collection
    pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
    pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1000;
    pub const MIN_INTERVAL_MS: u64 = 100;
    pub const MAX_INTERVAL_MS: u64 = 60_000;

    // Display refresh: bounded wait for fresh samples (75 x 10ms)
    pub const FRESH_DATA_RETRY_ATTEMPTS: u32 = 75;
    pub const FRESH_DATA_RETRY_DELAY_MS: u64 = 10;

    // Y-axis widening factors
    pub const Y_RANGE_LOW_FACTOR: f64 = 0.8;
    pub const Y_RANGE_HIGH_FACTOR: f64 = 1.25;
    pub const X_RANGE_PADDING: f64 = 0.05;

    // Benchmarks
    pub const BENCHMARK_RESULT_BYTES: usize = 1024;
    pub const DEFAULT_DGEMM_SIZE: usize = 1000;
    pub const DEFAULT_STREAM_SIZE: usize = 10_000;
    pub const DEFAULT_BENCHMARK_REPEATS: usize = 10;

    // API
    pub const DEFAULT_API_PORT: u16 = 8050;

    // Log files
    pub const LOG_FILE_EXTENSION: &'static str = "hwout";
    pub const LOG_DATE_FORMAT: &'static str = "%Y_%m_%d_%H_%M_%S";
    pub const LOG_TIMESTAMP_FORMAT: &'static str = "%H:%M:%S%.3f";

    // Mock devices
    pub const DEFAULT_MOCK_DEVICES: usize = 2;
}

/// Runtime configuration of a monitoring session, built from the CLI.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Ring buffer capacity per metric per device.
    pub buffer_size: usize,
    pub sample_interval: Duration,
    pub refresh_interval: Duration,
    /// Metric keys to sample, in registration (and log column) order.
    pub metric_keys: Vec<String>,
    /// Open a log session right after startup.
    pub log_on_start: bool,
    pub log_file: Option<PathBuf>,
    /// Number of simulated devices, when running without real hardware.
    pub mock_devices: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            buffer_size: AppConfig::DEFAULT_BUFFER_SIZE,
            sample_interval: Duration::from_millis(AppConfig::DEFAULT_SAMPLE_INTERVAL_MS),
            refresh_interval: Duration::from_millis(AppConfig::DEFAULT_REFRESH_INTERVAL_MS),
            metric_keys: crate::metrics::default_metric_keys(),
            log_on_start: false,
            log_file: None,
            mock_devices: None,
        }
    }
}

impl MonitorConfig {
    /// Validate the configuration before any task is started.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 || self.buffer_size > AppConfig::MAX_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "buffer size {} must be between 1 and {}",
                self.buffer_size,
                AppConfig::MAX_BUFFER_SIZE
            )));
        }

        for (name, interval) in [
            ("sample", self.sample_interval),
            ("refresh", self.refresh_interval),
        ] {
            let ms = interval.as_millis() as u64;
            if !(AppConfig::MIN_INTERVAL_MS..=AppConfig::MAX_INTERVAL_MS).contains(&ms) {
                return Err(Error::Config(format!(
                    "{name} interval {ms}ms must be between {}ms and {}ms",
                    AppConfig::MIN_INTERVAL_MS,
                    AppConfig::MAX_INTERVAL_MS
                )));
            }
        }

        crate::metrics::MetricCatalog::validate(&self.metric_keys)?;

        if self.mock_devices == Some(0) {
            return Err(Error::NoDevicesFound);
        }

        Ok(())
    }
}
