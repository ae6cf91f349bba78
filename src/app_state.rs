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
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use crate::benchmark::{BenchmarkRunner, Benchmarks};
use crate::common::config::MonitorConfig;
use crate::device::{describe_devices, DeviceReader, HostReader, Overview};
use crate::error::{Error, Result};
use crate::metrics::{MetricCatalog, MetricStore};
use crate::recorder::{lock_logger, FileLogger, LogStatus, SharedLogger};
use crate::view::{lock_reader, share_reader, DisplayAdapter, Frame, RetryPolicy, Sampler, SharedDeviceReader};

/// Everything a monitoring session shares between the sampler, the refresh
/// loop and the API handlers.
pub struct AppState {
    pub config: MonitorConfig,
    pub store: Arc<MetricStore>,
    pub display: tokio::sync::Mutex<DisplayAdapter>,
    /// Last frame produced by the refresh loop.
    pub frame: RwLock<Frame>,
    pub logger: SharedLogger,
    pub runner: BenchmarkRunner,
    pub reader: SharedDeviceReader,
    pub host_name: String,
    pub device_names: Vec<String>,
}

impl AppState {
    pub fn new(
        config: MonitorConfig,
        device_reader: Box<dyn DeviceReader>,
        benchmarks: Arc<dyn Benchmarks>,
        host_name: String,
    ) -> Result<Self> {
        config.validate()?;

        let device_count = device_reader.device_count();
        if device_count == 0 {
            return Err(Error::NoDevicesFound);
        }
        let device_names: Vec<String> = (0..device_count)
            .map(|i| device_reader.get_device_name(i))
            .collect();

        let store = Arc::new(MetricStore::new(
            &config.metric_keys,
            device_count,
            config.buffer_size,
        )?);
        let catalog = MetricCatalog::new(&config.metric_keys)?;
        let logger: SharedLogger = Arc::new(Mutex::new(FileLogger::new()));
        let display = DisplayAdapter::new(
            store.clone(),
            logger.clone(),
            catalog,
            device_names.clone(),
            RetryPolicy::default(),
        );

        tracing::info!(
            "Watching {} GPU(s) on {host_name}: {}",
            device_count,
            device_names.join(", ")
        );

        Ok(Self {
            config,
            store,
            display: tokio::sync::Mutex::new(display),
            frame: RwLock::new(Frame::default()),
            logger,
            runner: BenchmarkRunner::new(benchmarks),
            reader: share_reader(device_reader),
            host_name,
            device_names,
        })
    }

    pub fn sampler(&self, host_reader: Box<dyn HostReader>) -> Sampler {
        Sampler::new(
            self.store.clone(),
            self.reader.clone(),
            host_reader,
            self.config.sample_interval,
        )
    }

    /// Run one display refresh and publish the frame.
    pub async fn refresh(&self) -> Frame {
        let frame = self.display.lock().await.refresh().await;
        *self.frame.write().await = frame.clone();
        frame
    }

    pub fn overview(&self) -> Overview {
        let reader = lock_reader(&self.reader);
        Overview {
            host_name: self.host_name.clone(),
            device_count: self.device_names.len(),
            devices: describe_devices(reader.as_ref()),
        }
    }

    pub fn start_logging(&self, target: Option<PathBuf>) -> Result<PathBuf> {
        lock_logger(&self.logger).start_recording(
            &self.store,
            target.or_else(|| self.config.log_file.clone()),
            &self.device_names,
            &self.host_name,
        )
    }

    /// Write every tick the logger has not seen yet, then close the session.
    /// The returned status describes the session that was just closed.
    pub fn stop_logging(&self) -> Result<LogStatus> {
        let mut logger = lock_logger(&self.logger);
        if logger.is_open() {
            logger.consume(&self.store)?;
        }
        let status = logger.status();
        logger.stop()?;
        Ok(LogStatus {
            open: false,
            ..status
        })
    }

    pub fn log_status(&self) -> LogStatus {
        lock_logger(&self.logger).status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::HostBenchmarks;
    use crate::device::mock::MockDeviceReader;

    fn state(devices: usize) -> Result<AppState> {
        AppState::new(
            MonitorConfig::default(),
            Box::new(MockDeviceReader::new(devices)),
            Arc::new(HostBenchmarks),
            "testhost".to_string(),
        )
    }

    #[test]
    fn test_zero_devices_is_fatal() {
        assert!(matches!(state(0), Err(Error::NoDevicesFound)));
    }

    #[test]
    fn test_overview_lists_every_device() {
        let state = state(3).unwrap();
        let overview = state.overview();
        assert_eq!(overview.host_name, "testhost");
        assert_eq!(overview.device_count, 3);
        assert_eq!(overview.devices[2].name, "Mock GPU 2");
    }

    #[test]
    fn test_stop_logging_writes_unconsumed_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(2).unwrap();
        let path = dir.path().join("shutdown.hwout");
        state.start_logging(Some(path.clone())).unwrap();

        let mut sampler = state.sampler(Box::new(crate::device::cpu_generic::SysinfoCpuReader::new()));
        sampler.sample_once();
        sampler.sample_once();

        let status = state.stop_logging().unwrap();
        assert_eq!(status.rows_written, 2);
        let content = std::fs::read_to_string(&path).unwrap();
        let ticks: Vec<i64> = content
            .lines()
            .filter_map(|line| crate::recorder::parse_line(line).ok())
            .map(|line| line.tick)
            .collect();
        assert_eq!(ticks, vec![0, 1]);
    }

    #[test]
    fn test_log_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(1).unwrap();
        let path = dir.path().join("session.hwout");

        assert_eq!(state.start_logging(Some(path.clone())).unwrap(), path);
        assert!(state.log_status().open);

        let status = state.stop_logging().unwrap();
        assert!(!status.open);
        assert_eq!(status.path, Some(path.clone()));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Watching Mock GPU 0 on testhost\n"));
        assert!(content.contains("Finished recording"));
    }
}
