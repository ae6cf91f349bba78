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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::device::{DeviceReader, HostReader};
use crate::metrics::catalog::{source_of, MetricSource};
use crate::metrics::{MetricStore, Tick};

/// Device reader shared between the sampler and the overview endpoint.
pub type SharedDeviceReader = Arc<Mutex<Box<dyn DeviceReader>>>;

pub fn share_reader(reader: Box<dyn DeviceReader>) -> SharedDeviceReader {
    Arc::new(Mutex::new(reader))
}

pub fn lock_reader(reader: &SharedDeviceReader) -> MutexGuard<'_, Box<dyn DeviceReader>> {
    reader.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Polls the device and host readers at a fixed cadence and publishes one
/// tick per cycle into the store.
pub struct Sampler {
    store: Arc<MetricStore>,
    device_reader: SharedDeviceReader,
    host_reader: Box<dyn HostReader>,
    interval: Duration,
    device_keys: Vec<String>,
    host_keys: Vec<String>,
}

impl Sampler {
    pub fn new(
        store: Arc<MetricStore>,
        device_reader: SharedDeviceReader,
        host_reader: Box<dyn HostReader>,
        interval: Duration,
    ) -> Self {
        let (host_keys, device_keys): (Vec<String>, Vec<String>) = store
            .keys()
            .iter()
            .cloned()
            .partition(|key| source_of(key) == Some(MetricSource::Host));

        Self {
            store,
            device_reader,
            host_reader,
            interval,
            device_keys,
            host_keys,
        }
    }

    /// Run one sampling cycle and publish it.
    ///
    /// Read failures skip the affected values; `advance_tick` still runs so
    /// every buffer stays aligned with the tick buffer.
    pub fn sample_once(&mut self) -> Tick {
        self.sample_devices();
        self.sample_host();
        self.store.advance_tick()
    }

    fn sample_devices(&mut self) {
        if self.device_keys.is_empty() {
            return;
        }
        let mut reader = lock_reader(&self.device_reader);
        if let Err(e) = reader.read_out() {
            tracing::warn!("Device read_out failed, skipping device metrics this cycle: {e}");
            return;
        }

        let devices = reader.device_count().min(self.store.device_count());
        for device in 0..devices {
            for key in &self.device_keys {
                match reader.get_item(device, key) {
                    Ok(value) => self.store.record(device, key, value),
                    Err(e) => tracing::debug!("Skipping {key} on device {device}: {e}"),
                }
            }
        }
    }

    fn sample_host(&mut self) {
        if self.host_keys.is_empty() {
            return;
        }
        let values = match self.host_reader.read_out() {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Host read_out failed, skipping host metrics this cycle: {e}");
                return;
            }
        };

        // Host metrics are charted next to every device.
        for key in &self.host_keys {
            let Some(&value) = values.get(key) else {
                tracing::debug!("Host reader returned no value for {key}");
                continue;
            };
            for device in 0..self.store.device_count() {
                self.store.record(device, key, value);
            }
        }
    }

    /// Sample until `shutdown` flips to true or its sender is dropped.
    ///
    /// Missed intervals are not caught up: a slow cycle just widens the gap
    /// to the next tick.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Sampler started: {} device(s), {} metric(s), every {:?}",
            self.store.device_count(),
            self.store.keys().len(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let tick = self.sample_once();
                    tracing::trace!("Published tick {}", tick.index);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Sampler stopped after {} tick(s)", self.store.current_tick());
    }

    pub fn spawn(self) -> SamplerHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SamplerHandle { shutdown: tx, task }
    }
}

pub struct SamplerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Stop the sampling loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Sampler task ended abnormally: {e}");
        }
    }
}
