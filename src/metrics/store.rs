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

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Local};
use super::ring_buffer::{ReaderId, RingBuffer};
use crate::error::{Error, Result};

/// One published sampling cycle.
#[derive(Debug, Clone)]
pub struct Tick {
    /// Monotonic cycle number, starting at 0 after construction or reset.
    pub index: i64,
    /// Microseconds since the store was created or last reset.
    pub elapsed_us: i64,
    pub wall: DateTime<Local>,
}

impl Tick {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_us as f64 / 1_000_000.0
    }
}

/// Samples read out of the store in one critical section.
///
/// `values[d][k]` holds the series of `devices[d]` for `keys[k]`, aligned
/// by position with `ticks`.
#[derive(Debug, Clone, Default)]
pub struct SampleBatch {
    pub ticks: Vec<Tick>,
    pub devices: Vec<usize>,
    pub keys: Vec<String>,
    pub values: Vec<Vec<Vec<f64>>>,
}

impl SampleBatch {
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn series(&self, device: usize, key: &str) -> Option<&[f64]> {
        let d = self.devices.iter().position(|&x| x == device)?;
        let k = self.keys.iter().position(|x| x == key)?;
        Some(&self.values[d][k])
    }

    /// Values of one tick grouped per device, in key order.
    pub fn row(&self, tick: usize) -> Vec<Vec<f64>> {
        self.values
            .iter()
            .map(|per_key| per_key.iter().map(|series| series[tick]).collect())
            .collect()
    }
}

struct StoreInner {
    /// `buffers[device][key]`
    buffers: Vec<Vec<RingBuffer<f64>>>,
    /// Values recorded during the current cycle, published by `advance_tick`.
    staged: Vec<Vec<Option<f64>>>,
    ticks: RingBuffer<Tick>,
    next_tick: i64,
    started: Instant,
}

/// Per-device, per-metric history shared between the sampler and its readers.
///
/// All buffers live behind one coarse lock. Values passed to
/// [`MetricStore::record`] are staged and only become visible to readers when
/// [`MetricStore::advance_tick`] publishes them together with the new tick, so
/// a reader that observes a tick also observes every metric of that cycle.
pub struct MetricStore {
    keys: Vec<String>,
    device_count: usize,
    capacity: usize,
    inner: Mutex<StoreInner>,
}

impl MetricStore {
    pub fn new<K: AsRef<str>>(keys: &[K], device_count: usize, capacity: usize) -> Result<Self> {
        if device_count == 0 {
            return Err(Error::NoDevicesFound);
        }
        if capacity == 0 {
            return Err(Error::Config("ring buffer capacity must be positive".into()));
        }
        if keys.is_empty() {
            return Err(Error::Config("at least one metric key is required".into()));
        }

        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let mut seen = HashSet::new();
        if let Some(dup) = keys.iter().find(|k| !seen.insert(k.as_str())) {
            return Err(Error::Config(format!("duplicate metric key '{dup}'")));
        }

        let buffers = (0..device_count)
            .map(|_| keys.iter().map(|_| RingBuffer::new(capacity)).collect())
            .collect();
        let staged = vec![vec![None; keys.len()]; device_count];

        Ok(Self {
            keys,
            device_count,
            capacity,
            inner: Mutex::new(StoreInner {
                buffers,
                staged,
                ticks: RingBuffer::new(capacity),
                next_tick: 0,
                started: Instant::now(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn key_index(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn validate_key(&self, key: &str) -> Result<()> {
        self.key_index(key)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownMetric(key.to_string()))
    }

    /// Stage a value for the current cycle.
    ///
    /// Unknown keys or device indices are dropped; they indicate a
    /// configuration error that startup validation should have caught.
    pub fn record(&self, device: usize, key: &str, value: f64) {
        let Some(k) = self.key_index(key) else {
            tracing::warn!("Dropping value for unknown metric key '{key}'");
            return;
        };
        if device >= self.device_count {
            tracing::warn!("Dropping value for unknown device index {device}");
            return;
        }
        self.lock().staged[device][k] = Some(value);
    }

    /// Publish the current cycle: every metric buffer receives exactly one
    /// value and the tick buffer receives the new tick.
    ///
    /// A metric without a staged value repeats its previous value, or `NaN`
    /// if it has never been read.
    pub fn advance_tick(&self) -> Tick {
        let mut guard = self.lock();
        let inner = &mut *guard;

        for (buffers, staged) in inner.buffers.iter_mut().zip(inner.staged.iter_mut()) {
            for (buffer, slot) in buffers.iter_mut().zip(staged.iter_mut()) {
                let value = slot
                    .take()
                    .or_else(|| buffer.last().copied())
                    .unwrap_or(f64::NAN);
                buffer.put(value);
            }
        }

        let tick = Tick {
            index: inner.next_tick,
            elapsed_us: inner.started.elapsed().as_micros() as i64,
            wall: Local::now(),
        };
        inner.next_tick += 1;
        inner.ticks.put(tick.clone());
        tick
    }

    /// Index of the next tick to be published.
    pub fn current_tick(&self) -> i64 {
        self.lock().next_tick
    }

    /// True if any metric buffer of `device` has data `reader` has not seen.
    pub fn has_new_data(&self, device: usize, reader: ReaderId) -> bool {
        self.lock()
            .buffers
            .get(device)
            .is_some_and(|buffers| buffers.iter().any(|b| b.has_new_data(reader)))
    }

    pub fn has_new_tick(&self, reader: ReaderId) -> bool {
        self.lock().ticks.has_new_data(reader)
    }

    /// Latest published value of one metric.
    pub fn latest(&self, device: usize, key: &str) -> Option<f64> {
        let k = self.key_index(key)?;
        self.lock()
            .buffers
            .get(device)
            .and_then(|buffers| buffers[k].last().copied())
    }

    /// Drain everything `reader` has not seen yet for the given devices and
    /// keys. All of the reader's cursors advance together so later drains of
    /// other devices or keys stay aligned with the tick buffer.
    pub fn drain(&self, reader: ReaderId, devices: &[usize], keys: &[String]) -> SampleBatch {
        let (devices, key_indices, keys) = self.resolve(devices, keys);
        let mut inner = self.lock();

        let ticks = inner.ticks.flush_since_last_read(reader);
        let fresh = ticks.len();

        let values = devices
            .iter()
            .map(|&d| {
                key_indices
                    .iter()
                    .map(|&k| {
                        let mut series = inner.buffers[d][k].flush_since_last_read(reader);
                        // A rewound cursor may return more than the new ticks.
                        let skip = series.len().saturating_sub(fresh);
                        series.drain(..skip);
                        series
                    })
                    .collect()
            })
            .collect();

        for buffers in inner.buffers.iter_mut() {
            for buffer in buffers.iter_mut() {
                buffer.mark_read(reader);
            }
        }

        SampleBatch {
            ticks,
            devices,
            keys,
            values,
        }
    }

    /// Everything resident for the given devices and keys. No cursor moves.
    pub fn snapshot(&self, devices: &[usize], keys: &[String]) -> SampleBatch {
        let (devices, key_indices, keys) = self.resolve(devices, keys);
        let inner = self.lock();

        let values = devices
            .iter()
            .map(|&d| {
                key_indices
                    .iter()
                    .map(|&k| inner.buffers[d][k].snapshot_all())
                    .collect()
            })
            .collect();

        SampleBatch {
            ticks: inner.ticks.snapshot_all(),
            devices,
            keys,
            values,
        }
    }

    fn resolve(&self, devices: &[usize], keys: &[String]) -> (Vec<usize>, Vec<usize>, Vec<String>) {
        let devices: Vec<usize> = devices
            .iter()
            .copied()
            .filter(|&d| d < self.device_count)
            .collect();
        let (key_indices, keys): (Vec<usize>, Vec<String>) = keys
            .iter()
            .filter_map(|key| self.key_index(key).map(|k| (k, key.clone())))
            .unzip();
        (devices, key_indices, keys)
    }

    /// Rewind every cursor of `reader` so the next drain returns the full
    /// resident history.
    pub fn reset_cursors(&self, reader: ReaderId) {
        let mut inner = self.lock();
        inner.ticks.reset_cursor(reader);
        for buffers in inner.buffers.iter_mut() {
            for buffer in buffers.iter_mut() {
                buffer.reset_cursor(reader);
            }
        }
    }

    /// Mark everything resident as consumed by `reader`.
    pub fn mark_read(&self, reader: ReaderId) {
        let mut inner = self.lock();
        inner.ticks.mark_read(reader);
        for buffers in inner.buffers.iter_mut() {
            for buffer in buffers.iter_mut() {
                buffer.mark_read(reader);
            }
        }
    }

    /// Clear the tick counter, the tick buffer, every metric buffer and all
    /// reader cursors.
    pub fn reset_all(&self) {
        let mut inner = self.lock();
        inner.ticks.clear();
        for buffers in inner.buffers.iter_mut() {
            for buffer in buffers.iter_mut() {
                buffer.clear();
            }
        }
        for staged in inner.staged.iter_mut() {
            staged.iter_mut().for_each(|slot| *slot = None);
        }
        inner.next_tick = 0;
        inner.started = Instant::now();
    }
}
