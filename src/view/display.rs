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

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::common::config::AppConfig;
use crate::error::Result;
use crate::metrics::{MetricCatalog, MetricStore, ReaderId, SampleBatch, Tick};
use crate::recorder::{lock_logger, SharedLogger};
use crate::view::frame::{device_color, layout, padded_x_range, Frame, Series, Subplot, YRange};
use crate::view::selection::{DeviceSelection, SelectionUpdate};

/// Bounded wait for the sampler to publish a new tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: AppConfig::FRESH_DATA_RETRY_ATTEMPTS,
            delay: Duration::from_millis(AppConfig::FRESH_DATA_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Worst-case time a refresh spends waiting.
    pub fn max_wait(&self) -> Duration {
        self.delay * self.attempts
    }
}

/// Series the display has drained so far, capped at the store capacity.
#[derive(Debug, Default)]
struct History {
    ticks: VecDeque<Tick>,
    devices: Vec<usize>,
    keys: Vec<String>,
    /// `values[device][key]`, aligned with `ticks`
    values: Vec<Vec<VecDeque<f64>>>,
}

impl History {
    fn replace(&mut self, batch: SampleBatch) {
        self.ticks = batch.ticks.into();
        self.devices = batch.devices;
        self.keys = batch.keys;
        self.values = batch
            .values
            .into_iter()
            .map(|per_key| per_key.into_iter().map(VecDeque::from).collect())
            .collect();
    }

    fn extend(&mut self, batch: SampleBatch, capacity: usize) {
        if batch.devices != self.devices || batch.keys != self.keys {
            self.replace(batch);
        } else {
            self.ticks.extend(batch.ticks);
            for (retained, fresh) in self.values.iter_mut().zip(batch.values) {
                for (series, new_values) in retained.iter_mut().zip(fresh) {
                    series.extend(new_values);
                }
            }
        }
        self.trim(capacity);
    }

    fn trim(&mut self, capacity: usize) {
        let excess = self.ticks.len().saturating_sub(capacity);
        self.ticks.drain(..excess);
        for series in self.values.iter_mut().flatten() {
            let excess = series.len().saturating_sub(capacity);
            series.drain(..excess);
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Periodic consumer turning store contents into chart frames.
///
/// Reads through [`ReaderId::DISPLAY`] only. An open log session is fed on
/// every refresh through its own cursor.
pub struct DisplayAdapter {
    store: Arc<MetricStore>,
    logger: SharedLogger,
    catalog: MetricCatalog,
    selection: DeviceSelection,
    device_names: Vec<String>,
    y_ranges: HashMap<String, YRange>,
    history: History,
    frame: Frame,
    retry: RetryPolicy,
    full_redraw: bool,
    dirty: bool,
}

impl DisplayAdapter {
    pub fn new(
        store: Arc<MetricStore>,
        logger: SharedLogger,
        catalog: MetricCatalog,
        device_names: Vec<String>,
        retry: RetryPolicy,
    ) -> Self {
        let selection = DeviceSelection::all(store.device_count());
        Self {
            store,
            logger,
            catalog,
            selection,
            device_names,
            y_ranges: HashMap::new(),
            history: History::default(),
            frame: Frame::default(),
            retry,
            full_redraw: true,
            dirty: false,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn selection(&self) -> Vec<usize> {
        self.selection.devices()
    }

    pub fn y_range(&self, key: &str) -> Option<[f64; 2]> {
        self.y_ranges.get(key).and_then(YRange::bounds)
    }

    /// Apply a selection string such as `"0-2,5"`. A changed selection makes
    /// the next refresh redraw from the full resident history.
    pub fn set_selection(&mut self, input: &str) -> SelectionUpdate {
        let update = self.selection.apply(input);
        if let SelectionUpdate::Updated(devices) = &update {
            tracing::debug!("Device selection changed to {devices:?}");
            self.full_redraw = true;
        }
        update
    }

    /// Show or hide a metric. Sampling is unaffected.
    pub fn set_visible(&mut self, key: &str, visible: bool) -> Result<()> {
        self.catalog.set_visible(key, visible)?;
        self.dirty = true;
        Ok(())
    }

    pub fn reset_ranges(&mut self) {
        self.y_ranges.clear();
        self.dirty = true;
    }

    /// Clear the store, the ranges and everything drawn so far. An open log
    /// session is flushed up to the current tick first.
    pub fn reset(&mut self) {
        self.feed_logger();
        self.store.reset_all();
        self.y_ranges.clear();
        self.history.clear();
        self.frame = Frame::default();
        self.full_redraw = true;
        tracing::info!("Display and metric store reset");
    }

    async fn wait_for_tick(&self) -> bool {
        for attempt in 0..=self.retry.attempts {
            if self.store.has_new_tick(ReaderId::DISPLAY) {
                return true;
            }
            if attempt < self.retry.attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }
        false
    }

    /// Produce the next frame.
    ///
    /// Without a new tick within the retry policy, the previous frame is
    /// returned unchanged (rebuilt only if visibility changed meanwhile).
    pub async fn refresh(&mut self) -> Frame {
        let fresh = self.full_redraw || self.wait_for_tick().await;
        self.feed_logger();

        if !fresh {
            if self.dirty {
                self.frame = self.build_frame();
                self.dirty = false;
            }
            return self.frame.clone();
        }

        let devices = self.selection.devices();
        let keys = self.store.keys().to_vec();
        if self.full_redraw {
            // Rewind, then drain: the whole resident history comes back and
            // the cursor ends up past it in one critical section.
            self.store.reset_cursors(ReaderId::DISPLAY);
            let batch = self.store.drain(ReaderId::DISPLAY, &devices, &keys);
            self.widen(&batch);
            self.history.replace(batch);
            self.full_redraw = false;
        } else {
            let batch = self.store.drain(ReaderId::DISPLAY, &devices, &keys);
            self.widen(&batch);
            self.history.extend(batch, self.store.capacity());
        }

        self.frame = self.build_frame();
        self.dirty = false;
        self.frame.clone()
    }

    fn feed_logger(&self) {
        let mut logger = lock_logger(&self.logger);
        if !logger.is_open() {
            return;
        }
        match logger.consume(&self.store) {
            Ok(0) => {}
            Ok(rows) => tracing::trace!("Logged {rows} row(s)"),
            Err(e) => tracing::warn!("Failed to append to log: {e}"),
        }
    }

    fn widen(&mut self, batch: &SampleBatch) {
        for per_key in &batch.values {
            for (key, series) in batch.keys.iter().zip(per_key) {
                self.y_ranges
                    .entry(key.clone())
                    .or_default()
                    .widen_all(series);
            }
        }
    }

    fn build_frame(&self) -> Frame {
        let x: Vec<f64> = self.history.ticks.iter().map(Tick::elapsed_secs).collect();
        let x_range = padded_x_range(&x);
        let visible: Vec<_> = self.catalog.visible().collect();
        let (rows, cols) = layout(visible.len());

        let subplots = visible
            .iter()
            .enumerate()
            .map(|(i, descriptor)| {
                let key_index = self.history.keys.iter().position(|k| *k == descriptor.key);
                let series = self
                    .history
                    .devices
                    .iter()
                    .enumerate()
                    .filter_map(|(d, &device)| {
                        let values = &self.history.values.get(d)?.get(key_index?)?;
                        Some(Series {
                            device,
                            label: self.device_label(device),
                            color: device_color(device),
                            x: x.clone(),
                            y: values.iter().copied().collect(),
                        })
                    })
                    .collect();

                Subplot {
                    key: descriptor.key.clone(),
                    title: descriptor.display_label.clone(),
                    y_label: descriptor.unit.to_string(),
                    row: i / cols + 1,
                    col: i % cols + 1,
                    x_range,
                    y_range: self.y_range(&descriptor.key),
                    series,
                }
            })
            .collect();

        Frame {
            tick: self.history.ticks.back().map(|t| t.index),
            rows,
            cols,
            subplots,
        }
    }

    fn device_label(&self, device: usize) -> String {
        match self.device_names.get(device) {
            Some(name) => format!("GPU {device}: {name}"),
            None => format!("GPU {device}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::catalog::{POWER, TEMPERATURE};
    use crate::recorder::{parse_line, FileLogger, HEADER_LINES};
    use std::sync::Mutex;
    use std::time::Instant;

    fn keys() -> Vec<String> {
        vec![TEMPERATURE.to_string(), POWER.to_string()]
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
        }
    }

    fn adapter(devices: usize, capacity: usize) -> (Arc<MetricStore>, DisplayAdapter) {
        let (store, display, _) = adapter_with_logger(devices, capacity);
        (store, display)
    }

    fn adapter_with_logger(
        devices: usize,
        capacity: usize,
    ) -> (Arc<MetricStore>, DisplayAdapter, SharedLogger) {
        let store = Arc::new(MetricStore::new(&keys(), devices, capacity).unwrap());
        let logger: SharedLogger = Arc::new(Mutex::new(FileLogger::new()));
        let catalog = MetricCatalog::new(&keys()).unwrap();
        let names = (0..devices).map(|d| format!("Test {d}")).collect();
        let display = DisplayAdapter::new(store.clone(), logger.clone(), catalog, names, fast_retry());
        (store, display, logger)
    }

    fn publish(store: &MetricStore, temperature: f64) {
        for d in 0..store.device_count() {
            store.record(d, TEMPERATURE, temperature + d as f64);
            store.record(d, POWER, 100.0);
        }
        store.advance_tick();
    }

    fn series<'a>(frame: &'a Frame, key: &str, device: usize) -> &'a Series {
        frame
            .subplots
            .iter()
            .find(|s| s.key == key)
            .and_then(|s| s.series.iter().find(|s| s.device == device))
            .unwrap()
    }

    #[tokio::test]
    async fn test_incremental_refresh_accumulates() {
        let (store, mut display) = adapter(2, 10);
        publish(&store, 50.0);
        let frame = display.refresh().await;
        assert_eq!(frame.tick, Some(0));
        assert_eq!((frame.rows, frame.cols), (1, 2));
        assert_eq!(frame.subplots.len(), 2);

        publish(&store, 40.0);
        publish(&store, 60.0);
        let frame = display.refresh().await;
        assert_eq!(frame.tick, Some(2));
        assert_eq!(series(&frame, TEMPERATURE, 0).y, vec![50.0, 40.0, 60.0]);
        assert_eq!(series(&frame, TEMPERATURE, 1).x.len(), 3);

        let [low, high] = display.y_range(TEMPERATURE).unwrap();
        assert!((low - 32.0).abs() < 1e-9);
        assert!((high - 76.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_new_data_returns_previous_frame_within_cap() {
        let (store, mut display) = adapter(1, 10);
        publish(&store, 50.0);
        let first = display.refresh().await;

        let started = Instant::now();
        let again = display.refresh().await;
        assert_eq!(again, first);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_ranges_never_shrink_after_eviction() {
        let (store, mut display) = adapter(1, 2);
        publish(&store, 100.0);
        display.refresh().await;
        publish(&store, 10.0);
        publish(&store, 10.0);
        let frame = display.refresh().await;

        // 100.0 has been evicted from the window, its bound remains.
        assert_eq!(series(&frame, TEMPERATURE, 0).y, vec![10.0, 10.0]);
        let [low, high] = display.y_range(TEMPERATURE).unwrap();
        assert!((low - 8.0).abs() < 1e-9);
        assert!((high - 125.0).abs() < 1e-9);

        display.reset_ranges();
        assert_eq!(display.y_range(TEMPERATURE), None);
    }

    #[tokio::test]
    async fn test_selection_change_redraws_full_history() {
        let (store, mut display) = adapter(3, 10);
        for t in 0..4 {
            publish(&store, t as f64);
        }
        assert!(matches!(
            display.set_selection("2"),
            SelectionUpdate::Updated(_)
        ));
        let frame = display.refresh().await;
        let power = frame.subplots.iter().find(|s| s.key == POWER).unwrap();
        assert_eq!(power.series.len(), 1);
        assert_eq!(series(&frame, TEMPERATURE, 2).y, vec![2.0, 3.0, 4.0, 5.0]);

        assert_eq!(display.set_selection("x-y"), SelectionUpdate::Invalid);
        assert_eq!(display.selection(), vec![2]);

        // Back to two devices: both get the full resident history.
        display.set_selection("0,2");
        publish(&store, 10.0);
        let frame = display.refresh().await;
        assert_eq!(series(&frame, TEMPERATURE, 0).y.len(), 5);
        assert_eq!(series(&frame, TEMPERATURE, 2).y.len(), 5);
    }

    #[tokio::test]
    async fn test_hidden_metric_is_not_rendered() {
        let (store, mut display) = adapter(1, 10);
        publish(&store, 1.0);
        display.refresh().await;
        display.set_visible(POWER, false).unwrap();
        let frame = display.refresh().await;
        assert_eq!(frame.subplots.len(), 1);
        assert_eq!(frame.subplots[0].key, TEMPERATURE);
        assert_eq!((frame.rows, frame.cols), (1, 1));
        assert!(display.set_visible("Nope", true).is_err());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let (store, mut display) = adapter(1, 10);
        publish(&store, 1.0);
        display.refresh().await;
        display.reset();
        assert_eq!(store.current_tick(), 0);
        assert_eq!(display.y_range(TEMPERATURE), None);
        let frame = display.refresh().await;
        assert_eq!(frame.tick, None);

        publish(&store, 7.0);
        let frame = display.refresh().await;
        assert_eq!(frame.tick, Some(0));
        assert_eq!(series(&frame, TEMPERATURE, 0).y, vec![7.0]);
    }

    #[tokio::test]
    async fn test_reset_logs_pending_ticks_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reset.hwout");
        let (store, mut display, logger) = adapter_with_logger(1, 10);
        lock_logger(&logger)
            .start_recording(&store, Some(path.clone()), &["Test 0".to_string()], "host")
            .unwrap();

        publish(&store, 1.0);
        publish(&store, 2.0);
        display.reset();
        publish(&store, 3.0);
        display.refresh().await;
        lock_logger(&logger).stop().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let temperatures: Vec<f64> = content
            .lines()
            .skip(HEADER_LINES)
            .filter_map(|line| parse_line(line).ok())
            .map(|line| line.values[0][0])
            .collect();
        assert_eq!(temperatures, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_retry_policy_cap() {
        assert_eq!(RetryPolicy::default().max_wait(), Duration::from_millis(750));
    }
}
