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

//! Sampler → store → display and logger, end to end with scripted readers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gpu_watch::device::{DeviceError, DeviceReader, DeviceResult, HostReader, MemoryInfo};
use gpu_watch::metrics::catalog::{CPU, POWER, TEMPERATURE};
use gpu_watch::metrics::{MetricCatalog, MetricStore};
use gpu_watch::recorder::{lock_logger, parse_line, FileLogger, HEADER_LINES, TRAILER_LINES};
use gpu_watch::view::{share_reader, DisplayAdapter, RetryPolicy, Sampler, SelectionUpdate};

/// Temperature is `10 * device + cycle`, power is constant per device.
struct ScriptedReader {
    devices: usize,
    cycle: u32,
}

impl DeviceReader for ScriptedReader {
    fn read_out(&mut self) -> DeviceResult<()> {
        self.cycle += 1;
        Ok(())
    }

    fn device_count(&self) -> usize {
        self.devices
    }

    fn get_item(&self, index: usize, key: &str) -> DeviceResult<f64> {
        match key {
            TEMPERATURE => Ok(10.0 * index as f64 + self.cycle as f64),
            POWER => Ok(100.0 + index as f64),
            other => Err(DeviceError::Unsupported(other.to_string())),
        }
    }

    fn supported_keys(&self) -> Vec<String> {
        vec![TEMPERATURE.to_string(), POWER.to_string()]
    }

    fn get_memory_info(&self, _index: usize) -> DeviceResult<MemoryInfo> {
        Ok(MemoryInfo::default())
    }

    fn get_process_info(&self, _index: usize) -> DeviceResult<Vec<u32>> {
        Ok(Vec::new())
    }

    fn get_device_name(&self, index: usize) -> String {
        format!("Scripted {index}")
    }
}

struct ConstantHost;

impl HostReader for ConstantHost {
    fn read_out(&mut self) -> DeviceResult<HashMap<String, f64>> {
        Ok(HashMap::from([(CPU.to_string(), 25.0)]))
    }
}

fn keys() -> Vec<String> {
    vec![TEMPERATURE.to_string(), POWER.to_string(), CPU.to_string()]
}

struct Pipeline {
    store: Arc<MetricStore>,
    sampler: Sampler,
    display: DisplayAdapter,
    logger: Arc<Mutex<FileLogger>>,
}

fn pipeline(devices: usize, capacity: usize) -> Pipeline {
    let store = Arc::new(MetricStore::new(&keys(), devices, capacity).unwrap());
    let sampler = Sampler::new(
        store.clone(),
        share_reader(Box::new(ScriptedReader { devices, cycle: 0 })),
        Box::new(ConstantHost),
        Duration::from_millis(10),
    );
    let logger = Arc::new(Mutex::new(FileLogger::new()));
    let names = (0..devices).map(|i| format!("Scripted {i}")).collect();
    let display = DisplayAdapter::new(
        store.clone(),
        logger.clone(),
        MetricCatalog::new(&keys()).unwrap(),
        names,
        RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(1),
        },
    );
    Pipeline {
        store,
        sampler,
        display,
        logger,
    }
}

#[tokio::test]
async fn test_display_and_logger_see_every_tick_once() {
    let mut p = pipeline(2, 50);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.hwout");
    let names = vec!["Scripted 0".to_string(), "Scripted 1".to_string()];
    lock_logger(&p.logger)
        .start_recording(&p.store, Some(path.clone()), &names, "host")
        .unwrap();

    for _ in 0..3 {
        p.sampler.sample_once();
    }
    let frame = p.display.refresh().await;
    assert_eq!(frame.tick, Some(2));
    assert_eq!(frame.subplots.len(), 3);
    assert_eq!((frame.rows, frame.cols), (2, 2));

    let temperature = &frame.subplots[0];
    assert_eq!(temperature.key, TEMPERATURE);
    assert_eq!(temperature.series[1].y, vec![11.0, 12.0, 13.0]);
    assert_eq!(temperature.series[1].label, "GPU 1: Scripted 1");

    for _ in 0..2 {
        p.sampler.sample_once();
    }
    let frame = p.display.refresh().await;
    assert_eq!(frame.subplots[0].series[0].y, vec![1.0, 2.0, 3.0, 4.0, 5.0]);

    // Nothing new: the previous frame comes back.
    assert_eq!(p.display.refresh().await, frame);

    lock_logger(&p.logger).stop().unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), HEADER_LINES + 5 + TRAILER_LINES);
    assert_eq!(lines[2], "Keys: Temperature Power CPU");

    let ticks: Vec<i64> = lines[HEADER_LINES..HEADER_LINES + 5]
        .iter()
        .map(|line| parse_line(line).unwrap().tick)
        .collect();
    assert_eq!(ticks, vec![0, 1, 2, 3, 4]);

    let last = parse_line(lines[HEADER_LINES + 4]).unwrap();
    assert_eq!(last.values, vec![vec![5.0, 100.0, 25.0], vec![15.0, 101.0, 25.0]]);
}

#[tokio::test]
async fn test_selection_and_eviction() {
    let mut p = pipeline(3, 4);
    for _ in 0..6 {
        p.sampler.sample_once();
    }
    let frame = p.display.refresh().await;
    // Only the newest four ticks stay resident.
    assert_eq!(frame.subplots[0].series[0].y, vec![3.0, 4.0, 5.0, 6.0]);
    assert_eq!(frame.subplots[0].series.len(), 3);

    assert!(matches!(
        p.display.set_selection("1-2"),
        SelectionUpdate::Updated(_)
    ));
    let frame = p.display.refresh().await;
    let devices: Vec<usize> = frame.subplots[0].series.iter().map(|s| s.device).collect();
    assert_eq!(devices, vec![1, 2]);
    assert_eq!(frame.subplots[0].series[1].y, vec![23.0, 24.0, 25.0, 26.0]);

    // Device 0 is no longer drawn but its values still bound the range.
    let [low, _] = p.display.y_range(TEMPERATURE).unwrap();
    assert!((low - 2.4).abs() < 1e-9);

    assert_eq!(p.display.set_selection("7"), SelectionUpdate::Invalid);
    assert_eq!(p.display.selection(), vec![1, 2]);
}

#[tokio::test]
async fn test_spawned_sampler_feeds_display() {
    let p = pipeline(1, 50);
    let Pipeline {
        store,
        sampler,
        mut display,
        ..
    } = p;
    let handle = sampler.spawn();

    tokio::time::sleep(Duration::from_millis(60)).await;
    let frame = display.refresh().await;
    handle.shutdown().await;

    assert!(frame.tick.is_some());
    assert!(store.current_tick() >= 1);
    let series = &frame.subplots[0].series[0];
    assert_eq!(series.x.len(), series.y.len());
}
