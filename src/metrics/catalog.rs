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

use serde::Serialize;

use crate::error::{Error, Result};

pub const TEMPERATURE: &str = "Temperature";
pub const FREQUENCY: &str = "Frequency";
pub const PCIE: &str = "PCIe";
pub const POWER: &str = "Power";
pub const GPU_UTILIZATION: &str = "GPU";
pub const MEMORY_UTILIZATION: &str = "Memory";
pub const MEMORY_USED: &str = "MemoryUsed";
pub const CPU: &str = "CPU";

/// Where a metric value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricSource {
    /// Read per accelerator from the device reader.
    Device,
    /// Read once per cycle from the host and recorded for every device.
    Host,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricDescriptor {
    pub key: String,
    pub display_label: String,
    pub unit: &'static str,
    pub source: MetricSource,
    pub visible: bool,
}

/// Every metric the sampler knows how to read: (key, label, unit, source).
const KNOWN_METRICS: &[(&str, &str, &str, MetricSource)] = &[
    (TEMPERATURE, "Temperature [°C]", "°C", MetricSource::Device),
    (FREQUENCY, "Graphics Clock [MHz]", "MHz", MetricSource::Device),
    (PCIE, "PCIe TX [KB/s]", "KB/s", MetricSource::Device),
    (POWER, "Power [W]", "W", MetricSource::Device),
    (GPU_UTILIZATION, "GPU Utilization [%]", "%", MetricSource::Device),
    (MEMORY_UTILIZATION, "Memory Utilization [%]", "%", MetricSource::Device),
    (MEMORY_USED, "Memory Used [MiB]", "MiB", MetricSource::Device),
    (CPU, "Host CPU [%]", "%", MetricSource::Host),
];

pub fn default_metric_keys() -> Vec<String> {
    KNOWN_METRICS
        .iter()
        .map(|(key, ..)| key.to_string())
        .collect()
}

/// Source of a known metric key, `None` for keys outside the table.
pub fn source_of(key: &str) -> Option<MetricSource> {
    KNOWN_METRICS
        .iter()
        .find(|(known, ..)| *known == key)
        .map(|(.., source)| *source)
}

/// Ordered set of metric descriptors with their display visibility.
#[derive(Debug, Clone, Serialize)]
pub struct MetricCatalog {
    descriptors: Vec<MetricDescriptor>,
}

impl MetricCatalog {
    /// Build a catalog for the given keys, all visible.
    pub fn new(keys: &[String]) -> Result<Self> {
        Self::validate(keys)?;
        let descriptors = keys
            .iter()
            .filter_map(|key| Self::describe(key))
            .collect();
        Ok(Self { descriptors })
    }

    /// Reject empty, duplicate or unknown keys at startup.
    pub fn validate(keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Err(Error::Config("at least one metric key is required".into()));
        }
        let mut seen = HashSet::new();
        for key in keys {
            if Self::describe(key).is_none() {
                return Err(Error::UnknownMetric(key.clone()));
            }
            if !seen.insert(key.as_str()) {
                return Err(Error::Config(format!("duplicate metric key '{key}'")));
            }
        }
        Ok(())
    }

    fn describe(key: &str) -> Option<MetricDescriptor> {
        KNOWN_METRICS
            .iter()
            .find(|(known, ..)| *known == key)
            .map(|(key, label, unit, source)| MetricDescriptor {
                key: key.to_string(),
                display_label: label.to_string(),
                unit: *unit,
                source: *source,
                visible: true,
            })
    }

    pub fn descriptors(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    pub fn keys(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.key.clone()).collect()
    }

    pub fn visible(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.descriptors.iter().filter(|d| d.visible)
    }

    /// Toggle display visibility. Sampling is unaffected.
    pub fn set_visible(&mut self, key: &str, visible: bool) -> Result<()> {
        let descriptor = self
            .descriptors
            .iter_mut()
            .find(|d| d.key == key)
            .ok_or_else(|| Error::UnknownMetric(key.to_string()))?;
        descriptor.visible = visible;
        Ok(())
    }
}
