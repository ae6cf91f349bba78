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

//! Unified error types for the gpu-watch library.
//!
//! Errors are split in two layers: [`enum@Error`] covers startup
//! configuration, log sessions and benchmark reporting, while
//! [`crate::device::DeviceError`] covers faults raised by the device and
//! host readers during sampling. Device faults are recovered locally by the
//! sampler and only surface here when they happen at startup.
//!
//! # Example
//!
//! ```rust,no_run
//! use gpu_watch::metrics::MetricStore;
//! use gpu_watch::Result;
//!
//! fn build() -> Result<MetricStore> {
//!     MetricStore::new(&["Temperature", "Power"], 2, 50)
//! }
//! ```

use thiserror::Error;

/// The main error type for gpu-watch operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid startup configuration (zero capacity, empty key list, ...).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The device reader reported zero devices.
    #[error("No supported devices found")]
    NoDevicesFound,

    /// The device backend could not be initialized (e.g. NVML missing).
    #[error("Platform initialization failed: {0}")]
    PlatformInit(String),

    /// A metric key that is not part of the registered catalog.
    #[error("Unknown metric key: {0}")]
    UnknownMetric(String),

    /// An append or consume was issued while no log session is open.
    #[error("No log session is open")]
    LogNotOpen,

    /// A log row does not match the registered column layout.
    #[error("Row width mismatch: expected {expected} values per device, got {actual}")]
    RowWidthMismatch { expected: usize, actual: usize },

    /// A benchmark report exceeded the fixed result bound.
    #[error("Result of {len} bytes exceeds the {limit}-byte bound")]
    ResultTooLong { len: usize, limit: usize },

    /// A log line or user input could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for gpu-watch operations.
pub type Result<T> = std::result::Result<T, Error>;
