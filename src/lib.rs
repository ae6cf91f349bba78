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

//! Live GPU and host telemetry sampling with ring-buffered history.
//!
//! A [`view::Sampler`] polls the device and host readers into a
//! [`metrics::MetricStore`]. Two independent consumers read it through their
//! own cursors: the [`view::DisplayAdapter`] that builds chart frames for the
//! HTTP API, and the [`recorder::FileLogger`] that appends a flat text log.
//! Benchmarks run beside them in [`benchmark::BenchmarkRunner`].

pub mod api;
pub mod app_state;
pub mod benchmark;
pub mod cli;
pub mod common;
pub mod device;
pub mod error;
pub mod metrics;
pub mod recorder;
pub mod utils;
pub mod view;

pub use error::{Error, Result};
