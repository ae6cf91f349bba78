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

pub mod data_collector;
pub mod display;
pub mod frame;
pub mod runner;
pub mod selection;

pub use data_collector::{lock_reader, share_reader, Sampler, SamplerHandle, SharedDeviceReader};
pub use display::{DisplayAdapter, RetryPolicy};
pub use frame::{Frame, Series, Subplot, YRange};
pub use runner::{run_bench_mode, run_record_mode};
pub use selection::{parse_selection, DeviceSelection, SelectionUpdate};
