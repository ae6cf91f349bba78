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

pub mod error;
pub mod mock;
pub mod nvidia;
pub mod reader_factory;
pub mod traits;
pub mod types;

// Host CPU readers
pub mod cpu_generic;
pub mod cpu_linux;

pub use error::{DeviceError, DeviceResult};
pub use reader_factory::{get_device_reader, get_host_reader};
pub use traits::{DeviceReader, HostReader};
pub use types::{DeviceProperties, MemoryInfo, Overview};

/// Static description of every device for the overview panel.
pub fn describe_devices(reader: &dyn DeviceReader) -> Vec<DeviceProperties> {
    (0..reader.device_count())
        .map(|index| {
            let memory = reader.get_memory_info(index).ok();
            DeviceProperties {
                index,
                name: reader.get_device_name(index),
                persistence_enabled: reader.persistence_enabled(index),
                memory,
                total_memory_gib: memory.map(|m| m.total_gib()),
                processes: reader.get_process_info(index).unwrap_or_default(),
            }
        })
        .collect()
}
