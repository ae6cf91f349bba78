use crate::device::error::DeviceResult;
use crate::device::traits::{DeviceReader, HostReader};
use crate::device::{cpu_generic, mock, nvidia};

#[cfg(target_os = "linux")]
use crate::device::cpu_linux;

/// Pick the accelerator backend: simulated devices when `mock` is set,
/// NVML otherwise.
pub fn get_device_reader(mock: Option<usize>) -> DeviceResult<Box<dyn DeviceReader>> {
    match mock {
        Some(count) => {
            tracing::info!("Using {count} simulated device(s)");
            Ok(Box::new(mock::MockDeviceReader::new(count)))
        }
        None => Ok(Box::new(nvidia::NvidiaDeviceReader::new()?)),
    }
}

pub fn get_host_reader() -> Box<dyn HostReader> {
    #[cfg(target_os = "linux")]
    {
        if std::path::Path::new("/proc/stat").exists() {
            return Box::new(cpu_linux::LinuxCpuReader::new());
        }
    }
    Box::new(cpu_generic::SysinfoCpuReader::new())
}
