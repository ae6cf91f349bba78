// Common error types and result aliases for device and host readers.

use std::fmt;
use std::io;

use nvml_wrapper::error::NvmlError;

#[derive(Debug)]
pub enum DeviceError {
    Io(io::Error),
    Nvml(NvmlError),
    /// The reader has no value for this metric key.
    Unsupported(String),
    /// Device index outside `0..device_count`.
    NoSuchDevice(usize),
    ParseError(String),
    Other(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Io(e) => write!(f, "IO error: {e}"),
            DeviceError::Nvml(e) => write!(f, "NVML error: {e}"),
            DeviceError::Unsupported(key) => write!(f, "Metric not supported: {key}"),
            DeviceError::NoSuchDevice(index) => write!(f, "No device with index {index}"),
            DeviceError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            DeviceError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Io(e) => Some(e),
            DeviceError::Nvml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DeviceError {
    fn from(value: io::Error) -> Self {
        DeviceError::Io(value)
    }
}

impl From<NvmlError> for DeviceError {
    fn from(value: NvmlError) -> Self {
        DeviceError::Nvml(value)
    }
}
