//! Compute device specification and scanning.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Cpu,
    Gpu,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// A single compute device, addressed by type and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub device_type: DeviceType,
    pub id: usize,
}

impl DeviceSpec {
    pub fn cpu(id: usize) -> Self {
        Self {
            device_type: DeviceType::Cpu,
            id,
        }
    }

    pub fn gpu(id: usize) -> Self {
        Self {
            device_type: DeviceType::Gpu,
            id,
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_type, self.id)
    }
}

/// Device scanning collaborator.
///
/// Implementations report the devices the current process can address.
pub trait DeviceScanner: Send + Sync {
    /// Enumerate the devices available to this process.
    fn scan_available_devices(&self) -> Vec<DeviceSpec>;

    /// Whether every spec in `specs` is among the available devices.
    fn devices_exist(&self, specs: &[DeviceSpec]) -> bool {
        let available = self.scan_available_devices();
        specs.iter().all(|spec| available.contains(spec))
    }
}

/// Scanner reporting the devices of the host.
///
/// The CPU is always present. A GPU is reported on Apple Silicon, where the
/// unified-memory GPU is unconditionally addressable.
pub struct HostDeviceScanner;

impl DeviceScanner for HostDeviceScanner {
    fn scan_available_devices(&self) -> Vec<DeviceSpec> {
        let mut devices = vec![DeviceSpec::cpu(0)];
        if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            devices.push(DeviceSpec::gpu(0));
        }
        devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticScanner(Vec<DeviceSpec>);

    impl DeviceScanner for StaticScanner {
        fn scan_available_devices(&self) -> Vec<DeviceSpec> {
            self.0.clone()
        }
    }

    #[test]
    fn test_spec_display() {
        assert_eq!(DeviceSpec::cpu(0).to_string(), "cpu:0");
        assert_eq!(DeviceSpec::gpu(1).to_string(), "gpu:1");
    }

    #[test]
    fn test_devices_exist() {
        let scanner = StaticScanner(vec![DeviceSpec::cpu(0), DeviceSpec::gpu(0)]);
        assert!(scanner.devices_exist(&[DeviceSpec::gpu(0)]));
        assert!(scanner.devices_exist(&[DeviceSpec::cpu(0), DeviceSpec::gpu(0)]));
        assert!(!scanner.devices_exist(&[DeviceSpec::gpu(1)]));
    }

    #[test]
    fn test_host_scanner_reports_cpu() {
        let devices = HostDeviceScanner.scan_available_devices();
        assert!(devices.contains(&DeviceSpec::cpu(0)));
    }
}
