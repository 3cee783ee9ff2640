use serde::Serialize;
use sysinfo::System;

/// Capacity of the machine generating the load.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HostInfo {
    pub cpu_cores: u64,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
}

pub fn get_hardware_info() -> HostInfo {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();

    HostInfo {
        cpu_cores: sys.cpus().len() as u64,
        total_memory_bytes: sys.total_memory(),
        available_memory_bytes: sys.available_memory(),
    }
}

impl HostInfo {
    pub fn total_memory_mib(&self) -> u64 {
        self.total_memory_bytes / (1024 * 1024)
    }

    pub fn available_memory_mib(&self) -> u64 {
        self.available_memory_bytes / (1024 * 1024)
    }
}
