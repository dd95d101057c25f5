use std::fmt;

use anyhow::Result;
use serde::Serialize;
use toolkit_device::{DeviceKind, Runtime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEntry {
    pub kind: &'static str,
    pub backend: Option<String>,
    pub available: bool,
    pub allocated_bytes: usize,
    pub cached_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub selected: &'static str,
    pub devices: Vec<DeviceEntry>,
}

impl DeviceReport {
    pub fn collect(rt: &Runtime) -> Result<DeviceReport> {
        let mut devices = vec![];
        for &kind in DeviceKind::all() {
            let slot = rt.slot(kind);
            let stats = slot.as_ref().map(|s| s.allocator().stats()).unwrap_or_default();
            devices.push(DeviceEntry {
                kind: kind.tag(),
                backend: slot.as_ref().map(|s| s.backend().name().to_string()),
                available: rt.is_available(kind)?,
                allocated_bytes: stats.allocated_bytes,
                cached_bytes: stats.cached_bytes,
            });
        }
        Ok(DeviceReport { selected: rt.device_name()?, devices })
    }
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Selected device: {}", self.selected)?;
        for entry in &self.devices {
            writeln!(
                f,
                " * {:<12} {:<16} {:<14} allocated: {} cached: {}",
                entry.kind,
                entry.backend.as_deref().unwrap_or("-"),
                if entry.available { "available" } else { "not available" },
                entry.allocated_bytes,
                entry.cached_bytes,
            )?;
        }
        Ok(())
    }
}
