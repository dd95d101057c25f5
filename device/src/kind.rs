use std::fmt;
use std::str::FromStr;

use anyhow::bail;

use crate::precision::Precision;

/// Class of compute device, in selection priority order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKind {
    /// Vendor-specific unified-memory accelerator (Metal).
    Specialized,
    /// General-purpose parallel accelerator (CUDA).
    General,
    /// Host processor, always available.
    Fallback,
}

impl DeviceKind {
    /// Every kind, highest priority first.
    pub fn all() -> &'static [DeviceKind] {
        &[DeviceKind::Specialized, DeviceKind::General, DeviceKind::Fallback]
    }

    /// Accelerator kinds, highest priority first.
    pub fn accelerators() -> &'static [DeviceKind] {
        &[DeviceKind::Specialized, DeviceKind::General]
    }

    pub fn tag(&self) -> &'static str {
        match self {
            DeviceKind::Specialized => "specialized",
            DeviceKind::General => "general",
            DeviceKind::Fallback => "fallback",
        }
    }

    pub fn is_accelerator(&self) -> bool {
        *self != DeviceKind::Fallback
    }

    /// Precision an autocast context uses on this kind when none is given.
    pub fn default_autocast_precision(&self) -> Precision {
        match self {
            DeviceKind::Specialized | DeviceKind::General => Precision::F16,
            DeviceKind::Fallback => Precision::BF16,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DeviceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "specialized" => Ok(DeviceKind::Specialized),
            "general" => Ok(DeviceKind::General),
            "fallback" => Ok(DeviceKind::Fallback),
            _ => bail!("Unknown device kind: {s}"),
        }
    }
}
