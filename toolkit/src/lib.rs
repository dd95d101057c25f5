//! # toolkit
//!
//! Small helpers to run numeric code on the best device at hand:
//!
//! ```no_run
//! use toolkit::device_utils;
//!
//! # fn main() -> anyhow::Result<()> {
//! device_utils::manual_seed(42)?;
//! println!("running on {}", device_utils::device_name()?);
//! {
//!     let _autocast = device_utils::autocast()?;
//!     // reduced precision here
//! }
//! device_utils::empty_cache()?;
//! # Ok(())
//! # }
//! ```
//!
//! Devices are tried in a fixed order: Metal (Apple targets), then CUDA,
//! then the host processor.

pub mod device_utils;

pub use toolkit_device::{
    Autocast, AutocastGuard, DeviceKind, MemoryStats, Precision, Runtime, anyhow,
    current_precision,
};

pub mod prelude {
    pub use crate::device_utils::{
        autocast, device_name, empty_cache, get_device, is_general_available,
        is_specialized_available, manual_seed,
    };
    pub use toolkit_device::prelude::*;
}
