//! Device runtime behind the toolkit helpers.
//!
//! A [`Runtime`] owns the host processor backend and whichever accelerator
//! backends were registered with it, plus one caching allocator and one
//! generator per device. The process-wide instance is [`runtime()`].

#[macro_use]
extern crate derive_new;

pub mod autocast;
pub mod backend;
pub mod cpu;
pub mod kind;
pub mod memory;
pub mod precision;
pub mod random;
pub mod runtime;
pub mod sim;

pub use anyhow;

pub use crate::autocast::{
    Autocast, AutocastGuard, AutocastState, autocast_cast, current_autocast, current_precision,
};
pub use crate::backend::{Backend, DeviceBuffer};
pub use crate::kind::DeviceKind;
pub use crate::memory::{Allocation, CachingAllocator, MemoryStats};
pub use crate::precision::Precision;
pub use crate::random::Generator;
pub use crate::runtime::{DeviceSlot, Runtime, runtime};

pub mod prelude {
    pub use crate::{
        Allocation, Autocast, AutocastGuard, DeviceKind, MemoryStats, Precision, Runtime,
        runtime,
    };
}
