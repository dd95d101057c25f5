//! Metal backend: the specialized accelerator on Apple hardware.
#![cfg(any(target_os = "macos", target_os = "ios"))]

pub mod context;

pub use crate::context::{MetalBackend, MetalBuffer};
