//! CUDA backend: the general accelerator.
//!
//! The driver is loaded dynamically, so this crate builds and runs on hosts
//! without CUDA, where the backend simply reports itself unavailable.

mod context;
mod utils;

pub use crate::context::{CudaBackend, CudaBuffer};
pub use crate::utils::cuda_driver_present;
