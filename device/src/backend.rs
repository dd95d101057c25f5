use std::fmt;

use anyhow::Result;
use downcast_rs::{Downcast, impl_downcast};

use crate::kind::DeviceKind;

/// A device runtime the helpers dispatch to.
///
/// Implementations must not cache availability: `is_available` is called
/// every time a caller needs to know, and its answer is used as is.
pub trait Backend: Downcast + fmt::Debug + Send + Sync {
    fn kind(&self) -> DeviceKind;

    /// Runtime name of the backend ("metal", "cuda", "cpu", ...).
    fn name(&self) -> &str;

    /// Fails only when the runtime itself cannot be queried.
    fn is_available(&self) -> Result<bool>;

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceBuffer>>;

    /// Wait for all work queued on the device to complete.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    /// Hook called after the device generator is reseeded.
    fn seed(&self, _seed: u64) -> Result<()> {
        Ok(())
    }
}

impl_downcast!(Backend);

/// A raw, fixed-length device allocation.
pub trait DeviceBuffer: Downcast + Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn info(&self) -> String;

    /// Overwrite the whole buffer. `data` must be exactly `len()` bytes.
    fn copy_from_host(&mut self, data: &[u8]) -> Result<()>;

    /// Read the whole buffer. `dst` must be exactly `len()` bytes.
    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()>;
}

impl_downcast!(DeviceBuffer);

impl fmt::Debug for dyn DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceBuffer: {:?}", self.info())
    }
}
