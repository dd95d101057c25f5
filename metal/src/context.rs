use std::ops::Deref;
use std::sync::OnceLock;

use anyhow::{Context, Result, ensure};
use metal::{Buffer, Device, MTLResourceOptions, NSUInteger};
use toolkit_device::{Backend, DeviceBuffer, DeviceKind};

/// Unified-memory accelerator backed by the system default Metal device.
#[derive(Debug, Default)]
pub struct MetalBackend {
    device: OnceLock<Device>,
}

impl MetalBackend {
    pub fn new() -> MetalBackend {
        MetalBackend::default()
    }

    pub fn device(&self) -> Result<&Device> {
        if let Some(device) = self.device.get() {
            return Ok(device);
        }
        let device = Device::system_default()
            .with_context(|| "Could not find system default Metal device")?;
        log::debug!("Using Metal device {}", device.name());
        Ok(self.device.get_or_init(|| device))
    }
}

impl Backend for MetalBackend {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Specialized
    }

    fn name(&self) -> &str {
        "metal"
    }

    fn is_available(&self) -> Result<bool> {
        Ok(Device::system_default().is_some())
    }

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceBuffer>> {
        // Metal refuses zero sized buffers
        let size = len.max(1) as NSUInteger;
        let inner = self.device()?.new_buffer(size, MTLResourceOptions::StorageModeShared);
        Ok(Box::new(MetalBuffer { inner, len }))
    }
}

pub struct MetalBuffer {
    inner: Buffer,
    len: usize,
}

impl Deref for MetalBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DeviceBuffer for MetalBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn info(&self) -> String {
        format!("{:?} ({} bytes)", self.inner, self.len)
    }

    fn copy_from_host(&mut self, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() == self.len,
            "Copy of {} bytes into a {} bytes Metal buffer",
            data.len(),
            self.len
        );
        // SAFETY: shared storage is host visible and holds at least `len` bytes
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.inner.contents() as *mut u8,
                self.len,
            )
        };
        Ok(())
    }

    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(
            dst.len() == self.len,
            "Read of {} bytes from a {} bytes Metal buffer",
            dst.len(),
            self.len
        );
        // SAFETY: as above
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.inner.contents() as *const u8,
                dst.as_mut_ptr(),
                self.len,
            )
        };
        Ok(())
    }
}
