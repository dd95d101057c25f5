use anyhow::{Result, ensure};

use crate::backend::{Backend, DeviceBuffer};
use crate::kind::DeviceKind;

/// Host processor backend. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Fallback
    }

    fn name(&self) -> &str {
        "cpu"
    }

    fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceBuffer>> {
        Ok(Box::new(HostBuffer::zeroed(len)))
    }
}

/// Buffer living in host memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBuffer {
    data: Vec<u8>,
}

impl HostBuffer {
    pub fn zeroed(len: usize) -> HostBuffer {
        HostBuffer { data: vec![0; len] }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl DeviceBuffer for HostBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn info(&self) -> String {
        format!("host buffer of {} bytes at {:p}", self.data.len(), self.data.as_ptr())
    }

    fn copy_from_host(&mut self, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() == self.data.len(),
            "Host copy of {} bytes into a buffer of {} bytes",
            data.len(),
            self.data.len()
        );
        self.data.copy_from_slice(data);
        Ok(())
    }

    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(
            dst.len() == self.data.len(),
            "Host read of {} bytes from a buffer of {} bytes",
            dst.len(),
            self.data.len()
        );
        dst.copy_from_slice(&self.data);
        Ok(())
    }
}
