use std::sync::{Arc, OnceLock};

use anyhow::{Result, bail, ensure};
use cudarc::driver::sys::CUresult;
use cudarc::driver::{CudaContext, CudaSlice, CudaStream, DriverError};
use toolkit_device::{Backend, DeviceBuffer, DeviceKind};

use crate::utils::cuda_driver_present;

/// General-purpose accelerator: CUDA device 0, driver loaded at runtime.
#[derive(Debug, Default)]
pub struct CudaBackend {
    context: OnceLock<Arc<CudaContext>>,
}

impl CudaBackend {
    pub fn new() -> CudaBackend {
        CudaBackend::default()
    }

    pub fn context(&self) -> Result<&Arc<CudaContext>> {
        if let Some(context) = self.context.get() {
            return Ok(context);
        }
        if !cuda_driver_present() {
            bail!("CUDA driver not found")
        }
        let context = CudaContext::new(0)?;
        log::debug!("Created CUDA context on device {}", context.ordinal());
        Ok(self.context.get_or_init(|| context))
    }
}

impl Backend for CudaBackend {
    fn kind(&self) -> DeviceKind {
        DeviceKind::General
    }

    fn name(&self) -> &str {
        "cuda"
    }

    fn is_available(&self) -> Result<bool> {
        if !cuda_driver_present() {
            return Ok(false);
        }
        match cudarc::driver::result::init() {
            Ok(()) => {}
            Err(DriverError(CUresult::CUDA_ERROR_NO_DEVICE)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        Ok(cudarc::driver::result::device::get_count()? > 0)
    }

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceBuffer>> {
        let stream = self.context()?.default_stream();
        // cuMemAlloc rejects zero sized allocations
        let slice = stream.alloc_zeros::<u8>(len.max(1))?;
        Ok(Box::new(CudaBuffer { stream, slice, len }))
    }

    fn synchronize(&self) -> Result<()> {
        // nothing can be queued before the context exists
        if let Some(context) = self.context.get() {
            context.default_stream().synchronize()?;
        }
        Ok(())
    }
}

pub struct CudaBuffer {
    stream: Arc<CudaStream>,
    slice: CudaSlice<u8>,
    len: usize,
}

impl CudaBuffer {
    pub fn slice(&self) -> &CudaSlice<u8> {
        &self.slice
    }
}

impl DeviceBuffer for CudaBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn info(&self) -> String {
        format!("CUDA buffer of {} bytes", self.len)
    }

    fn copy_from_host(&mut self, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() == self.len,
            "Copy of {} bytes into a {} bytes CUDA buffer",
            data.len(),
            self.len
        );
        if self.len > 0 {
            self.stream.memcpy_htod(data, &mut self.slice)?;
        }
        Ok(())
    }

    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(
            dst.len() == self.len,
            "Read of {} bytes from a {} bytes CUDA buffer",
            dst.len(),
            self.len
        );
        if self.len > 0 {
            self.stream.memcpy_dtoh(&self.slice, dst)?;
        }
        Ok(())
    }
}
