use std::collections::HashMap;
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};

use crate::backend::{Backend, DeviceBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, new)]
pub struct MemoryStats {
    /// Bytes held by live allocations.
    pub allocated_bytes: usize,
    /// Bytes held in the cache, ready for reuse.
    pub cached_bytes: usize,
}

impl MemoryStats {
    pub fn reserved_bytes(&self) -> usize {
        self.allocated_bytes + self.cached_bytes
    }
}

#[derive(Debug, Default)]
struct Pool {
    free_blocks: HashMap<usize, Vec<Box<dyn DeviceBuffer>>>,
    stats: MemoryStats,
}

fn lock(pool: &Mutex<Pool>) -> MutexGuard<'_, Pool> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-device allocator keeping released blocks around for reuse.
///
/// Blocks are keyed by their exact byte length. Dropping an [`Allocation`]
/// hands its block back to the cache, [`CachingAllocator::release_cached`]
/// gives cached blocks back to the device.
#[derive(Debug, Clone, Default)]
pub struct CachingAllocator {
    pool: Arc<Mutex<Pool>>,
}

impl CachingAllocator {
    pub fn allocate(&self, backend: &dyn Backend, len: usize) -> Result<Allocation> {
        {
            let mut pool = lock(&self.pool);
            let reused = pool.free_blocks.get_mut(&len).and_then(|blocks| blocks.pop());
            if let Some(buffer) = reused {
                pool.stats.cached_bytes -= len;
                pool.stats.allocated_bytes += len;
                log::trace!("Reusing cached block of {len} bytes on {}", backend.name());
                return Ok(Allocation::new(buffer, &self.pool));
            }
        }
        let buffer = backend
            .allocate(len)
            .with_context(|| format!("Allocating {len} bytes on {}", backend.name()))?;
        lock(&self.pool).stats.allocated_bytes += len;
        Ok(Allocation::new(buffer, &self.pool))
    }

    /// Frees every cached block. Live allocations are not affected.
    ///
    /// Returns the number of bytes released.
    pub fn release_cached(&self) -> usize {
        let (free_blocks, released) = {
            let mut pool = lock(&self.pool);
            let released = std::mem::take(&mut pool.stats.cached_bytes);
            (std::mem::take(&mut pool.free_blocks), released)
        };
        // device memory is given back outside the lock
        drop(free_blocks);
        released
    }

    pub fn stats(&self) -> MemoryStats {
        lock(&self.pool).stats
    }
}

/// A live block handed out by a [`CachingAllocator`].
pub struct Allocation {
    buffer: ManuallyDrop<Box<dyn DeviceBuffer>>,
    pool: Arc<Mutex<Pool>>,
}

impl Allocation {
    fn new(buffer: Box<dyn DeviceBuffer>, pool: &Arc<Mutex<Pool>>) -> Allocation {
        Allocation { buffer: ManuallyDrop::new(buffer), pool: Arc::clone(pool) }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &dyn DeviceBuffer {
        self.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> &mut dyn DeviceBuffer {
        self.buffer.as_mut()
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.copy_from_host(data)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; self.len()];
        self.buffer.copy_to_host(&mut bytes)?;
        Ok(bytes)
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Allocation({:?})", self.buffer.info())
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        // SAFETY: the buffer is taken exactly once, here, and never used again
        let buffer = unsafe { ManuallyDrop::take(&mut self.buffer) };
        let len = buffer.len();
        let mut pool = lock(&self.pool);
        pool.stats.allocated_bytes -= len;
        pool.stats.cached_bytes += len;
        pool.free_blocks.entry(len).or_default().push(buffer);
    }
}
