use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result, bail, ensure};

use crate::autocast::{Autocast, AutocastGuard};
use crate::backend::Backend;
use crate::cpu::CpuBackend;
use crate::kind::DeviceKind;
use crate::memory::{Allocation, CachingAllocator, MemoryStats};
use crate::random::Generator;

/// A backend together with the memory cache and generator the runtime
/// keeps for it.
#[derive(Debug)]
pub struct DeviceSlot {
    backend: Arc<dyn Backend>,
    allocator: CachingAllocator,
    generator: Generator,
}

impl DeviceSlot {
    fn new(backend: Arc<dyn Backend>) -> DeviceSlot {
        DeviceSlot {
            backend,
            allocator: CachingAllocator::default(),
            generator: Generator::default(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn allocator(&self) -> &CachingAllocator {
        &self.allocator
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    fn reseed(&self, seed: u64) -> Result<()> {
        self.generator.manual_seed(seed);
        self.backend.seed(seed)?;
        log::debug!("Seeded {} generator ({}) with {seed}", self.kind(), self.backend.name());
        Ok(())
    }

    fn release_cached(&self) -> usize {
        let released = self.allocator.release_cached();
        log::debug!(
            "Released {released} cached bytes on {} device ({})",
            self.kind(),
            self.backend.name()
        );
        released
    }
}

/// Process-wide device state: registered backends, their memory caches and
/// their generators.
///
/// The host processor is always present as the [`DeviceKind::Fallback`]
/// device. Accelerators are registered by their backend crates and probed
/// in priority order every time a helper needs to pick one.
#[derive(Debug)]
pub struct Runtime {
    host: Arc<DeviceSlot>,
    accelerators: RwLock<Vec<Arc<DeviceSlot>>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime {
            host: Arc::new(DeviceSlot::new(Arc::new(CpuBackend))),
            accelerators: RwLock::new(vec![]),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<DeviceSlot>>> {
        self.accelerators.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<DeviceSlot>>> {
        self.accelerators.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, backend: Box<dyn Backend>) -> Result<()> {
        let kind = backend.kind();
        let mut accelerators = self.write();
        if let Some(existing) = accelerators.iter().find(|slot| slot.kind() == kind) {
            bail!("A {kind} backend is already registered ({})", existing.backend.name())
        }
        Self::insert(&mut accelerators, backend)
    }

    /// Registers `backend` unless its kind already has one, in which case the
    /// existing backend is kept. Returns whether `backend` was registered.
    pub fn register_if_absent(&self, backend: Box<dyn Backend>) -> Result<bool> {
        let kind = backend.kind();
        if kind.is_accelerator() && self.is_registered(kind) {
            return Ok(false);
        }
        let mut accelerators = self.write();
        if accelerators.iter().any(|slot| slot.kind() == kind) {
            return Ok(false);
        }
        Self::insert(&mut accelerators, backend)?;
        Ok(true)
    }

    fn insert(accelerators: &mut Vec<Arc<DeviceSlot>>, backend: Box<dyn Backend>) -> Result<()> {
        let kind = backend.kind();
        ensure!(kind.is_accelerator(), "The {kind} device is provided by the host backend");
        log::debug!("Registered {} backend for {kind} device", backend.name());
        accelerators.push(Arc::new(DeviceSlot::new(Arc::from(backend))));
        accelerators.sort_by_key(|slot| slot.kind());
        Ok(())
    }

    pub fn is_registered(&self, kind: DeviceKind) -> bool {
        self.slot(kind).is_some()
    }

    pub fn slot(&self, kind: DeviceKind) -> Option<Arc<DeviceSlot>> {
        if kind == DeviceKind::Fallback {
            Some(Arc::clone(&self.host))
        } else {
            self.read().iter().find(|slot| slot.kind() == kind).cloned()
        }
    }

    /// Registered accelerators, highest priority first.
    pub fn accelerators(&self) -> Vec<Arc<DeviceSlot>> {
        self.read().clone()
    }

    /// Asks the backend afresh. A kind with no registered backend is not
    /// available.
    pub fn is_available(&self, kind: DeviceKind) -> Result<bool> {
        match self.slot(kind) {
            Some(slot) => slot.backend.is_available(),
            None => Ok(false),
        }
    }

    fn first_available_accelerator(&self) -> Result<Option<Arc<DeviceSlot>>> {
        for slot in self.accelerators() {
            if slot.backend.is_available()? {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Best available device: specialized, then general, then fallback.
    pub fn select_device(&self) -> Result<DeviceKind> {
        let kind = self
            .first_available_accelerator()?
            .map(|slot| slot.kind())
            .unwrap_or(DeviceKind::Fallback);
        log::debug!("Selected {kind} device");
        Ok(kind)
    }

    pub fn device_name(&self) -> Result<&'static str> {
        Ok(self.select_device()?.tag())
    }

    /// Releases cached host blocks, then synchronizes the best available
    /// accelerator and releases its cached blocks.
    ///
    /// Returns the number of bytes given back.
    pub fn empty_cache(&self) -> Result<usize> {
        let mut released = self.host.release_cached();
        if let Some(slot) = self.first_available_accelerator()? {
            slot.backend.synchronize()?;
            released += slot.release_cached();
        }
        Ok(released)
    }

    /// Reseeds the default generator and the best available accelerator's.
    pub fn manual_seed(&self, seed: u64) -> Result<()> {
        self.host.reseed(seed)?;
        if let Some(slot) = self.first_available_accelerator()? {
            slot.reseed(seed)?;
        }
        Ok(())
    }

    /// Reseeds the default generator and every registered accelerator's,
    /// available or not.
    pub fn manual_seed_all(&self, seed: u64) -> Result<()> {
        self.host.reseed(seed)?;
        for slot in self.accelerators() {
            slot.reseed(seed)?;
        }
        Ok(())
    }

    pub fn default_generator(&self) -> &Generator {
        &self.host.generator
    }

    /// Mixed-precision context on the selected device, at that device's
    /// default precision.
    pub fn autocast(&self) -> Result<AutocastGuard> {
        Ok(Autocast::new(self.select_device()?).enter())
    }

    pub fn autocast_scope<R, F: FnOnce() -> R>(&self, f: F) -> Result<R> {
        let _guard = self.autocast()?;
        Ok(f())
    }

    pub fn allocate(&self, kind: DeviceKind, len: usize) -> Result<Allocation> {
        let slot =
            self.slot(kind).with_context(|| format!("No backend registered for {kind} device"))?;
        ensure!(
            slot.backend.is_available()?,
            "{kind} device ({}) is not available",
            slot.backend.name()
        );
        slot.allocator.allocate(slot.backend(), len)
    }

    pub fn memory_stats(&self, kind: DeviceKind) -> Result<MemoryStats> {
        let slot =
            self.slot(kind).with_context(|| format!("No backend registered for {kind} device"))?;
        Ok(slot.allocator.stats())
    }

    pub fn synchronize(&self, kind: DeviceKind) -> Result<()> {
        match self.slot(kind) {
            Some(slot) => slot.backend.synchronize(),
            None => bail!("No backend registered for {kind} device"),
        }
    }
}

lazy_static::lazy_static! {
    static ref RUNTIME: Runtime = Runtime::new();
}

/// The process-wide runtime.
pub fn runtime() -> &'static Runtime {
    &RUNTIME
}
