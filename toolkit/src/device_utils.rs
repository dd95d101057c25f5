//! Device helpers over the process-wide runtime.
//!
//! Every helper makes sure the backends compiled into this crate are
//! registered, then asks the runtime afresh: availability is never
//! remembered between calls.

use anyhow::Result;
use toolkit_device::{AutocastGuard, DeviceKind, MemoryStats, Runtime};

fn register_backends(rt: &Runtime) -> Result<()> {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        if rt.register_if_absent(Box::new(toolkit_metal::MetalBackend::new()))? {
            log::debug!("Metal backs the {} device", DeviceKind::Specialized);
        }
    }
    if rt.register_if_absent(Box::new(toolkit_cuda::CudaBackend::new()))? {
        log::debug!("CUDA backs the {} device", DeviceKind::General);
    }
    Ok(())
}

/// Registers the compiled-in backends with the process-wide runtime.
///
/// Called by every helper. Kinds that already have a backend are left
/// alone, so every caller gets the same outcome.
pub fn init() -> Result<()> {
    register_backends(toolkit_device::runtime())
}

fn runtime() -> Result<&'static Runtime> {
    init()?;
    Ok(toolkit_device::runtime())
}

/// Best available device: specialized accelerator, then general
/// accelerator, then the fallback processor.
pub fn get_device() -> Result<DeviceKind> {
    runtime()?.select_device()
}

pub fn is_specialized_available() -> Result<bool> {
    runtime()?.is_available(DeviceKind::Specialized)
}

pub fn is_general_available() -> Result<bool> {
    runtime()?.is_available(DeviceKind::General)
}

/// Tag of [`get_device`]: "specialized", "general" or "fallback".
pub fn device_name() -> Result<&'static str> {
    runtime()?.device_name()
}

/// Gives cached host memory back, then the best available accelerator's.
///
/// Live allocations are untouched. Returns the number of bytes released.
pub fn empty_cache() -> Result<usize> {
    runtime()?.empty_cache()
}

/// Seeds the default generator and the best available accelerator's.
pub fn manual_seed(seed: u64) -> Result<()> {
    runtime()?.manual_seed(seed)
}

/// Seeds the default generator and every registered accelerator's.
pub fn manual_seed_all(seed: u64) -> Result<()> {
    runtime()?.manual_seed_all(seed)
}

/// Enters a mixed-precision context on the best available device.
///
/// The previous precision mode comes back when the guard is dropped.
pub fn autocast() -> Result<AutocastGuard> {
    runtime()?.autocast()
}

pub fn autocast_scope<R, F: FnOnce() -> R>(f: F) -> Result<R> {
    runtime()?.autocast_scope(f)
}

pub fn memory_stats(kind: DeviceKind) -> Result<MemoryStats> {
    runtime()?.memory_stats(kind)
}

/// Waits for the best available device.
pub fn synchronize() -> Result<()> {
    let rt = runtime()?;
    rt.synchronize(rt.select_device()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use toolkit_device::sim::SimulatedBackend;
    use toolkit_device::{Precision, current_autocast, current_precision};

    // helpers share the process-wide runtime
    lazy_static::lazy_static! {
        static ref LOCK: Mutex<()> = Mutex::new(());
    }

    #[test]
    fn init_is_idempotent() -> Result<()> {
        let _lock = LOCK.lock().unwrap();
        init()?;
        init()?;
        assert!(toolkit_device::runtime().is_registered(DeviceKind::General));
        Ok(())
    }

    #[test]
    fn registration_is_shared_by_every_caller() -> Result<()> {
        let _lock = LOCK.lock().unwrap();
        let rt = Runtime::new();
        rt.register(Box::new(SimulatedBackend::new(DeviceKind::General, true)))?;
        register_backends(&rt)?;
        register_backends(&rt)?;
        assert_eq!(rt.slot(DeviceKind::General).unwrap().backend().name(), "simulated-general");
        let outcomes: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| init().is_ok())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(outcomes.iter().all(|ok| *ok));
        Ok(())
    }

    #[test]
    fn name_matches_selection() -> Result<()> {
        let _lock = LOCK.lock().unwrap();
        let kind = get_device()?;
        let name = device_name()?;
        assert!(["specialized", "general", "fallback"].contains(&name));
        assert_eq!(name, kind.tag());
        Ok(())
    }

    #[test]
    fn selection_follows_availability() -> Result<()> {
        let _lock = LOCK.lock().unwrap();
        let expected = if is_specialized_available()? {
            DeviceKind::Specialized
        } else if is_general_available()? {
            DeviceKind::General
        } else {
            DeviceKind::Fallback
        };
        assert_eq!(get_device()?, expected);
        Ok(())
    }

    #[test]
    fn seeding_is_reproducible() -> Result<()> {
        let _lock = LOCK.lock().unwrap();
        let generator = toolkit_device::runtime().default_generator();
        manual_seed(42)?;
        let first: Vec<f32> = (0..8).map(|_| generator.sample()).collect();
        manual_seed(42)?;
        let second: Vec<f32> = (0..8).map(|_| generator.sample()).collect();
        assert_eq!(first, second);
        manual_seed_all(42)?;
        let third: Vec<f32> = (0..8).map(|_| generator.sample()).collect();
        assert_eq!(first, third);
        Ok(())
    }

    #[test]
    fn empty_cache_keeps_live_memory() -> Result<()> {
        let _lock = LOCK.lock().unwrap();
        let kind = get_device()?;
        let rt = toolkit_device::runtime();
        let mut live = rt.allocate(kind, 3)?;
        live.write(&[10, 20, 30])?;
        drop(rt.allocate(kind, 1024)?);
        assert!(empty_cache()? >= 1024);
        assert_eq!(memory_stats(kind)?.cached_bytes, 0);
        assert!(memory_stats(kind)?.allocated_bytes >= 3);
        assert_eq!(live.to_vec()?, vec![10, 20, 30]);
        synchronize()
    }

    #[test]
    fn autocast_is_scoped() -> Result<()> {
        let _lock = LOCK.lock().unwrap();
        let kind = get_device()?;
        {
            let guard = autocast()?;
            assert_eq!(guard.device(), kind);
            assert_eq!(current_precision(kind), kind.default_autocast_precision());
        }
        assert_eq!(current_autocast(), None);
        assert_eq!(current_precision(kind), Precision::F32);
        let inside = autocast_scope(|| current_precision(kind))?;
        assert!(inside.is_reduced());
        assert_eq!(current_precision(kind), Precision::F32);
        Ok(())
    }
}
