//! In-process stand-in for an accelerator runtime.
//!
//! Clones share their state, so a caller can register one clone with a
//! [`crate::Runtime`] and keep another to flip availability around.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, bail};

use crate::backend::{Backend, DeviceBuffer};
use crate::cpu::HostBuffer;
use crate::kind::DeviceKind;

#[derive(Debug, Default)]
struct SimulatedState {
    available: AtomicBool,
    unreachable: AtomicBool,
    synchronizations: AtomicUsize,
    seeds: Mutex<Vec<u64>>,
}

#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    kind: DeviceKind,
    name: String,
    state: Arc<SimulatedState>,
}

impl SimulatedBackend {
    pub fn new(kind: DeviceKind, available: bool) -> SimulatedBackend {
        let state = SimulatedState { available: AtomicBool::new(available), ..Default::default() };
        SimulatedBackend { kind, name: format!("simulated-{kind}"), state: Arc::new(state) }
    }

    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Make availability probes fail, as a missing driver would.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Seeds received through [`Backend::seed`], oldest first.
    pub fn seeds(&self) -> Vec<u64> {
        self.state.seeds.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn synchronizations(&self) -> usize {
        self.state.synchronizations.load(Ordering::SeqCst)
    }
}

impl Backend for SimulatedBackend {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> Result<bool> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            bail!("{} runtime is unreachable", self.name)
        }
        Ok(self.state.available.load(Ordering::SeqCst))
    }

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceBuffer>> {
        Ok(Box::new(HostBuffer::zeroed(len)))
    }

    fn synchronize(&self) -> Result<()> {
        self.state.synchronizations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn seed(&self, seed: u64) -> Result<()> {
        self.state.seeds.lock().unwrap_or_else(PoisonError::into_inner).push(seed);
        Ok(())
    }
}
