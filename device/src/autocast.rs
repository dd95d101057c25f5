//! Mixed-precision execution contexts.
//!
//! Active states are kept on a thread-local stack. Entering a context pushes
//! its state, dropping the guard removes that same entry wherever it sits,
//! so an early return, a panic or guards dropped out of order never leak a
//! reduced precision.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

use crate::kind::DeviceKind;
use crate::precision::Precision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct AutocastState {
    pub device: DeviceKind,
    pub precision: Precision,
    pub enabled: bool,
}

thread_local! {
    static TLS_AUTOCAST: RefCell<Vec<(u64, AutocastState)>> = const { RefCell::new(Vec::new()) };
    static TLS_NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// State of the innermost active context on this thread, if any.
pub fn current_autocast() -> Option<AutocastState> {
    TLS_AUTOCAST.with_borrow(|stack| stack.last().map(|(_, state)| *state))
}

/// Precision operations on `device` should run at on this thread.
pub fn current_precision(device: DeviceKind) -> Precision {
    match current_autocast() {
        Some(state) if state.enabled && state.device == device => state.precision,
        _ => Precision::F32,
    }
}

/// Round `xs` in place to the precision currently in effect for `device`.
pub fn autocast_cast(device: DeviceKind, xs: &mut [f32]) {
    current_precision(device).round_slice(xs)
}

/// Autocast context configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autocast {
    state: AutocastState,
}

impl Autocast {
    pub fn new(device: DeviceKind) -> Autocast {
        Autocast {
            state: AutocastState::new(device, device.default_autocast_precision(), true),
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Autocast {
        self.state.precision = precision;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Autocast {
        self.state.enabled = enabled;
        self
    }

    pub fn state(&self) -> AutocastState {
        self.state
    }

    pub fn enter(self) -> AutocastGuard {
        let id = TLS_NEXT_ID.replace(TLS_NEXT_ID.get() + 1);
        let previous = current_autocast();
        TLS_AUTOCAST.with_borrow_mut(|stack| stack.push((id, self.state)));
        log::trace!("Enter autocast {:?} (previous: {:?})", self.state, previous);
        AutocastGuard { id, state: self.state, _not_send: PhantomData }
    }

    pub fn scope<R, F: FnOnce() -> R>(self, f: F) -> R {
        let _guard = self.enter();
        f()
    }
}

/// Active autocast context. Dropping it ends this context only.
#[derive(Debug)]
#[must_use = "the autocast context ends as soon as the guard is dropped"]
pub struct AutocastGuard {
    id: u64,
    state: AutocastState,
    // the state lives in a thread local, the guard must stay on its thread
    _not_send: PhantomData<*const ()>,
}

impl AutocastGuard {
    pub fn state(&self) -> AutocastState {
        self.state
    }

    pub fn device(&self) -> DeviceKind {
        self.state.device
    }

    pub fn precision(&self) -> Precision {
        if self.state.enabled { self.state.precision } else { Precision::F32 }
    }
}

impl Drop for AutocastGuard {
    fn drop(&mut self) {
        TLS_AUTOCAST.with_borrow_mut(|stack| {
            if let Some(ix) = stack.iter().rposition(|(id, _)| *id == self.id) {
                stack.remove(ix);
            }
        });
        log::trace!("Exit autocast {:?} (restored: {:?})", self.state, current_autocast());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};

    #[test]
    fn guard_restores_ambient_state() {
        assert_eq!(current_autocast(), None);
        {
            let guard = Autocast::new(DeviceKind::General).enter();
            assert_eq!(guard.precision(), Precision::F16);
            assert_eq!(current_precision(DeviceKind::General), Precision::F16);
            assert_eq!(current_precision(DeviceKind::Fallback), Precision::F32);
        }
        assert_eq!(current_autocast(), None);
        assert_eq!(current_precision(DeviceKind::General), Precision::F32);
    }

    #[test]
    fn nested_contexts_unwind_in_order() {
        let _outer = Autocast::new(DeviceKind::Fallback).enter();
        assert_eq!(current_precision(DeviceKind::Fallback), Precision::BF16);
        {
            let _inner =
                Autocast::new(DeviceKind::Fallback).with_precision(Precision::F16).enter();
            assert_eq!(current_precision(DeviceKind::Fallback), Precision::F16);
            {
                let _off = Autocast::new(DeviceKind::Fallback).enabled(false).enter();
                assert_eq!(current_precision(DeviceKind::Fallback), Precision::F32);
            }
            assert_eq!(current_precision(DeviceKind::Fallback), Precision::F16);
        }
        assert_eq!(current_precision(DeviceKind::Fallback), Precision::BF16);
    }

    #[test]
    fn out_of_order_drops_leave_no_state() {
        let outer = Autocast::new(DeviceKind::General).enter();
        let inner = Autocast::new(DeviceKind::General).with_precision(Precision::BF16).enter();
        drop(outer);
        assert_eq!(current_precision(DeviceKind::General), Precision::BF16);
        drop(inner);
        assert_eq!(current_autocast(), None);
        assert_eq!(current_precision(DeviceKind::General), Precision::F32);
    }

    #[test]
    fn dropping_a_middle_guard_keeps_the_innermost() {
        let outer = Autocast::new(DeviceKind::Fallback).enter();
        let middle = Autocast::new(DeviceKind::Fallback).with_precision(Precision::F16).enter();
        let inner = Autocast::new(DeviceKind::Fallback).enabled(false).enter();
        drop(middle);
        assert_eq!(current_precision(DeviceKind::Fallback), Precision::F32);
        drop(inner);
        assert_eq!(current_precision(DeviceKind::Fallback), Precision::BF16);
        drop(outer);
        assert_eq!(current_autocast(), None);
    }

    #[test]
    fn restored_after_error() {
        fn failing() -> Result<()> {
            let _guard = Autocast::new(DeviceKind::Specialized).enter();
            assert_eq!(current_precision(DeviceKind::Specialized), Precision::F16);
            bail!("failure inside autocast")
        }
        assert!(failing().is_err());
        assert_eq!(current_autocast(), None);
    }

    #[test]
    fn restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            Autocast::new(DeviceKind::General).scope(|| panic!("panic inside autocast"))
        });
        assert!(result.is_err());
        assert_eq!(current_autocast(), None);
    }

    #[test]
    fn state_does_not_cross_threads() {
        let _guard = Autocast::new(DeviceKind::General).enter();
        let other = std::thread::spawn(|| current_precision(DeviceKind::General)).join().unwrap();
        assert_eq!(other, Precision::F32);
        assert_eq!(current_precision(DeviceKind::General), Precision::F16);
    }

    #[test]
    fn cast_follows_active_precision() {
        let mut xs = [1.0f32 + 1e-4];
        autocast_cast(DeviceKind::General, &mut xs);
        assert_eq!(xs, [1.0 + 1e-4]);
        Autocast::new(DeviceKind::General).scope(|| autocast_cast(DeviceKind::General, &mut xs));
        assert_eq!(xs, [1.0]);
    }
}
