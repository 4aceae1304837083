//! GcVault - reference-counted pinning of host objects.
//!
//! A host wrapper that is only reachable from native state must not be
//! collected. The vault keeps a per-handle pin count in a side table and
//! drives the host runtime's root-registration primitive on the 0→1 and
//! 1→0 edges. Pins must be balanced (the same native object can be pinned
//! from multiple concurrently active call frames), which is why this is a
//! count and never a naive toggle.
//!
//! The vault itself must be reachable from the host's GC root set; the
//! [`GcVault::mark`] hook walks the side table so a mark-phase collector
//! can treat every pinned handle as live.

use rustc_hash::FxHashMap;

use crate::host::{HostHandle, HostRuntime};

/// Side table of pinned host handles.
#[derive(Default)]
pub struct GcVault {
    pins: FxHashMap<HostHandle, u32>,
}

impl GcVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the pin count; roots the handle on the first pin.
    pub fn pin(&mut self, host: &dyn HostRuntime, handle: HostHandle) {
        let count = self.pins.entry(handle).or_insert(0);
        *count += 1;
        if *count == 1 {
            host.gc_root(handle, true);
        }
    }

    /// Decrement the pin count; unroots the handle when it reaches zero.
    ///
    /// Returns false on an unbalanced unpin, which callers report as a
    /// diagnostic rather than a failure.
    pub fn unpin(&mut self, host: &dyn HostRuntime, handle: HostHandle) -> bool {
        match self.pins.get_mut(&handle) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.pins.remove(&handle);
                host.gc_root(handle, false);
                true
            }
            None => false,
        }
    }

    /// Current pin count of a handle.
    pub fn pin_count(&self, handle: HostHandle) -> u32 {
        self.pins.get(&handle).copied().unwrap_or(0)
    }

    /// True if any handle is pinned.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Mark-phase hook: visit every pinned handle.
    pub fn mark(&self, mut visit: impl FnMut(HostHandle)) {
        for handle in self.pins.keys() {
            visit(*handle);
        }
    }
}
