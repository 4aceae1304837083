//! Object proxies - the per-object binding between a host wrapper and a
//! native instance.
//!
//! Every host wrapper bound to a native object is tracked by exactly one
//! [`Proxy`]: which native instance (if any) backs the wrapper, who owns
//! the native lifetime, const-ness, the resolved callback overrides of the
//! wrapper's host class, and the signal connections made on this object.
//!
//! Proxies are rows in a [`ProxyTable`] owned by the bridge; the state
//! transitions themselves (attach, detach, destroy, lifecycle events) are
//! bridge operations because they touch the instance table, the GC vault
//! and the host runtime at once.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::class::MethodDescriptor;
use crate::host::HostHandle;
use crate::ident::ClassId;
use crate::instance::ObjId;
use crate::signal::SignalHandler;

/// Identity of a proxy row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId(pub(crate) u32);

/// One resolved host override of a native virtual method.
#[derive(Clone)]
pub struct CallbackBinding {
    pub method: MethodDescriptor,
}

/// Snapshot of a proxy used by compatibility testing.
#[derive(Debug, Clone, Copy)]
pub struct ProxyInfo {
    /// Most-derived bound class of the native object.
    pub class: ClassId,
    /// The wrapper holds a const view of the object.
    pub const_ref: bool,
    /// The native object is still alive.
    pub alive: bool,
}

/// Binding state of one host wrapper.
pub struct Proxy {
    /// Backing native instance; `None` before lazy construction and after
    /// detach or destruction.
    pub(crate) obj: Option<ObjId>,
    /// Bound class of the wrapper (the native object may be this class or
    /// a derived one).
    pub(crate) class: ClassId,
    /// The host wrapper object.
    pub(crate) host_obj: HostHandle,
    /// The wrapper owns the native lifetime and destroys the object when
    /// it goes away.
    pub(crate) owned: bool,
    /// The wrapper was handed a const view; mutating dispatch is refused.
    pub(crate) const_ref: bool,
    /// Explicit destruction through the wrapper is permitted even when
    /// the wrapper does not own the object.
    pub(crate) can_destroy: bool,
    /// The native object is gone; every dispatch fails `ObjectDestroyed`.
    pub(crate) destroyed: bool,
    /// The wrapper is pinned in the GC vault because native code owns a
    /// reference to it.
    pub(crate) pinned: bool,
    /// Host overrides of the class's virtual methods, shared across
    /// proxies of the same (class, host class) pair.
    pub(crate) callbacks: Rc<Vec<CallbackBinding>>,
    /// Signal connections keyed by signal name.
    pub(crate) signals: FxHashMap<String, SignalHandler>,
}

impl Proxy {
    pub(crate) fn new(class: ClassId, host_obj: HostHandle, callbacks: Rc<Vec<CallbackBinding>>) -> Self {
        Proxy {
            obj: None,
            class,
            host_obj,
            owned: false,
            const_ref: false,
            can_destroy: false,
            destroyed: false,
            pinned: false,
            callbacks,
            signals: FxHashMap::default(),
        }
    }

    /// The backing native instance, if currently bound.
    pub fn obj(&self) -> Option<ObjId> {
        self.obj
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn host_obj(&self) -> HostHandle {
        self.host_obj
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn is_const(&self) -> bool {
        self.const_ref
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The host override of `name`, if the wrapper's host class defines
    /// one.
    pub(crate) fn override_of(&self, name: &str) -> Option<MethodDescriptor> {
        self.callbacks
            .iter()
            .find(|b| b.method.name() == name)
            .map(|b| b.method.clone())
    }

    pub(crate) fn info(&self, actual_class: Option<ClassId>) -> ProxyInfo {
        ProxyInfo {
            class: actual_class.unwrap_or(self.class),
            const_ref: self.const_ref,
            alive: !self.destroyed,
        }
    }
}

/// Slab of proxy rows with id reuse.
#[derive(Default)]
pub struct ProxyTable {
    entries: Vec<Option<Proxy>>,
    free: Vec<u32>,
}

impl ProxyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, proxy: Proxy) -> ProxyId {
        match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = Some(proxy);
                ProxyId(index)
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Some(proxy));
                ProxyId(index)
            }
        }
    }

    pub fn get(&self, id: ProxyId) -> Option<&Proxy> {
        self.entries.get(id.0 as usize).and_then(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, id: ProxyId) -> Option<&mut Proxy> {
        self.entries.get_mut(id.0 as usize).and_then(|e| e.as_mut())
    }

    pub fn remove(&mut self, id: ProxyId) -> Option<Proxy> {
        let slot = self.entries.get_mut(id.0 as usize)?;
        let proxy = slot.take();
        if proxy.is_some() {
            self.free.push(id.0);
        }
        proxy
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(class: &str, handle: u64) -> Proxy {
        Proxy::new(
            ClassId::from_name(class),
            HostHandle(handle),
            Rc::new(Vec::new()),
        )
    }

    #[test]
    fn table_reuses_freed_rows() {
        let mut table = ProxyTable::new();
        let a = table.alloc(blank("A", 1));
        let b = table.alloc(blank("B", 2));
        assert_eq!(table.len(), 2);

        table.remove(a);
        assert!(table.get(a).is_none());
        let c = table.alloc(blank("C", 3));
        assert_eq!(c, a);
        assert_eq!(table.get(c).map(|p| p.host_obj()), Some(HostHandle(3)));
        assert_eq!(table.get(b).map(|p| p.host_obj()), Some(HostHandle(2)));
    }

    #[test]
    fn fresh_proxy_is_unbound_and_alive() {
        let proxy = blank("Point", 7);
        assert!(proxy.obj().is_none());
        assert!(!proxy.is_destroyed());
        assert!(!proxy.is_owned());
        assert!(proxy.override_of("anything").is_none());
    }
}
