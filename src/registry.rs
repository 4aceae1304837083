//! Class repository and host/native class registry.
//!
//! [`ClassRepository`] is the central storage for all [`ClassDescriptor`]s,
//! owned by the bridge instance. It is populated single-threaded during
//! startup registration and treated as frozen afterwards; lookups during
//! execution never mutate it.
//!
//! [`ClassRegistry`] is the bidirectional map between host-side class
//! handles and native class ids, with a separate dimension for the static
//! (class-method) flavor of a binding. Registration is expected to be
//! exhaustive at startup: a reverse lookup miss is a fatal invariant
//! violation and panics rather than returning an error.

use rustc_hash::FxHashMap;

use crate::class::{ClassDescriptor, MethodDescriptor};
use crate::host::{HostHandle, HostRuntime};
use crate::ident::ClassId;

/// Append-only storage of class descriptors, frozen after startup.
#[derive(Default)]
pub struct ClassRepository {
    classes: FxHashMap<ClassId, ClassDescriptor>,
    order: Vec<ClassId>,
}

impl ClassRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Double registration of the same class name
    /// is a binding-generation bug.
    pub fn insert(&mut self, desc: ClassDescriptor) -> ClassId {
        let id = desc.id();
        let prev = self.classes.insert(id, desc);
        assert!(
            prev.is_none(),
            "class registered twice: {}",
            self.classes[&id].name()
        );
        self.order.push(id);
        id
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(&id)
    }

    /// Lookup that treats a miss as the invariant violation it is.
    pub fn expect(&self, id: ClassId) -> &ClassDescriptor {
        self.classes
            .get(&id)
            .unwrap_or_else(|| panic!("unregistered class {id:?}"))
    }

    /// Class name for diagnostics; never fails.
    pub fn name_of(&self, id: ClassId) -> String {
        self.classes
            .get(&id)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| format!("{id:?}"))
    }

    /// Registered class ids in registration order.
    pub fn ids(&self) -> &[ClassId] {
        &self.order
    }

    /// Whether `from` is `to` or derives from it.
    pub fn is_assignable(&self, from: ClassId, to: ClassId) -> bool {
        let mut cur = Some(from);
        while let Some(c) = cur {
            if c == to {
                return true;
            }
            cur = self.get(c).and_then(|d| d.base());
        }
        false
    }

    /// Whether an explicit conversion from `from` into `to` exists.
    pub fn is_convertible(&self, from: ClassId, to: ClassId) -> bool {
        self.get(to).is_some_and(|d| d.convertible_from(from))
    }

    /// All overloads of `name` visible on `class`, walking the base
    /// chain. Derived declarations come first; a base overload shadowed
    /// by an identical derived signature is dropped.
    pub fn resolve_methods(&self, class: ClassId, name: &str) -> Vec<MethodDescriptor> {
        let mut out: Vec<MethodDescriptor> = Vec::new();
        let mut cur = Some(class);
        while let Some(c) = cur {
            let Some(desc) = self.get(c) else { break };
            for m in desc.methods_named(name) {
                let shadowed = out.iter().any(|seen| {
                    seen.args().len() == m.args().len()
                        && seen
                            .args()
                            .iter()
                            .zip(m.args())
                            .all(|(a, b)| a.basic() == b.basic())
                });
                if !shadowed {
                    out.push(m.clone());
                }
            }
            cur = desc.base();
        }
        out
    }

    /// Candidate overridable methods of `class`, including inherited
    /// ones. Derived wins on duplicate names.
    pub fn callback_candidates(&self, class: ClassId) -> Vec<MethodDescriptor> {
        let mut out: Vec<MethodDescriptor> = Vec::new();
        let mut cur = Some(class);
        while let Some(c) = cur {
            let Some(desc) = self.get(c) else { break };
            for m in desc.methods() {
                if m.is_callback() && !out.iter().any(|seen| seen.name() == m.name()) {
                    out.push(m.clone());
                }
            }
            cur = desc.base();
        }
        out
    }

    /// The signal declaration of `name` visible on `class`, if any.
    pub fn resolve_signal(&self, class: ClassId, name: &str) -> Option<MethodDescriptor> {
        let mut cur = Some(class);
        while let Some(c) = cur {
            let desc = self.get(c)?;
            if let Some(m) = desc.methods_named(name).into_iter().find(|m| m.is_signal()) {
                return Some(m.clone());
            }
            cur = desc.base();
        }
        None
    }
}

/// Bidirectional host-class <-> native-class map.
#[derive(Default)]
pub struct ClassRegistry {
    by_host: FxHashMap<HostHandle, (ClassId, bool)>,
    to_host: FxHashMap<(ClassId, bool), HostHandle>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a host class handle to a native class.
    pub fn register(&mut self, host: HostHandle, class: ClassId, as_static: bool) {
        let prev = self.by_host.insert(host, (class, as_static));
        assert!(prev.is_none(), "host class registered twice");
        let prev = self.to_host.insert((class, as_static), host);
        assert!(prev.is_none(), "native class bound to two host classes");
    }

    /// Exact lookup of a host class handle.
    pub fn lookup(&self, host: HostHandle) -> Option<ClassId> {
        self.by_host.get(&host).map(|(class, _)| *class)
    }

    /// Resolve a host class to its bound native class, walking the host
    /// ancestor chain until a registered ancestor is found.
    pub fn resolve(&self, host: &dyn HostRuntime, handle: HostHandle) -> Option<ClassId> {
        let mut cur = Some(handle);
        while let Some(h) = cur {
            if let Some(class) = self.lookup(h) {
                return Some(class);
            }
            cur = host.superclass(h);
        }
        None
    }

    /// Host handle for a native class, if one is registered.
    pub fn try_host_for(&self, class: ClassId, as_static: bool) -> Option<HostHandle> {
        self.to_host.get(&(class, as_static)).copied()
    }

    /// Host handle for a native class. Registration is exhaustive at
    /// startup; a miss is fatal.
    pub fn host_for(&self, class: ClassId, as_static: bool) -> HostHandle {
        self.try_host_for(class, as_static)
            .unwrap_or_else(|| panic!("no host class registered for {class:?}"))
    }
}
