//! LocalHost - a table-driven reference host runtime.
//!
//! `LocalHost` implements [`HostRuntime`] with plain tables: classes by
//! handle, methods as Rust closures over [`Value`], objects as rows
//! carrying their class, and a root set standing in for a garbage
//! collector. Collection is explicit: [`LocalHost::collect`] drops every
//! object that is not rooted, which is exactly the behavior the GC vault
//! has to defend against.
//!
//! It exists so the binding core can be exercised without embedding a real
//! scripting runtime; integration tests and the benchmark build on it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread::{self, ThreadId};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bridge::Bridge;
use crate::host::{HostHandle, HostRuntime, HostSignal, Value, Visibility};

/// A host method body: receives the dispatching bridge, the target object
/// handle and the arguments. The bridge may be reentered.
pub type HostFn = Rc<dyn Fn(&mut Bridge, HostHandle, &[Value]) -> Result<Value, HostSignal>>;

/// A standalone callable body.
pub type CallableFn = Rc<dyn Fn(&mut Bridge, &[Value]) -> Result<Value, HostSignal>>;

struct ClassDef {
    name: String,
    base: Option<HostHandle>,
    methods: FxHashMap<String, (Visibility, HostFn)>,
}

struct ObjectRec {
    class: HostHandle,
}

#[derive(Default)]
struct Tables {
    next: u64,
    classes: FxHashMap<HostHandle, ClassDef>,
    objects: FxHashMap<HostHandle, ObjectRec>,
    callables: FxHashMap<HostHandle, CallableFn>,
    roots: FxHashSet<HostHandle>,
}

impl Tables {
    fn fresh(&mut self) -> HostHandle {
        self.next += 1;
        HostHandle(self.next)
    }
}

/// Reference host runtime backed by in-process tables.
pub struct LocalHost {
    tables: RefCell<Tables>,
    owner: Cell<ThreadId>,
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHost {
    /// Create a host owned by the current thread.
    pub fn new() -> Self {
        LocalHost {
            tables: RefCell::new(Tables::default()),
            owner: Cell::new(thread::current().id()),
        }
    }

    /// Re-declare the owning thread.
    ///
    /// Embedders that construct the runtime on one thread and hand it to a
    /// dedicated interpreter thread record the new owner here; dispatch
    /// from any other thread then fails `WrongThread`.
    pub fn adopt_owner(&self, owner: ThreadId) {
        self.owner.set(owner);
    }

    /// Define a host class, optionally deriving from `base`.
    pub fn define_class(&self, name: &str, base: Option<HostHandle>) -> HostHandle {
        let mut t = self.tables.borrow_mut();
        let handle = t.fresh();
        t.classes.insert(
            handle,
            ClassDef {
                name: name.to_string(),
                base,
                methods: FxHashMap::default(),
            },
        );
        handle
    }

    /// Define (or replace) a method on a host class.
    pub fn define_method<F>(&self, class: HostHandle, name: &str, visibility: Visibility, body: F)
    where
        F: Fn(&mut Bridge, HostHandle, &[Value]) -> Result<Value, HostSignal> + 'static,
    {
        let mut t = self.tables.borrow_mut();
        let def = t.classes.get_mut(&class).expect("unknown host class");
        def.methods
            .insert(name.to_string(), (visibility, Rc::new(body)));
    }

    /// Register a standalone callable and return its value.
    pub fn callable<F>(&self, body: F) -> Value
    where
        F: Fn(&mut Bridge, &[Value]) -> Result<Value, HostSignal> + 'static,
    {
        let mut t = self.tables.borrow_mut();
        let handle = t.fresh();
        t.callables.insert(handle, Rc::new(body));
        Value::Callable(handle)
    }

    /// Name of a host class, for assertions.
    pub fn class_name(&self, class: HostHandle) -> String {
        self.tables
            .borrow()
            .classes
            .get(&class)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    /// Drop every object that is not rooted.
    ///
    /// This is the whole collector: reachability is the root set. Classes
    /// and callables are immortal.
    pub fn collect(&self) {
        let mut t = self.tables.borrow_mut();
        let roots = t.roots.clone();
        t.objects.retain(|handle, _| roots.contains(handle));
    }

    /// Number of live objects, for tests.
    pub fn live_objects(&self) -> usize {
        self.tables.borrow().objects.len()
    }

    fn lookup_method(&self, class: HostHandle, name: &str) -> Option<(Visibility, HostFn)> {
        let t = self.tables.borrow();
        let mut cur = Some(class);
        while let Some(c) = cur {
            let def = t.classes.get(&c)?;
            if let Some((vis, body)) = def.methods.get(name) {
                return Some((*vis, Rc::clone(body)));
            }
            cur = def.base;
        }
        None
    }
}

impl HostRuntime for LocalHost {
    fn invoke(
        &self,
        bridge: &mut Bridge,
        target: HostHandle,
        method: &str,
        argv: &[Value],
    ) -> Result<Value, HostSignal> {
        let class = {
            let t = self.tables.borrow();
            match t.objects.get(&target) {
                Some(rec) => rec.class,
                None => {
                    return Err(HostSignal::Error(format!(
                        "invoke on dead or unknown object #{}",
                        target.0
                    )));
                }
            }
        };
        // Borrow dropped before the body runs: methods may reenter.
        match self.lookup_method(class, method) {
            Some((_, body)) => body(bridge, target, argv),
            None => Err(HostSignal::Error(format!("no host method '{method}'"))),
        }
    }

    fn call_callable(
        &self,
        bridge: &mut Bridge,
        callable: HostHandle,
        argv: &[Value],
    ) -> Result<Value, HostSignal> {
        let body = self.tables.borrow().callables.get(&callable).cloned();
        match body {
            Some(body) => body(bridge, argv),
            None => Err(HostSignal::Error(format!(
                "unknown callable #{}",
                callable.0
            ))),
        }
    }

    fn create_object(&self, class: HostHandle) -> HostHandle {
        let mut t = self.tables.borrow_mut();
        let handle = t.fresh();
        t.objects.insert(handle, ObjectRec { class });
        handle
    }

    fn class_of(&self, obj: HostHandle) -> HostHandle {
        self.tables
            .borrow()
            .objects
            .get(&obj)
            .map(|rec| rec.class)
            .unwrap_or(HostHandle(0))
    }

    fn superclass(&self, class: HostHandle) -> Option<HostHandle> {
        self.tables.borrow().classes.get(&class).and_then(|c| c.base)
    }

    fn defines_method(&self, class: HostHandle, name: &str, include_protected: bool) -> bool {
        match self.lookup_method(class, name) {
            Some((Visibility::Public, _)) => true,
            Some((Visibility::Protected, _)) => include_protected,
            None => false,
        }
    }

    fn is_alive(&self, obj: HostHandle) -> bool {
        self.tables.borrow().objects.contains_key(&obj)
    }

    fn gc_root(&self, handle: HostHandle, rooted: bool) {
        let mut t = self.tables.borrow_mut();
        if rooted {
            t.roots.insert(handle);
        } else {
            t.roots.remove(&handle);
        }
    }

    fn owns_current_thread(&self) -> bool {
        thread::current().id() == self.owner.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_lookup_walks_ancestors() {
        let host = Rc::new(LocalHost::new());
        let mut bridge = Bridge::new(Rc::clone(&host));
        let base = host.define_class("Base", None);
        let derived = host.define_class("Derived", Some(base));
        host.define_method(base, "greet", Visibility::Public, |_, _, _| {
            Ok(Value::Str("hello".into()))
        });

        let obj = host.create_object(derived);
        assert_eq!(
            host.invoke(&mut bridge, obj, "greet", &[]),
            Ok(Value::Str("hello".into()))
        );
        assert!(host.defines_method(derived, "greet", false));
        assert!(host.is_subclass_of(derived, base));
        assert!(!host.is_subclass_of(base, derived));
    }

    #[test]
    fn protected_methods_need_opt_in() {
        let host = LocalHost::new();
        let class = host.define_class("C", None);
        host.define_method(class, "hidden", Visibility::Protected, |_, _, _| Ok(Value::Nil));
        assert!(!host.defines_method(class, "hidden", false));
        assert!(host.defines_method(class, "hidden", true));
    }

    #[test]
    fn collect_drops_unrooted_objects() {
        let host = LocalHost::new();
        let class = host.define_class("C", None);
        let a = host.create_object(class);
        let b = host.create_object(class);
        host.gc_root(a, true);
        host.collect();
        assert!(host.is_alive(a));
        assert!(!host.is_alive(b));
        host.gc_root(a, false);
        host.collect();
        assert!(!host.is_alive(a));
    }
}
