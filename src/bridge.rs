//! Bridge - the central dispatcher owning every runtime table.
//!
//! One [`Bridge`] instance pairs one host runtime with one set of bound
//! native classes. It owns the class repository and registry, the native
//! instance table, the proxy table with its host/native indexes, the GC
//! vault and the diagnostics queue, and routes every operation that
//! crosses the boundary:
//!
//! - host to native: [`construct`], [`call_method`], [`call_static`],
//!   explicit [`destroy_object`] and [`detach`],
//! - native to host: [`call_virtual`] (callback dispatch) and
//!   [`emit_signal`],
//! - garbage-collector interop: [`host_collected`] and [`mark_roots`].
//!
//! The bridge is deliberately single-threaded; the host runtime answers
//! which thread owns it, and callback dispatch refuses to run anywhere
//! else.
//!
//! [`construct`]: Bridge::construct
//! [`call_method`]: Bridge::call_method
//! [`call_static`]: Bridge::call_static
//! [`destroy_object`]: Bridge::destroy_object
//! [`detach`]: Bridge::detach
//! [`call_virtual`]: Bridge::call_virtual
//! [`emit_signal`]: Bridge::emit_signal
//! [`host_collected`]: Bridge::host_collected
//! [`mark_roots`]: Bridge::mark_roots

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::class::{
    CallFrame, ClassDescriptor, LifecycleEvent, MethodDescriptor, MethodFlags, NativeFn,
};
use crate::compat::{self, MatchPass};
use crate::diag::Diagnostics;
use crate::error::{BindingError, BindingResult, CallSignal};
use crate::host::{HostHandle, HostRuntime, HostSignal, Value};
use crate::ident::ClassId;
use crate::instance::{InstanceTable, ObjId};
use crate::proxy::{CallbackBinding, Proxy, ProxyId, ProxyInfo, ProxyTable};
use crate::registry::{ClassRegistry, ClassRepository};
use crate::serial::{Heap, ObjectSlot, SerialArgs};
use crate::vault::GcVault;

/// Dispatcher and owner of all binding state for one host runtime.
pub struct Bridge {
    pub(crate) host: Rc<dyn HostRuntime>,
    pub(crate) repo: ClassRepository,
    pub(crate) registry: ClassRegistry,
    pub(crate) instances: InstanceTable,
    pub(crate) proxies: ProxyTable,
    pub(crate) by_host: FxHashMap<HostHandle, ProxyId>,
    pub(crate) by_obj: FxHashMap<ObjId, ProxyId>,
    pub(crate) callback_cache: FxHashMap<(ClassId, HostHandle), Rc<Vec<CallbackBinding>>>,
    pub(crate) vault: GcVault,
    pub(crate) diagnostics: Diagnostics,
}

impl Bridge {
    pub fn new(host: impl HostRuntime + 'static) -> Self {
        Bridge {
            host: Rc::new(host),
            repo: ClassRepository::new(),
            registry: ClassRegistry::new(),
            instances: InstanceTable::new(),
            proxies: ProxyTable::new(),
            by_host: FxHashMap::default(),
            by_obj: FxHashMap::default(),
            callback_cache: FxHashMap::default(),
            vault: GcVault::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    // === Registration ===

    /// Register a bound class and the host class standing for it.
    pub fn register_class(&mut self, desc: ClassDescriptor, host_class: HostHandle) -> ClassId {
        let id = self.repo.insert(desc);
        self.registry.register(host_class, id, false);
        id
    }

    /// Additionally bind the static (class-method) flavor of a class to a
    /// separate host class.
    pub fn bind_static_class(&mut self, class: ClassId, host_class: HostHandle) {
        self.registry.register(host_class, class, true);
    }

    // === Accessors ===

    pub fn host(&self) -> &dyn HostRuntime {
        self.host.as_ref()
    }

    pub fn repository(&self) -> &ClassRepository {
        &self.repo
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut InstanceTable {
        &mut self.instances
    }

    pub fn vault(&self) -> &GcVault {
        &self.vault
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Binding record of a host wrapper, if one exists.
    pub fn binding_of(&self, wrapper: HostHandle) -> Option<&Proxy> {
        let pid = self.by_host.get(&wrapper)?;
        self.proxies.get(*pid)
    }

    /// Binding snapshot used by compatibility testing. Wrappers of a
    /// registered host class that were never bound resolve to an
    /// unconstrained view of their class.
    pub(crate) fn proxy_info(&self, handle: HostHandle) -> Option<ProxyInfo> {
        if let Some(&pid) = self.by_host.get(&handle) {
            let proxy = self.proxies.get(pid)?;
            let actual = proxy.obj().and_then(|o| self.instances.class_of(o));
            return Some(proxy.info(actual));
        }
        let class = self
            .registry
            .resolve(self.host.as_ref(), self.host.class_of(handle))?;
        Some(ProxyInfo {
            class,
            const_ref: false,
            alive: true,
        })
    }

    // === Proxy lifecycle ===

    pub(crate) fn bind_wrapper(&mut self, wrapper: HostHandle, class: ClassId) -> ProxyId {
        let host_class = self.host.class_of(wrapper);
        let callbacks = self.callbacks_for(class, host_class);
        let pid = self.proxies.alloc(Proxy::new(class, wrapper, callbacks));
        self.by_host.insert(wrapper, pid);
        pid
    }

    /// Resolved host overrides for a (class, host class) pair, cached
    /// because every instance of the pair shares them.
    pub(crate) fn callbacks_for(
        &mut self,
        class: ClassId,
        host_class: HostHandle,
    ) -> Rc<Vec<CallbackBinding>> {
        if let Some(cached) = self.callback_cache.get(&(class, host_class)) {
            return Rc::clone(cached);
        }
        let bindings: Vec<CallbackBinding> = self
            .repo
            .callback_candidates(class)
            .into_iter()
            .filter(|m| self.host.defines_method(host_class, m.name(), true))
            .map(|method| CallbackBinding { method })
            .collect();
        let rc = Rc::new(bindings);
        self.callback_cache
            .insert((class, host_class), Rc::clone(&rc));
        rc
    }

    fn ensure_proxy(&mut self, wrapper: HostHandle) -> BindingResult<ProxyId> {
        if let Some(&pid) = self.by_host.get(&wrapper) {
            return Ok(pid);
        }
        let class = self
            .registry
            .resolve(self.host.as_ref(), self.host.class_of(wrapper))
            .ok_or_else(|| BindingError::TypeMismatch {
                detail: format!("host object #{} is not of a bound class", wrapper.0),
            })?;
        Ok(self.bind_wrapper(wrapper, class))
    }

    /// The native object behind a host wrapper, default-constructing it
    /// lazily when the class permits.
    pub(crate) fn native_object_for(
        &mut self,
        wrapper: HostHandle,
    ) -> BindingResult<(ProxyId, ObjId)> {
        let pid = self.ensure_proxy(wrapper)?;
        let (class, obj, destroyed) = match self.proxies.get(pid) {
            Some(p) => (p.class(), p.obj(), p.is_destroyed()),
            None => {
                return Err(BindingError::TypeMismatch {
                    detail: "binding row vanished".to_string(),
                });
            }
        };
        if destroyed {
            return Err(BindingError::ObjectDestroyed {
                class: self.repo.name_of(class),
            });
        }
        if let Some(obj) = obj {
            return Ok((pid, obj));
        }
        let factory = self.repo.expect(class).factory().cloned();
        let Some(factory) = factory else {
            return Err(BindingError::CannotDefaultCreate {
                class: self.repo.name_of(class),
            });
        };
        let obj = self.instances.create(class, factory());
        self.by_obj.insert(obj, pid);
        if let Some(p) = self.proxies.get_mut(pid) {
            p.obj = Some(obj);
            p.owned = true;
        }
        Ok((pid, obj))
    }

    /// The receiver of an owned variant takes over the object it
    /// carries: the wrapper owns again and any pin is dropped.
    pub(crate) fn reclaim_wrapper(&mut self, wrapper: HostHandle) {
        let Some(&pid) = self.by_host.get(&wrapper) else {
            return;
        };
        let unpin = match self.proxies.get_mut(pid) {
            Some(p) => {
                p.owned = true;
                let was = p.pinned;
                p.pinned = false;
                was
            }
            None => return,
        };
        if unpin {
            self.vault.unpin(self.host.as_ref(), wrapper);
        }
    }

    /// Ownership of the native object moved to native code; the wrapper
    /// becomes a pinned borrower.
    pub(crate) fn release_ownership(&mut self, pid: ProxyId) {
        let (wrapper, was_pinned) = match self.proxies.get_mut(pid) {
            Some(p) => {
                p.owned = false;
                let was = p.pinned;
                p.pinned = true;
                (p.host_obj(), was)
            }
            None => return,
        };
        if !was_pinned {
            self.vault.pin(self.host.as_ref(), wrapper);
        }
    }

    /// Wrap a native object arriving from the channel into a host value,
    /// reusing an existing wrapper when the object already has one.
    pub(crate) fn wrap_object(
        &mut self,
        slot: ObjectSlot,
        owned: bool,
        prefer_copy: bool,
    ) -> BindingResult<Value> {
        if let Some(&pid) = self.by_obj.get(&slot.obj) {
            if let Some(proxy) = self.proxies.get_mut(pid) {
                let wrapper = proxy.host_obj();
                if slot.pass {
                    // Native code handed ownership back.
                    proxy.owned = true;
                    if proxy.pinned {
                        proxy.pinned = false;
                        self.vault.unpin(self.host.as_ref(), wrapper);
                    }
                }
                return Ok(Value::Object(wrapper));
            }
        }

        let class = self
            .instances
            .class_of(slot.obj)
            .ok_or_else(|| BindingError::ObjectDestroyed {
                class: self.repo.name_of(slot.class),
            })?;
        let managed = self.repo.expect(class).is_managed();

        let mut obj = slot.obj;
        let mut owned = owned;
        if prefer_copy && !managed && !slot.pass {
            if let Some(copy) = self.clone_instance(obj, class)? {
                obj = copy;
                owned = true;
            }
        }

        let host_class = {
            let mut cur = Some(class);
            let mut found = None;
            while let Some(c) = cur {
                if let Some(h) = self.registry.try_host_for(c, false) {
                    found = Some(h);
                    break;
                }
                cur = self.repo.get(c).and_then(|d| d.base());
            }
            // Registration is exhaustive; an unregistered chain is fatal.
            found.unwrap_or_else(|| self.registry.host_for(class, false))
        };

        let wrapper = self.host.create_object(host_class);
        let pid = self.bind_wrapper(wrapper, class);
        self.by_obj.insert(obj, pid);
        let pin = !owned && managed;
        if let Some(p) = self.proxies.get_mut(pid) {
            p.obj = Some(obj);
            p.owned = owned;
            p.const_ref = slot.const_ref && !owned;
            p.pinned = pin;
        }
        if pin {
            self.vault.pin(self.host.as_ref(), wrapper);
        }
        Ok(Value::Object(wrapper))
    }

    /// Hand an existing native object to the host, transferring ownership
    /// when `pass` is set.
    pub fn expose_object(
        &mut self,
        obj: ObjId,
        pass: bool,
        const_ref: bool,
    ) -> BindingResult<Value> {
        let class = self
            .instances
            .class_of(obj)
            .ok_or_else(|| BindingError::ObjectDestroyed {
                class: "<unregistered>".to_string(),
            })?;
        self.wrap_object(
            ObjectSlot {
                obj,
                class,
                pass,
                const_ref,
            },
            pass,
            false,
        )
    }

    /// The host wrapper relinquishes its binding. An owned native object
    /// is destroyed; the wrapper returns to the unbound state, and a
    /// later dispatch may lazily bind a fresh default-constructed object.
    pub fn detach(&mut self, wrapper: HostHandle) -> BindingResult<()> {
        let pid = self.require_binding(wrapper)?;
        let (obj, owned, pinned) = match self.proxies.get(pid) {
            Some(p) => (p.obj(), p.is_owned(), p.pinned),
            None => return Ok(()),
        };
        if let Some(obj) = obj {
            if owned {
                self.instances.destroy(obj);
            }
            self.by_obj.remove(&obj);
        }
        if pinned {
            self.vault.unpin(self.host.as_ref(), wrapper);
        }
        if let Some(p) = self.proxies.get_mut(pid) {
            p.obj = None;
            p.owned = false;
            p.pinned = false;
        }
        Ok(())
    }

    /// Explicitly destroy the native object behind a wrapper. A wrapper
    /// that was never bound default-constructs first, so the destruction
    /// notification fires exactly as if the object had been used.
    pub fn destroy_object(&mut self, wrapper: HostHandle) -> BindingResult<()> {
        let (pid, obj) = self.native_object_for(wrapper)?;
        let (class, owned, can_destroy, pinned) = match self.proxies.get(pid) {
            Some(p) => (p.class(), p.is_owned(), p.can_destroy, p.pinned),
            None => {
                return Err(BindingError::TypeMismatch {
                    detail: "binding row vanished".to_string(),
                });
            }
        };
        if !owned && !can_destroy {
            return Err(BindingError::CannotDestroyExplicitly {
                class: self.repo.name_of(class),
            });
        }
        self.instances.destroy(obj);
        self.by_obj.remove(&obj);
        if pinned {
            self.vault.unpin(self.host.as_ref(), wrapper);
        }
        if let Some(p) = self.proxies.get_mut(pid) {
            p.obj = None;
            p.destroyed = true;
            p.owned = false;
            p.pinned = false;
        }
        Ok(())
    }

    /// Permit (or forbid) explicit destruction through a wrapper that
    /// does not own its native object.
    pub fn allow_destroy(&mut self, wrapper: HostHandle, allow: bool) -> BindingResult<()> {
        let pid = self.require_binding(wrapper)?;
        if let Some(p) = self.proxies.get_mut(pid) {
            p.can_destroy = allow;
        }
        Ok(())
    }

    /// The host collector reports a wrapper as gone.
    pub fn host_collected(&mut self, wrapper: HostHandle) {
        let Some(pid) = self.by_host.remove(&wrapper) else {
            return;
        };
        let Some(proxy) = self.proxies.remove(pid) else {
            return;
        };
        if proxy.pinned {
            // A pinned wrapper must not be collectable; record the
            // imbalance instead of failing.
            self.diagnostics.warning(format!(
                "pinned wrapper #{} was collected by the host",
                wrapper.0
            ));
            self.vault.unpin(self.host.as_ref(), wrapper);
        }
        if let Some(obj) = proxy.obj() {
            self.by_obj.remove(&obj);
            if proxy.is_owned() {
                self.instances.destroy(obj);
            }
        }
    }

    /// Mark-phase hook for the host collector: every pinned wrapper is
    /// live.
    pub fn mark_roots(&self, visit: impl FnMut(HostHandle)) {
        self.vault.mark(visit);
    }

    fn require_binding(&self, wrapper: HostHandle) -> BindingResult<ProxyId> {
        self.by_host
            .get(&wrapper)
            .copied()
            .ok_or_else(|| BindingError::TypeMismatch {
                detail: format!("host object #{} has no binding", wrapper.0),
            })
    }

    /// Apply lifecycle events queued by native bodies during a call.
    pub(crate) fn deliver_events(&mut self, events: Vec<(ObjId, LifecycleEvent)>) {
        for (obj, event) in events {
            match event {
                LifecycleEvent::Destroyed => self.object_destroyed(obj),
                LifecycleEvent::Keep => {
                    if let Some(&pid) = self.by_obj.get(&obj) {
                        self.release_ownership(pid);
                    }
                }
                LifecycleEvent::Release => {
                    if let Some(&pid) = self.by_obj.get(&obj) {
                        if let Some(p) = self.proxies.get_mut(pid) {
                            p.owned = true;
                            if p.pinned {
                                p.pinned = false;
                                let wrapper = p.host_obj();
                                self.vault.unpin(self.host.as_ref(), wrapper);
                            }
                        }
                    }
                }
            }
        }
    }

    /// A native object was destroyed externally; the wrapper (if any)
    /// transitions to the destroyed state.
    pub fn object_destroyed(&mut self, obj: ObjId) {
        self.instances.destroy(obj);
        if let Some(pid) = self.by_obj.remove(&obj) {
            if let Some(p) = self.proxies.get_mut(pid) {
                p.obj = None;
                p.destroyed = true;
                p.owned = false;
                if p.pinned {
                    p.pinned = false;
                    let wrapper = p.host_obj();
                    self.vault.unpin(self.host.as_ref(), wrapper);
                }
            }
        }
    }

    // === Host-to-native dispatch ===

    /// Run a native body with a fresh frame, then apply the lifecycle
    /// events it queued.
    pub(crate) fn run_native(
        &mut self,
        body: &NativeFn,
        this: Option<ObjId>,
        args: &mut SerialArgs,
        ret: &mut SerialArgs,
    ) -> BindingResult<()> {
        let mut events = Vec::new();
        let result = {
            let mut frame = CallFrame {
                this,
                args,
                ret,
                instances: &mut self.instances,
                events: &mut events,
            };
            body.call(&mut frame)
        };
        self.deliver_events(events);
        result
    }

    /// Construct the native object of `class` behind `wrapper`, selecting
    /// a constructor overload for `argv`.
    pub fn construct(
        &mut self,
        wrapper: HostHandle,
        class: ClassId,
        argv: &[Value],
    ) -> BindingResult<()> {
        let pid = match self.by_host.get(&wrapper).copied() {
            Some(pid) => pid,
            None => self.bind_wrapper(wrapper, class),
        };
        if self.proxies.get(pid).is_some_and(|p| p.obj().is_some()) {
            return Err(BindingError::TypeMismatch {
                detail: format!("host object #{} is already constructed", wrapper.0),
            });
        }
        let class_name = self.repo.name_of(class);
        let ctors: Vec<MethodDescriptor> = self.repo.expect(class).constructors().to_vec();
        let picked = {
            let lookup = |h| self.proxy_info(h);
            compat::select_overload(&self.repo, &lookup, "new", &ctors, argv)
        }
        .map_err(|e| e.in_call(&class_name, "new"))?;
        let Some((idx, pass)) = picked else {
            return Err(BindingError::NoCompatibleConstructor {
                class: class_name,
                arity: argv.len(),
            });
        };
        if pass == MatchPass::Loose {
            self.diagnostics
                .info(format!("constructor of '{class_name}' matched loosely"));
        }
        let ctor = ctors[idx].clone();

        let mut heap = Heap::new();
        let result = self.run_constructor(&ctor, argv, &mut heap);
        heap.drain(&mut self.instances);
        let obj = result.map_err(|e| e.in_call(&class_name, "new"))?;

        self.by_obj.insert(obj, pid);
        if let Some(p) = self.proxies.get_mut(pid) {
            p.obj = Some(obj);
            p.owned = true;
            p.destroyed = false;
        }
        Ok(())
    }

    fn run_constructor(
        &mut self,
        ctor: &MethodDescriptor,
        argv: &[Value],
        heap: &mut Heap,
    ) -> BindingResult<ObjId> {
        let body = ctor
            .body()
            .cloned()
            .ok_or_else(|| BindingError::TypeMismatch {
                detail: format!("constructor {} has no body", ctor.signature()),
            })?;
        let mut args = SerialArgs::new();
        let mut ret = SerialArgs::new();
        for (at, v) in ctor.args().iter().zip(argv) {
            self.write_arg(v, at, &mut args, heap)?;
        }
        self.run_native(&body, None, &mut args, &mut ret)?;
        let slot = ret
            .read_object()?
            .ok_or_else(|| BindingError::TypeMismatch {
                detail: format!("constructor {} produced no object", ctor.signature()),
            })?;
        Ok(slot.obj)
    }

    /// Call a bound method on the native object behind `target`.
    pub fn call_method(
        &mut self,
        target: HostHandle,
        name: &str,
        argv: &[Value],
    ) -> BindingResult<Value> {
        let (pid, obj) = self.native_object_for(target)?;
        let proxy_const = self.proxies.get(pid).is_some_and(|p| p.is_const());
        // Dispatch on the most-derived bound class of the instance.
        let actual = match self.instances.class_of(obj) {
            Some(c) => c,
            None => {
                return Err(BindingError::ObjectDestroyed {
                    class: self.repo.name_of(
                        self.proxies.get(pid).map(|p| p.class()).unwrap_or_else(|| {
                            ClassId::from_name("<unknown>")
                        }),
                    ),
                });
            }
        };
        let class_name = self.repo.name_of(actual);
        let methods: Vec<MethodDescriptor> = self
            .repo
            .resolve_methods(actual, name)
            .into_iter()
            .filter(|m| !m.is_signal() && !m.flags().contains(MethodFlags::STATIC))
            .collect();
        if methods.is_empty() {
            return Err(BindingError::NoSuchMethod {
                class: class_name,
                method: name.to_string(),
            });
        }
        let picked = {
            let lookup = |h| self.proxy_info(h);
            compat::select_overload(&self.repo, &lookup, name, &methods, argv)
        }
        .map_err(|e| e.in_call(&class_name, name))?;
        let Some((idx, pass)) = picked else {
            return Err(BindingError::NoSuchMethod {
                class: class_name,
                method: name.to_string(),
            });
        };
        let method = methods[idx].clone();
        if proxy_const && !method.is_const() {
            return Err(BindingError::TypeMismatch {
                detail: format!("method '{name}' is not callable on a const {class_name}"),
            }
            .in_call(&class_name, name));
        }
        if pass == MatchPass::Loose {
            self.diagnostics
                .info(format!("call to {class_name}.{name} matched loosely"));
        }

        let mut heap = Heap::new();
        let result = self.invoke_native(Some(obj), &method, argv, &mut heap);
        heap.drain(&mut self.instances);
        result.map_err(|e| e.in_call(&class_name, name))
    }

    /// Call a static (receiver-less) method of a bound class.
    pub fn call_static(
        &mut self,
        class: ClassId,
        name: &str,
        argv: &[Value],
    ) -> BindingResult<Value> {
        let class_name = self.repo.name_of(class);
        let methods: Vec<MethodDescriptor> = self
            .repo
            .resolve_methods(class, name)
            .into_iter()
            .filter(|m| m.flags().contains(MethodFlags::STATIC))
            .collect();
        if methods.is_empty() {
            return Err(BindingError::NoSuchMethod {
                class: class_name,
                method: name.to_string(),
            });
        }
        let picked = {
            let lookup = |h| self.proxy_info(h);
            compat::select_overload(&self.repo, &lookup, name, &methods, argv)
        }
        .map_err(|e| e.in_call(&class_name, name))?;
        let Some((idx, _)) = picked else {
            return Err(BindingError::NoSuchMethod {
                class: class_name,
                method: name.to_string(),
            });
        };
        let method = methods[idx].clone();

        let mut heap = Heap::new();
        let result = self.invoke_native(None, &method, argv, &mut heap);
        heap.drain(&mut self.instances);
        result.map_err(|e| e.in_call(&class_name, name))
    }

    fn invoke_native(
        &mut self,
        this: Option<ObjId>,
        method: &MethodDescriptor,
        argv: &[Value],
        heap: &mut Heap,
    ) -> BindingResult<Value> {
        let mut args = SerialArgs::new();
        let mut ret = SerialArgs::new();
        for (at, v) in method.args().iter().zip(argv) {
            self.write_arg(v, at, &mut args, heap)?;
        }
        match method.body() {
            Some(body) => {
                let body = body.clone();
                self.run_native(&body, this, &mut args, &mut ret)?;
            }
            // A callback with no native default is a no-op from the host
            // side.
            None => return Ok(Value::Nil),
        }
        if method.ret().is_void() {
            Ok(Value::Nil)
        } else {
            self.read_value(method.ret(), &mut ret)
        }
    }

    // === Native-to-host dispatch ===

    /// Dispatch a virtual method from native code: the host override runs
    /// when the wrapper's host class defines one, the native default
    /// otherwise.
    pub fn call_virtual(
        &mut self,
        this: ObjId,
        name: &str,
        args: &mut SerialArgs,
        ret: &mut SerialArgs,
        heap: &mut Heap,
    ) -> Result<(), CallSignal> {
        let pid = self.by_obj.get(&this).copied();
        let overridden = pid
            .and_then(|p| self.proxies.get(p))
            .and_then(|p| p.override_of(name));
        if let Some(method) = overridden {
            let (wrapper, class) = match pid.and_then(|p| self.proxies.get(p)) {
                Some(p) => (p.host_obj(), p.class()),
                None => {
                    return Err(BindingError::TypeMismatch {
                        detail: "binding row vanished".to_string(),
                    }
                    .into());
                }
            };
            return self.dispatch_callback(wrapper, class, &method, args, ret, heap);
        }

        // No override: run the native default, if the class declares one.
        let class = match self.instances.class_of(this) {
            Some(c) => c,
            None => {
                return Err(BindingError::ObjectDestroyed {
                    class: "<unknown>".to_string(),
                }
                .into());
            }
        };
        let default = self
            .repo
            .resolve_methods(class, name)
            .into_iter()
            .find(|m| m.is_callback())
            .and_then(|m| m.body().cloned());
        if let Some(body) = default {
            self.run_native(&body, Some(this), args, ret)?;
        }
        Ok(())
    }

    /// Run one resolved host override.
    fn dispatch_callback(
        &mut self,
        wrapper: HostHandle,
        class: ClassId,
        method: &MethodDescriptor,
        args: &mut SerialArgs,
        ret: &mut SerialArgs,
        heap: &mut Heap,
    ) -> Result<(), CallSignal> {
        if !self.host.owns_current_thread() {
            return Err(BindingError::WrongThread {
                method: method.name().to_string(),
            }
            .into());
        }
        let mut argv = Vec::with_capacity(method.args().len());
        for at in method.args() {
            argv.push(self.read_value(at, args)?);
        }
        // The host gets the bridge back: an override may itself dispatch
        // further boundary calls before returning.
        let host = Rc::clone(&self.host);
        match host.invoke(self, wrapper, method.name(), &argv) {
            Ok(v) => {
                if !method.ret().is_void() {
                    self.write_arg(&v, method.ret(), ret, heap)?;
                }
                Ok(())
            }
            Err(HostSignal::Error(message)) => Err(CallSignal::Error(
                BindingError::CallbackFailed {
                    class: self.repo.name_of(class),
                    method: method.name().to_string(),
                    message,
                },
            )),
            Err(HostSignal::Unwind(v)) => Err(CallSignal::Unwind(v)),
        }
    }

    // === Signals ===

    /// Connect a host callable to a declared signal of `wrapper`'s class.
    pub fn signal_connect(
        &mut self,
        wrapper: HostHandle,
        name: &str,
        callable: &Value,
    ) -> BindingResult<()> {
        let pid = self.signal_target(wrapper, name)?;
        let Value::Callable(c) = callable else {
            return Err(BindingError::TypeMismatch {
                detail: format!("cannot connect {} to signal '{name}'", callable.kind_name()),
            });
        };
        if let Some(p) = self.proxies.get_mut(pid) {
            p.signals.entry(name.to_string()).or_default().connect(*c);
        }
        Ok(())
    }

    /// Replace the connections of a signal with a single callable; nil
    /// clears all connections.
    pub fn signal_assign(
        &mut self,
        wrapper: HostHandle,
        name: &str,
        callable: &Value,
    ) -> BindingResult<()> {
        let pid = self.signal_target(wrapper, name)?;
        let target = match callable {
            Value::Nil => None,
            Value::Callable(c) => Some(*c),
            other => {
                return Err(BindingError::TypeMismatch {
                    detail: format!("cannot assign {} to signal '{name}'", other.kind_name()),
                });
            }
        };
        if let Some(p) = self.proxies.get_mut(pid) {
            p.signals.entry(name.to_string()).or_default().assign(target);
        }
        Ok(())
    }

    /// Disconnect one callable; returns false if it was not connected.
    pub fn signal_disconnect(
        &mut self,
        wrapper: HostHandle,
        name: &str,
        callable: &Value,
    ) -> BindingResult<bool> {
        let pid = self.signal_target(wrapper, name)?;
        let Value::Callable(c) = callable else {
            return Err(BindingError::TypeMismatch {
                detail: format!("cannot disconnect {} from signal '{name}'", callable.kind_name()),
            });
        };
        Ok(self
            .proxies
            .get_mut(pid)
            .and_then(|p| p.signals.get_mut(name))
            .is_some_and(|h| h.disconnect(*c)))
    }

    fn signal_target(&mut self, wrapper: HostHandle, name: &str) -> BindingResult<ProxyId> {
        let pid = self.ensure_proxy(wrapper)?;
        let class = match self.proxies.get(pid) {
            Some(p) => p.class(),
            None => {
                return Err(BindingError::TypeMismatch {
                    detail: "binding row vanished".to_string(),
                });
            }
        };
        self.repo
            .resolve_signal(class, name)
            .ok_or_else(|| BindingError::NoSuchMethod {
                class: self.repo.name_of(class),
                method: name.to_string(),
            })?;
        Ok(pid)
    }

    /// Broadcast a signal from native code. Arguments are deserialized
    /// once; the return value of the last connected callable wins.
    pub fn emit_signal(
        &mut self,
        this: ObjId,
        name: &str,
        args: &mut SerialArgs,
    ) -> Result<Value, CallSignal> {
        if !self.host.owns_current_thread() {
            return Err(BindingError::WrongThread {
                method: name.to_string(),
            }
            .into());
        }
        let class = match self.instances.class_of(this) {
            Some(c) => c,
            None => {
                return Err(BindingError::ObjectDestroyed {
                    class: "<unknown>".to_string(),
                }
                .into());
            }
        };
        let sig =
            self.repo
                .resolve_signal(class, name)
                .ok_or_else(|| BindingError::NoSuchMethod {
                    class: self.repo.name_of(class),
                    method: name.to_string(),
                })?;
        let mut argv = Vec::with_capacity(sig.args().len());
        for at in sig.args() {
            argv.push(self.read_value(at, args)?);
        }
        let handler = self
            .by_obj
            .get(&this)
            .copied()
            .and_then(|pid| self.proxies.get(pid))
            .and_then(|p| p.signals.get(name))
            .cloned();
        let Some(handler) = handler else {
            return Ok(Value::Nil);
        };
        match handler.call(self, &argv) {
            Ok(v) => Ok(v),
            Err(HostSignal::Error(message)) => Err(CallSignal::Error(
                BindingError::CallbackFailed {
                    class: self.repo.name_of(class),
                    method: name.to_string(),
                    message,
                },
            )),
            Err(HostSignal::Unwind(v)) => Err(CallSignal::Unwind(v)),
        }
    }
}
