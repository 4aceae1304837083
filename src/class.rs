//! Class and method descriptors - the native registration surface.
//!
//! A [`ClassDescriptor`] is the immutable record of one bound native
//! class: identity, single-inheritance base, capability flags, and the
//! constructor/method/callback tables. Descriptors are built once at
//! startup through [`ClassBuilder`] and never destroyed.
//!
//! Method bodies are type-erased [`NativeFn`]s called with a [`CallFrame`]
//! that exposes the argument/return channels and the instance table; this
//! mirrors how the native side of the boundary actually executes.
//!
//! # Example
//!
//! ```
//! use crossbind::{ArgType, BasicType, CallFrame, ClassBuilder, ClassFlags};
//!
//! #[derive(Default, Clone)]
//! struct Point { x: i64, y: i64 }
//!
//! let desc = ClassBuilder::new("Point")
//!     .flags(ClassFlags::CAN_COPY | ClassFlags::CAN_DEFAULT_CREATE)
//!     .factory(|| Box::new(Point::default()))
//!     .cloner(|any| Box::new(any.downcast_ref::<Point>().unwrap().clone()))
//!     .method(
//!         "x",
//!         &[],
//!         ArgType::scalar(BasicType::Long),
//!         |frame: &mut CallFrame| {
//!             let x = frame.this_as::<Point>()?.x;
//!             frame.ret.write_int(x);
//!             Ok(())
//!         },
//!     )
//!     .build();
//! assert_eq!(desc.methods().len(), 1);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashSet;

use crate::arg_type::{ArgType, BasicType};
use crate::error::{BindingError, BindingResult};
use crate::ident::{ClassId, MethodId};
use crate::instance::{InstanceTable, ObjId};
use crate::serial::SerialArgs;

bitflags! {
    /// Capability flags of a bound class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClassFlags: u8 {
        /// The class has a reference-counted, event-driven lifecycle and
        /// emits `Destroyed`/`Keep`/`Release` events.
        const MANAGED = 1 << 0;
        /// Instances can be cloned.
        const CAN_COPY = 1 << 1;
        /// Instances can be default-constructed lazily.
        const CAN_DEFAULT_CREATE = 1 << 2;
        /// The class wraps a foreign value type rather than a heap object;
        /// passing by value unwraps to the inner class.
        const ADAPTED = 1 << 3;
    }
}

bitflags! {
    /// Flags of a bound method declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodFlags: u8 {
        /// Callable on const-bound objects.
        const CONST = 1 << 0;
        /// Overridable from the host side (virtual).
        const CALLBACK = 1 << 1;
        /// A broadcast event point rather than a method.
        const SIGNAL = 1 << 2;
        /// Class-level, no receiver.
        const STATIC = 1 << 3;
    }
}

/// Lifecycle events emitted by managed classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The native object was destroyed externally.
    Destroyed,
    /// Native code asserted permanent ownership (e.g. a factory handed
    /// the object to a container).
    Keep,
    /// Native code relinquished ownership back to the host wrapper.
    Release,
}

/// Execution context handed to a native method body.
pub struct CallFrame<'a> {
    /// Receiver, absent for constructors and static methods.
    pub this: Option<ObjId>,
    /// Argument channel, read in declaration order.
    pub args: &'a mut SerialArgs,
    /// Return channel, written by the body.
    pub ret: &'a mut SerialArgs,
    /// Native object storage.
    pub instances: &'a mut InstanceTable,
    /// Lifecycle events the body wants delivered after it returns.
    pub events: &'a mut Vec<(ObjId, LifecycleEvent)>,
}

impl CallFrame<'_> {
    /// Typed receiver access.
    pub fn this_as<T: 'static>(&self) -> BindingResult<&T> {
        let id = self.this.ok_or_else(|| BindingError::TypeMismatch {
            detail: "method body has no receiver".to_string(),
        })?;
        self.instances
            .get_as::<T>(id)
            .ok_or(BindingError::ObjectDestroyed {
                class: std::any::type_name::<T>().to_string(),
            })
    }

    /// Typed mutable receiver access.
    pub fn this_mut_as<T: 'static>(&mut self) -> BindingResult<&mut T> {
        let id = self.this.ok_or_else(|| BindingError::TypeMismatch {
            detail: "method body has no receiver".to_string(),
        })?;
        self.instances
            .get_mut_as::<T>(id)
            .ok_or(BindingError::ObjectDestroyed {
                class: std::any::type_name::<T>().to_string(),
            })
    }

    /// Create a native object and return it with ownership transfer.
    /// This is how constructor bodies report their result.
    pub fn return_new<T: 'static>(&mut self, class: ClassId, value: T) {
        let obj = self.instances.create(class, Box::new(value));
        self.ret.write_object(obj, class, true, false);
    }

    /// Queue a lifecycle event for the receiver, delivered once the
    /// native frame returns.
    pub fn emit(&mut self, event: LifecycleEvent) {
        if let Some(this) = self.this {
            self.events.push((this, event));
        }
    }

    /// Queue a lifecycle event for an arbitrary object.
    pub fn emit_for(&mut self, obj: ObjId, event: LifecycleEvent) {
        self.events.push((obj, event));
    }
}

/// Trait for callable native method bodies.
pub trait NativeCallable {
    fn call(&self, frame: &mut CallFrame) -> BindingResult<()>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallFrame) -> BindingResult<()>,
{
    fn call(&self, frame: &mut CallFrame) -> BindingResult<()> {
        (self)(frame)
    }
}

/// Type-erased native method body, shared by descriptor clones.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn NativeCallable>,
}

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        NativeFn { inner: Arc::new(f) }
    }

    pub fn call(&self, frame: &mut CallFrame) -> BindingResult<()> {
        self.inner.call(frame)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Factory for lazy default construction.
pub type FactoryFn = Arc<dyn Fn() -> Box<dyn Any>>;

/// Clone, convert or unwrap an instance into a new boxed value.
pub type TransformFn = Arc<dyn Fn(&dyn Any) -> Box<dyn Any>>;

/// One method, constructor, callback or signal declaration.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    id: MethodId,
    flags: MethodFlags,
    args: Vec<ArgType>,
    ret: ArgType,
    body: Option<NativeFn>,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> MethodId {
        self.id
    }

    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    pub fn args(&self) -> &[ArgType] {
        &self.args
    }

    pub fn ret(&self) -> &ArgType {
        &self.ret
    }

    pub fn body(&self) -> Option<&NativeFn> {
        self.body.as_ref()
    }

    pub fn is_callback(&self) -> bool {
        self.flags.contains(MethodFlags::CALLBACK)
    }

    pub fn is_signal(&self) -> bool {
        self.flags.contains(MethodFlags::SIGNAL)
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(MethodFlags::CONST)
    }

    /// Human-readable signature for diagnostics.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodDescriptor({})", self.signature())
    }
}

/// Immutable record of one bound native class.
pub struct ClassDescriptor {
    name: String,
    id: ClassId,
    base: Option<ClassId>,
    flags: ClassFlags,
    constructors: Vec<MethodDescriptor>,
    methods: Vec<MethodDescriptor>,
    factory: Option<FactoryFn>,
    cloner: Option<TransformFn>,
    converters: Vec<(ClassId, TransformFn)>,
    /// For adapted classes: the wrapped class and the unwrap transform.
    adapted_inner: Option<(ClassId, TransformFn)>,
}

impl ClassDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn base(&self) -> Option<ClassId> {
        self.base
    }

    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    pub fn is_managed(&self) -> bool {
        self.flags.contains(ClassFlags::MANAGED)
    }

    pub fn can_copy(&self) -> bool {
        self.flags.contains(ClassFlags::CAN_COPY)
    }

    pub fn can_default_create(&self) -> bool {
        self.flags.contains(ClassFlags::CAN_DEFAULT_CREATE)
    }

    pub fn is_adapted(&self) -> bool {
        self.flags.contains(ClassFlags::ADAPTED)
    }

    pub fn constructors(&self) -> &[MethodDescriptor] {
        &self.constructors
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn factory(&self) -> Option<&FactoryFn> {
        self.factory.as_ref()
    }

    pub fn cloner(&self) -> Option<&TransformFn> {
        self.cloner.as_ref()
    }

    /// Converter registered for values of `from`, if any.
    pub fn converter_from(&self, from: ClassId) -> Option<&TransformFn> {
        self.converters
            .iter()
            .find(|(class, _)| *class == from)
            .map(|(_, f)| f)
    }

    /// Whether a conversion from `from` into this class is registered.
    pub fn convertible_from(&self, from: ClassId) -> bool {
        self.converters.iter().any(|(class, _)| *class == from)
    }

    pub fn adapted_inner(&self) -> Option<(ClassId, &TransformFn)> {
        self.adapted_inner.as_ref().map(|(c, f)| (*c, f))
    }

    /// Constructors accepting exactly `arity` arguments.
    pub fn constructors_with_arity(&self, arity: usize) -> Vec<&MethodDescriptor> {
        self.constructors
            .iter()
            .filter(|m| m.args().len() == arity)
            .collect()
    }

    /// Methods with the given name, in declaration order.
    pub fn methods_named(&self, name: &str) -> Vec<&MethodDescriptor> {
        self.methods.iter().filter(|m| m.name() == name).collect()
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Fluent builder for [`ClassDescriptor`]s.
pub struct ClassBuilder {
    desc: ClassDescriptor,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        ClassBuilder {
            desc: ClassDescriptor {
                name: name.to_string(),
                id: ClassId::from_name(name),
                base: None,
                flags: ClassFlags::empty(),
                constructors: Vec::new(),
                methods: Vec::new(),
                factory: None,
                cloner: None,
                converters: Vec::new(),
                adapted_inner: None,
            },
        }
    }

    /// Single-inheritance base class.
    pub fn base(mut self, base: ClassId) -> Self {
        self.desc.base = Some(base);
        self
    }

    pub fn flags(mut self, flags: ClassFlags) -> Self {
        self.desc.flags |= flags;
        self
    }

    /// Default-construction factory; implies `CAN_DEFAULT_CREATE`.
    pub fn factory<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Box<dyn Any> + 'static,
    {
        self.desc.factory = Some(Arc::new(f));
        self.desc.flags |= ClassFlags::CAN_DEFAULT_CREATE;
        self
    }

    /// Copy transform; implies `CAN_COPY`.
    pub fn cloner<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Any) -> Box<dyn Any> + 'static,
    {
        self.desc.cloner = Some(Arc::new(f));
        self.desc.flags |= ClassFlags::CAN_COPY;
        self
    }

    /// Register an explicit conversion from another class into this one.
    pub fn convert_from<F>(mut self, from: ClassId, f: F) -> Self
    where
        F: Fn(&dyn Any) -> Box<dyn Any> + 'static,
    {
        self.desc.converters.push((from, Arc::new(f)));
        self
    }

    /// Mark the class as a value-type adapter around `inner`, with the
    /// unwrap transform producing the inner value.
    pub fn adapted<F>(mut self, inner: ClassId, unwrap: F) -> Self
    where
        F: Fn(&dyn Any) -> Box<dyn Any> + 'static,
    {
        self.desc.adapted_inner = Some((inner, Arc::new(unwrap)));
        self.desc.flags |= ClassFlags::ADAPTED;
        self
    }

    /// Add a constructor overload. The body must finish with
    /// [`CallFrame::return_new`].
    pub fn constructor<F>(mut self, args: &[ArgType], body: F) -> Self
    where
        F: Fn(&mut CallFrame) -> BindingResult<()> + 'static,
    {
        let md = self.declare(
            "new",
            args,
            ArgType::object(self.desc.id).pass_obj(),
            MethodFlags::STATIC,
            Some(NativeFn::new(body)),
        );
        self.desc.constructors.push(md);
        self
    }

    /// Add a method overload.
    pub fn method<F>(mut self, name: &str, args: &[ArgType], ret: ArgType, body: F) -> Self
    where
        F: Fn(&mut CallFrame) -> BindingResult<()> + 'static,
    {
        let md = self.declare(name, args, ret, MethodFlags::empty(), Some(NativeFn::new(body)));
        self.desc.methods.push(md);
        self
    }

    /// Add a method with explicit flags.
    pub fn method_with<F>(
        mut self,
        name: &str,
        args: &[ArgType],
        ret: ArgType,
        flags: MethodFlags,
        body: F,
    ) -> Self
    where
        F: Fn(&mut CallFrame) -> BindingResult<()> + 'static,
    {
        let md = self.declare(name, args, ret, flags, Some(NativeFn::new(body)));
        self.desc.methods.push(md);
        self
    }

    /// Add a const method.
    pub fn const_method<F>(self, name: &str, args: &[ArgType], ret: ArgType, body: F) -> Self
    where
        F: Fn(&mut CallFrame) -> BindingResult<()> + 'static,
    {
        self.method_with(name, args, ret, MethodFlags::CONST, body)
    }

    /// Declare an overridable virtual method with no native default; a
    /// dispatch with no host override is a no-op returning void/nil.
    pub fn callback(mut self, name: &str, args: &[ArgType], ret: ArgType) -> Self {
        let md = self.declare(name, args, ret, MethodFlags::CALLBACK, None);
        self.desc.methods.push(md);
        self
    }

    /// Declare an overridable virtual method with a native default body.
    pub fn callback_with_default<F>(
        mut self,
        name: &str,
        args: &[ArgType],
        ret: ArgType,
        body: F,
    ) -> Self
    where
        F: Fn(&mut CallFrame) -> BindingResult<()> + 'static,
    {
        let md = self.declare(
            name,
            args,
            ret,
            MethodFlags::CALLBACK,
            Some(NativeFn::new(body)),
        );
        self.desc.methods.push(md);
        self
    }

    /// Declare a broadcast event point.
    pub fn signal(mut self, name: &str, args: &[ArgType], ret: ArgType) -> Self {
        let md = self.declare(name, args, ret, MethodFlags::SIGNAL, None);
        self.desc.methods.push(md);
        self
    }

    /// Finish the descriptor.
    ///
    /// # Panics
    ///
    /// Registration mistakes are fatal: declaring the same constructor or
    /// method signature twice panics with the offending signature.
    pub fn build(self) -> ClassDescriptor {
        let mut seen = FxHashSet::default();
        for m in self.desc.constructors.iter().chain(&self.desc.methods) {
            assert!(
                seen.insert(m.id()),
                "duplicate declaration of {} on class '{}'",
                m.signature(),
                self.desc.name
            );
        }
        self.desc
    }

    fn declare(
        &self,
        name: &str,
        args: &[ArgType],
        ret: ArgType,
        flags: MethodFlags,
        body: Option<NativeFn>,
    ) -> MethodDescriptor {
        let kinds: Vec<BasicType> = args.iter().map(|a| a.basic()).collect();
        MethodDescriptor {
            name: name.to_string(),
            id: MethodId::new(self.desc.id, name, &kinds),
            flags,
            args: args.to_vec(),
            ret,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Counter {
        value: i64,
    }

    #[test]
    fn builder_collects_tables() {
        let desc = ClassBuilder::new("Counter")
            .factory(|| Box::new(Counter::default()))
            .constructor(&[ArgType::scalar(BasicType::Long)], |frame| {
                let value = frame.args.read_int()?;
                frame.return_new(ClassId::from_name("Counter"), Counter { value });
                Ok(())
            })
            .method("value", &[], ArgType::scalar(BasicType::Long), |frame| {
                let v = frame.this_as::<Counter>()?.value;
                frame.ret.write_int(v);
                Ok(())
            })
            .callback("changed", &[ArgType::scalar(BasicType::Long)], ArgType::void())
            .build();

        assert!(desc.can_default_create());
        assert_eq!(desc.constructors_with_arity(1).len(), 1);
        assert_eq!(desc.constructors_with_arity(2).len(), 0);
        assert_eq!(desc.methods_named("value").len(), 1);
        assert!(desc.methods_named("changed")[0].is_callback());
    }

    #[test]
    #[should_panic(expected = "duplicate declaration")]
    fn duplicate_declarations_are_rejected() {
        let _ = ClassBuilder::new("Counter")
            .method("value", &[], ArgType::scalar(BasicType::Long), |_| Ok(()))
            .method("value", &[], ArgType::scalar(BasicType::Long), |_| Ok(()))
            .build();
    }

    #[test]
    fn frame_runs_a_body_end_to_end() {
        let class = ClassId::from_name("Counter");
        let mut instances = InstanceTable::new();
        let this = instances.create(class, Box::new(Counter { value: 41 }));

        let body = NativeFn::new(|frame: &mut CallFrame| {
            let bump = frame.args.read_int()?;
            let counter = frame.this_mut_as::<Counter>()?;
            counter.value += bump;
            let v = counter.value;
            frame.ret.write_int(v);
            Ok(())
        });

        let mut args = SerialArgs::new();
        let mut ret = SerialArgs::new();
        let mut events = Vec::new();
        args.write_int(1);

        let mut frame = CallFrame {
            this: Some(this),
            args: &mut args,
            ret: &mut ret,
            instances: &mut instances,
            events: &mut events,
        };
        body.call(&mut frame).unwrap();
        assert_eq!(ret.read_int().unwrap(), 42);
    }
}
