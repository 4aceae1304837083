//! Host-runtime boundary: dynamic values and the capability contract.
//!
//! The binding core never talks to a concrete scripting runtime; it talks
//! to the [`HostRuntime`] trait, which captures exactly the capabilities
//! the core consumes: method invocation with pre-marshaled arguments,
//! class-membership queries, wrapper creation, a GC root-registration
//! primitive and a thread-ownership query.
//!
//! [`Value`] is the host-side dynamic value as seen by the core. It is the
//! only currency that crosses the trait: host containers arrive as lists
//! and maps of `Value`, host objects and callables arrive as opaque
//! [`HostHandle`]s.
//!
//! [`local::LocalHost`] is a small table-driven reference implementation
//! used by doctests, integration tests and the benchmark.

pub mod local;

use std::fmt;

use crate::bridge::Bridge;

/// Opaque handle to a host-runtime object, class or callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

/// A host-runtime dynamic value.
///
/// Integers are normalized to `i64` and floats to `f64`; the per-slot
/// [`crate::ArgType`] decides the native width and checks range on write.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// The host's native sequence type; also the tuple used for implicit
    /// construction of object arguments.
    List(Vec<Value>),
    /// The host's native mapping type, in insertion order.
    Map(Vec<(Value, Value)>),
    /// A host callable (function, lambda, bound method).
    Callable(HostHandle),
    /// A host object; usually a wrapper bound to a native object.
    Object(HostHandle),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Callable(_) => "callable",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::List(items) => write!(f, "list[{}]", items.len()),
            Value::Map(items) => write!(f, "map[{}]", items.len()),
            Value::Callable(h) => write!(f, "callable#{}", h.0),
            Value::Object(h) => write!(f, "object#{}", h.0),
        }
    }
}

/// Signal raised by the host runtime out of an invocation.
///
/// `Error` is a genuine host exception; `Unwind` is host-internal control
/// flow (early return, loop break) that must pass through native frames as
/// a non-error cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostSignal {
    Error(String),
    Unwind(Value),
}

/// Method visibility as queried on host classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
}

/// Capability contract consumed from the embedded scripting runtime.
///
/// Implementations are expected to be single-threaded: all dispatch runs
/// on the thread that owns the runtime, and [`owns_current_thread`]
/// answers whether the caller is on it.
///
/// [`owns_current_thread`]: HostRuntime::owns_current_thread
pub trait HostRuntime {
    /// Call a host method on `target` with pre-marshaled arguments.
    ///
    /// The bridge that initiated the dispatch is handed back so the host
    /// body can reenter it: an override may construct, call methods or
    /// raise signals before returning.
    fn invoke(
        &self,
        bridge: &mut Bridge,
        target: HostHandle,
        method: &str,
        argv: &[Value],
    ) -> Result<Value, HostSignal>;

    /// Call a standalone host callable; the bridge is reenterable as in
    /// [`invoke`](HostRuntime::invoke).
    fn call_callable(
        &self,
        bridge: &mut Bridge,
        callable: HostHandle,
        argv: &[Value],
    ) -> Result<Value, HostSignal>;

    /// Instantiate a (wrapper) object of the given host class without
    /// running host-side constructors.
    fn create_object(&self, class: HostHandle) -> HostHandle;

    /// The host class of an object.
    fn class_of(&self, obj: HostHandle) -> HostHandle;

    /// The direct superclass of a host class, if any.
    fn superclass(&self, class: HostHandle) -> Option<HostHandle>;

    /// Whether `class` is `ancestor` or derives from it.
    fn is_subclass_of(&self, class: HostHandle, ancestor: HostHandle) -> bool {
        let mut cur = Some(class);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.superclass(c);
        }
        false
    }

    /// Whether `class` (or an ancestor) defines a method of the given
    /// name. Protected-visibility variants count when `include_protected`.
    fn defines_method(&self, class: HostHandle, name: &str, include_protected: bool) -> bool;

    /// Whether a host object is still alive (not collected).
    fn is_alive(&self, obj: HostHandle) -> bool;

    /// GC root-registration primitive: while rooted, `handle` must be
    /// treated as live by the host collector. The vault guarantees
    /// balanced rooting; implementations may treat this as a flag.
    fn gc_root(&self, handle: HostHandle, rooted: bool);

    /// Whether the calling thread owns this runtime instance.
    fn owns_current_thread(&self) -> bool;
}

/// Shared handles to a host runtime are themselves a host runtime; the
/// embedder keeps one handle and hands the other to the bridge.
impl<H: HostRuntime + ?Sized> HostRuntime for std::rc::Rc<H> {
    fn invoke(
        &self,
        bridge: &mut Bridge,
        target: HostHandle,
        method: &str,
        argv: &[Value],
    ) -> Result<Value, HostSignal> {
        (**self).invoke(bridge, target, method, argv)
    }

    fn call_callable(
        &self,
        bridge: &mut Bridge,
        callable: HostHandle,
        argv: &[Value],
    ) -> Result<Value, HostSignal> {
        (**self).call_callable(bridge, callable, argv)
    }

    fn create_object(&self, class: HostHandle) -> HostHandle {
        (**self).create_object(class)
    }

    fn class_of(&self, obj: HostHandle) -> HostHandle {
        (**self).class_of(obj)
    }

    fn superclass(&self, class: HostHandle) -> Option<HostHandle> {
        (**self).superclass(class)
    }

    fn is_subclass_of(&self, class: HostHandle, ancestor: HostHandle) -> bool {
        (**self).is_subclass_of(class, ancestor)
    }

    fn defines_method(&self, class: HostHandle, name: &str, include_protected: bool) -> bool {
        (**self).defines_method(class, name, include_protected)
    }

    fn is_alive(&self, obj: HostHandle) -> bool {
        (**self).is_alive(obj)
    }

    fn gc_root(&self, handle: HostHandle, rooted: bool) {
        (**self).gc_root(handle, rooted)
    }

    fn owns_current_thread(&self) -> bool {
        (**self).owns_current_thread()
    }
}
