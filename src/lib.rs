//! crossbind - object marshaling and ownership bridging between a host
//! scripting runtime and native code.
//!
//! The crate sits between two object models that must stay in sync
//! without sharing memory: a dynamically-typed host runtime (objects,
//! lists, maps, callables) and statically-typed native classes. It
//! provides:
//!
//! - a class [`registry`] describing bound classes, constructors,
//!   methods, callbacks and signals ([`ClassBuilder`]),
//! - per-slot type descriptors ([`ArgType`]) with pass modes and
//!   ownership qualifiers,
//! - a typed serialization channel ([`SerialArgs`]) with a call-scoped
//!   scratch [`Heap`] for temporaries,
//! - kind-indexed writer/reader dispatch for every value shape,
//!   including implicit construction of object arguments from tuples,
//! - per-object proxies tracking binding state, ownership and host
//!   overrides, with two-pass overload resolution,
//! - signal broadcast and a GC [`vault`] that keeps wrappers referenced
//!   from native code alive across host collections.
//!
//! Everything meets in the [`Bridge`], which owns the tables and routes
//! dispatch in both directions. The host side is abstracted behind the
//! [`HostRuntime`] trait; [`host::local::LocalHost`] is a table-driven
//! reference implementation used throughout the tests.
//!
//! # Quick start
//!
//! ```
//! use crossbind::{ArgType, BasicType, Bridge, CallFrame, ClassBuilder, ClassId, HostRuntime, Value};
//! use crossbind::host::local::LocalHost;
//!
//! #[derive(Default, Clone)]
//! struct Point { x: i64, y: i64 }
//!
//! let host = LocalHost::new();
//! let host_point = host.define_class("Point", None);
//! let mut bridge = Bridge::new(host);
//!
//! let point_id = ClassId::from_name("Point");
//! let desc = ClassBuilder::new("Point")
//!     .factory(|| Box::new(Point::default()))
//!     .constructor(
//!         &[ArgType::scalar(BasicType::Long), ArgType::scalar(BasicType::Long)],
//!         move |frame: &mut CallFrame| {
//!             let x = frame.args.read_int()?;
//!             let y = frame.args.read_int()?;
//!             frame.return_new(point_id, Point { x, y });
//!             Ok(())
//!         },
//!     )
//!     .method("x", &[], ArgType::scalar(BasicType::Long), |frame: &mut CallFrame| {
//!         let x = frame.this_as::<Point>()?.x;
//!         frame.ret.write_int(x);
//!         Ok(())
//!     })
//!     .build();
//! bridge.register_class(desc, host_point);
//!
//! let wrapper = bridge.host().create_object(host_point);
//! bridge.construct(wrapper, point_id, &[Value::Int(3), Value::Int(4)])?;
//! assert_eq!(bridge.call_method(wrapper, "x", &[])?, Value::Int(3));
//! # Ok::<(), crossbind::BindingError>(())
//! ```
//!
//! # Design notes
//!
//! Native objects are never addressed by pointer: they live in a
//! generational [`InstanceTable`] and are referenced by [`ObjId`], so a
//! stale reference is a detected [`BindingError::ObjectDestroyed`]
//! instead of undefined behavior. Ownership lives on the proxy, not the
//! object; the call heap guarantees temporaries created while
//! marshaling die with the call that made them.

pub mod adaptors;
pub mod arg_type;
pub mod bridge;
pub mod class;
pub mod compat;
pub mod diag;
pub mod error;
pub mod host;
pub mod ident;
pub mod instance;
mod marshal;
pub mod proxy;
pub mod registry;
pub mod serial;
pub mod signal;
pub mod vault;

pub use arg_type::{ArgType, BasicType, PassMode};
pub use bridge::Bridge;
pub use class::{
    CallFrame, ClassBuilder, ClassDescriptor, ClassFlags, LifecycleEvent, MethodDescriptor,
    MethodFlags, NativeFn,
};
pub use compat::MatchPass;
pub use diag::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{BindingError, BindingResult, CallSignal};
pub use host::{HostHandle, HostRuntime, HostSignal, Value, Visibility};
pub use ident::{ClassId, MethodId};
pub use instance::{InstanceTable, ObjId};
pub use proxy::{Proxy, ProxyId};
pub use registry::{ClassRegistry, ClassRepository};
pub use serial::{Heap, ObjectSlot, ScalarCell, SerialArgs, Slot};
pub use signal::SignalHandler;
pub use vault::GcVault;
