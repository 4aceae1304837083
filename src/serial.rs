//! SerialArgs and Heap - the per-call serialization channel.
//!
//! One call across the boundary owns one pair of [`SerialArgs`] channels:
//! arguments are written by the calling side and read by the callee in the
//! same order; the return value travels back the same way. Slots are
//! typed; reading a slot of the wrong kind is a `TypeMismatch`, never a
//! reinterpretation.
//!
//! [`Heap`] is the call-scoped scratch arena. Implicit-construction
//! temporaries, converted copies and boxed scalar cells created during
//! (de)serialization are pushed here, and the dispatcher drains the heap
//! when the call completes — destroying owned temporaries. A heap that is
//! still non-empty when it is dropped indicates a missed ownership
//! transfer and trips a `debug_assert!` in debug builds.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::adaptors::{ByteArrayAdaptor, MapAdaptor, StringAdaptor, VariantAdaptor, VectorAdaptor};
use crate::error::{BindingError, BindingResult};
use crate::ident::ClassId;
use crate::instance::{InstanceTable, ObjId};

/// A scalar passed by reference: a shared mutable cell both sides alias.
pub type BoxedScalar = Rc<RefCell<ScalarCell>>;

/// Contents of a boxed scalar cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarCell {
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// An object crossing the channel.
#[derive(Debug, Clone, Copy)]
pub struct ObjectSlot {
    /// The native instance.
    pub obj: ObjId,
    /// Class the sender declared for the slot.
    pub class: ClassId,
    /// Ownership transfers to the receiver.
    pub pass: bool,
    /// The receiver must treat the object as const.
    pub const_ref: bool,
}

/// One typed slot in the channel.
pub enum Slot {
    /// Null pointer (nil through a ptr/cptr qualifier).
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Scalar passed by mutable reference or pointer.
    Boxed(BoxedScalar),
    Str(Box<dyn StringAdaptor>),
    Bytes(Box<dyn ByteArrayAdaptor>),
    Variant(Box<dyn VariantAdaptor>),
    Vector(Box<dyn VectorAdaptor>),
    Map(Box<dyn MapAdaptor>),
    Object(ObjectSlot),
}

impl Slot {
    /// Kind name for mismatch diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Slot::Null => "null",
            Slot::Bool(_) => "bool",
            Slot::Int(_) => "int",
            Slot::Float(_) => "float",
            Slot::Boxed(_) => "boxed scalar",
            Slot::Str(_) => "string",
            Slot::Bytes(_) => "bytes",
            Slot::Variant(_) => "variant",
            Slot::Vector(_) => "vector",
            Slot::Map(_) => "map",
            Slot::Object(_) => "object",
        }
    }
}

fn mismatch(expected: &str, got: &Slot) -> BindingError {
    BindingError::TypeMismatch {
        detail: format!("expected {expected} slot, got {}", got.kind_name()),
    }
}

/// FIFO of typed slots for one direction of one call.
#[derive(Default)]
pub struct SerialArgs {
    slots: VecDeque<Slot>,
}

impl SerialArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append a slot.
    pub fn write(&mut self, slot: Slot) {
        self.slots.push_back(slot);
    }

    /// Remove and return the next slot.
    pub fn read(&mut self) -> BindingResult<Slot> {
        self.slots.pop_front().ok_or(BindingError::TypeMismatch {
            detail: "read past the end of the argument channel".to_string(),
        })
    }

    // === Typed writers (native-side convenience) ===

    pub fn write_bool(&mut self, v: bool) {
        self.write(Slot::Bool(v));
    }

    pub fn write_int(&mut self, v: i64) {
        self.write(Slot::Int(v));
    }

    pub fn write_float(&mut self, v: f64) {
        self.write(Slot::Float(v));
    }

    pub fn write_object(&mut self, obj: ObjId, class: ClassId, pass: bool, const_ref: bool) {
        self.write(Slot::Object(ObjectSlot {
            obj,
            class,
            pass,
            const_ref,
        }));
    }

    // === Typed readers ===

    pub fn read_bool(&mut self) -> BindingResult<bool> {
        match self.read()? {
            Slot::Bool(v) => Ok(v),
            Slot::Boxed(cell) => match *cell.borrow() {
                ScalarCell::Bool(v) => Ok(v),
                _ => Err(BindingError::TypeMismatch {
                    detail: "boxed cell does not hold a bool".to_string(),
                }),
            },
            other => Err(mismatch("bool", &other)),
        }
    }

    pub fn read_int(&mut self) -> BindingResult<i64> {
        match self.read()? {
            Slot::Int(v) => Ok(v),
            Slot::Boxed(cell) => match *cell.borrow() {
                ScalarCell::Int(v) => Ok(v),
                _ => Err(BindingError::TypeMismatch {
                    detail: "boxed cell does not hold an int".to_string(),
                }),
            },
            other => Err(mismatch("int", &other)),
        }
    }

    pub fn read_float(&mut self) -> BindingResult<f64> {
        match self.read()? {
            Slot::Float(v) => Ok(v),
            Slot::Int(v) => Ok(v as f64),
            Slot::Boxed(cell) => match *cell.borrow() {
                ScalarCell::Float(v) => Ok(v),
                ScalarCell::Int(v) => Ok(v as f64),
                _ => Err(BindingError::TypeMismatch {
                    detail: "boxed cell does not hold a float".to_string(),
                }),
            },
            other => Err(mismatch("float", &other)),
        }
    }

    /// Read a scalar slot passed by reference, yielding the shared cell.
    pub fn read_boxed(&mut self) -> BindingResult<BoxedScalar> {
        match self.read()? {
            Slot::Boxed(cell) => Ok(cell),
            other => Err(mismatch("boxed scalar", &other)),
        }
    }

    pub fn read_string(&mut self) -> BindingResult<String> {
        match self.read()? {
            Slot::Str(adaptor) => Ok(adaptor.get()),
            other => Err(mismatch("string", &other)),
        }
    }

    pub fn read_bytes(&mut self) -> BindingResult<Vec<u8>> {
        match self.read()? {
            Slot::Bytes(adaptor) => Ok(adaptor.get()),
            other => Err(mismatch("bytes", &other)),
        }
    }

    pub fn read_variant(&mut self) -> BindingResult<Box<dyn VariantAdaptor>> {
        match self.read()? {
            Slot::Variant(adaptor) => Ok(adaptor),
            other => Err(mismatch("variant", &other)),
        }
    }

    pub fn read_vector(&mut self) -> BindingResult<Box<dyn VectorAdaptor>> {
        match self.read()? {
            Slot::Vector(adaptor) => Ok(adaptor),
            other => Err(mismatch("vector", &other)),
        }
    }

    pub fn read_map(&mut self) -> BindingResult<Box<dyn MapAdaptor>> {
        match self.read()? {
            Slot::Map(adaptor) => Ok(adaptor),
            other => Err(mismatch("map", &other)),
        }
    }

    /// Read an object slot; `Null` yields `None`.
    pub fn read_object(&mut self) -> BindingResult<Option<ObjectSlot>> {
        match self.read()? {
            Slot::Object(slot) => Ok(Some(slot)),
            Slot::Null => Ok(None),
            other => Err(mismatch("object", &other)),
        }
    }
}

enum HeapEntry {
    /// A temporary native object the channel owns for the call's duration.
    TempObject(ObjId),
    /// A boxed scalar cell allocated for by-reference passing.
    Boxed(#[allow(dead_code)] BoxedScalar),
}

/// Call-scoped scratch arena.
///
/// Entries must be balanced: everything pushed during marshaling is
/// released by [`Heap::drain`] when the call completes. Dropping a
/// non-drained heap is an ownership-accounting bug.
#[derive(Default)]
pub struct Heap {
    entries: Vec<HeapEntry>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a temporary object; it is destroyed on drain.
    pub fn push_temp_object(&mut self, obj: ObjId) {
        self.entries.push(HeapEntry::TempObject(obj));
    }

    /// Allocate a shared scalar cell scoped to this call.
    pub fn alloc_cell(&mut self, cell: ScalarCell) -> BoxedScalar {
        let boxed: BoxedScalar = Rc::new(RefCell::new(cell));
        self.entries.push(HeapEntry::Boxed(Rc::clone(&boxed)));
        boxed
    }

    /// Release everything this call allocated, destroying owned
    /// temporaries. Must run exactly once per call, including on error
    /// paths.
    pub fn drain(&mut self, instances: &mut InstanceTable) {
        for entry in self.entries.drain(..) {
            match entry {
                HeapEntry::TempObject(obj) => {
                    instances.destroy(obj);
                }
                HeapEntry::Boxed(_) => {}
            }
        }
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.entries.is_empty(),
                "call heap not drained: {} entries leaked",
                self.entries.len()
            );
        }
    }
}
