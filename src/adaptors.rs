//! Adaptors - type-erased views over strings, buffers and containers.
//!
//! Marshaling code copies container contents between the two runtimes
//! without ever learning which side owns the underlying storage. Each
//! adaptor trait exposes size, iteration and mutation; the channel carries
//! boxed trait objects.
//!
//! Two families implement the traits:
//!
//! - `Host*` adaptors own a detached copy of the data (built from a host
//!   [`Value`]),
//! - `Shared*` adaptors alias storage owned by native code through
//!   `Rc<RefCell<..>>`, so mutation through the adaptor is visible to the
//!   native holder.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::arg_type::ArgType;
use crate::host::Value;

// ============================================================================
// Strings
// ============================================================================

/// Type-erased read/write view over a string.
pub trait StringAdaptor {
    fn size(&self) -> usize;
    fn get(&self) -> String;
    fn set(&mut self, s: &str);
}

/// String adaptor owning a detached copy.
pub struct HostString(pub String);

impl StringAdaptor for HostString {
    fn size(&self) -> usize {
        self.0.len()
    }

    fn get(&self) -> String {
        self.0.clone()
    }

    fn set(&mut self, s: &str) {
        self.0 = s.to_string();
    }
}

/// String adaptor aliasing native-owned storage.
pub struct SharedString(pub Rc<RefCell<String>>);

impl StringAdaptor for SharedString {
    fn size(&self) -> usize {
        self.0.borrow().len()
    }

    fn get(&self) -> String {
        self.0.borrow().clone()
    }

    fn set(&mut self, s: &str) {
        *self.0.borrow_mut() = s.to_string();
    }
}

// ============================================================================
// Byte buffers
// ============================================================================

/// Type-erased read/write view over a byte buffer.
pub trait ByteArrayAdaptor {
    fn size(&self) -> usize;
    fn get(&self) -> Vec<u8>;
    fn set(&mut self, data: &[u8]);
}

/// Byte buffer adaptor owning a detached copy.
pub struct HostBytes(pub Vec<u8>);

impl ByteArrayAdaptor for HostBytes {
    fn size(&self) -> usize {
        self.0.len()
    }

    fn get(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn set(&mut self, data: &[u8]) {
        self.0 = data.to_vec();
    }
}

/// Byte buffer adaptor aliasing native-owned storage.
pub struct SharedBytes(pub Rc<RefCell<Vec<u8>>>);

impl ByteArrayAdaptor for SharedBytes {
    fn size(&self) -> usize {
        self.0.borrow().len()
    }

    fn get(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    fn set(&mut self, data: &[u8]) {
        *self.0.borrow_mut() = data.to_vec();
    }
}

// ============================================================================
// Variants (dynamic values)
// ============================================================================

/// Type-erased view over a dynamic value.
///
/// `is_ref` records whether the variant aliases caller storage; a variant
/// holding an object follows object ownership rules based on this flag.
pub trait VariantAdaptor {
    fn get(&self) -> Value;
    fn set(&mut self, v: Value);
    fn is_ref(&self) -> bool;
}

/// Variant adaptor owning (or aliasing, per flag) one host value.
pub struct HostVariant {
    pub value: Value,
    pub by_ref: bool,
}

impl VariantAdaptor for HostVariant {
    fn get(&self) -> Value {
        self.value.clone()
    }

    fn set(&mut self, v: Value) {
        self.value = v;
    }

    fn is_ref(&self) -> bool {
        self.by_ref
    }
}

// ============================================================================
// Vectors
// ============================================================================

/// Cursor over a vector adaptor.
pub trait VectorIter {
    fn at_end(&self) -> bool;
    fn inc(&mut self);
    fn get(&self) -> Value;
}

/// Type-erased view over a sequence, parameterized by its element type.
pub trait VectorAdaptor {
    fn inner(&self) -> &ArgType;
    fn size(&self) -> usize;
    fn create_iterator(&self) -> Box<dyn VectorIter + '_>;
    fn push(&mut self, v: Value);
    fn clear(&mut self);

    /// Detached copy of the contents, in order.
    fn to_list(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.size());
        let mut it = self.create_iterator();
        while !it.at_end() {
            out.push(it.get());
            it.inc();
        }
        out
    }
}

struct SliceIter<'a> {
    items: &'a [Value],
    pos: usize,
}

impl VectorIter for SliceIter<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    fn inc(&mut self) {
        self.pos += 1;
    }

    fn get(&self) -> Value {
        self.items[self.pos].clone()
    }
}

/// Sequence adaptor owning a detached copy.
pub struct HostVector {
    pub items: Vec<Value>,
    pub inner: ArgType,
}

impl VectorAdaptor for HostVector {
    fn inner(&self) -> &ArgType {
        &self.inner
    }

    fn size(&self) -> usize {
        self.items.len()
    }

    fn create_iterator(&self) -> Box<dyn VectorIter + '_> {
        Box::new(SliceIter {
            items: &self.items,
            pos: 0,
        })
    }

    fn push(&mut self, v: Value) {
        self.items.push(v);
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

struct SharedVecIter {
    items: Rc<RefCell<Vec<Value>>>,
    pos: usize,
}

impl VectorIter for SharedVecIter {
    fn at_end(&self) -> bool {
        self.pos >= self.items.borrow().len()
    }

    fn inc(&mut self) {
        self.pos += 1;
    }

    fn get(&self) -> Value {
        self.items.borrow()[self.pos].clone()
    }
}

/// Sequence adaptor aliasing native-owned storage.
pub struct SharedVector {
    pub items: Rc<RefCell<Vec<Value>>>,
    pub inner: ArgType,
}

impl VectorAdaptor for SharedVector {
    fn inner(&self) -> &ArgType {
        &self.inner
    }

    fn size(&self) -> usize {
        self.items.borrow().len()
    }

    fn create_iterator(&self) -> Box<dyn VectorIter + '_> {
        Box::new(SharedVecIter {
            items: Rc::clone(&self.items),
            pos: 0,
        })
    }

    fn push(&mut self, v: Value) {
        self.items.borrow_mut().push(v);
    }

    fn clear(&mut self) {
        self.items.borrow_mut().clear();
    }
}

// ============================================================================
// Maps
// ============================================================================

/// Cursor over a map adaptor.
pub trait MapIter {
    fn at_end(&self) -> bool;
    fn inc(&mut self);
    fn get(&self) -> (Value, Value);
}

/// Type-erased view over a mapping, parameterized by key and value types.
pub trait MapAdaptor {
    fn key_type(&self) -> &ArgType;
    fn value_type(&self) -> &ArgType;
    fn size(&self) -> usize;
    fn create_iterator(&self) -> Box<dyn MapIter + '_>;
    fn insert(&mut self, k: Value, v: Value);
    fn clear(&mut self);

    /// Detached copy of the entries, in insertion order.
    fn to_pairs(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.size());
        let mut it = self.create_iterator();
        while !it.at_end() {
            out.push(it.get());
            it.inc();
        }
        out
    }
}

struct PairIter<'a> {
    items: &'a [(Value, Value)],
    pos: usize,
}

impl MapIter for PairIter<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    fn inc(&mut self) {
        self.pos += 1;
    }

    fn get(&self) -> (Value, Value) {
        self.items[self.pos].clone()
    }
}

/// Mapping adaptor owning a detached copy.
pub struct HostMap {
    pub items: Vec<(Value, Value)>,
    pub key: ArgType,
    pub value: ArgType,
}

impl MapAdaptor for HostMap {
    fn key_type(&self) -> &ArgType {
        &self.key
    }

    fn value_type(&self) -> &ArgType {
        &self.value
    }

    fn size(&self) -> usize {
        self.items.len()
    }

    fn create_iterator(&self) -> Box<dyn MapIter + '_> {
        Box::new(PairIter {
            items: &self.items,
            pos: 0,
        })
    }

    fn insert(&mut self, k: Value, v: Value) {
        match self.items.iter_mut().find(|(ik, _)| *ik == k) {
            Some(slot) => slot.1 = v,
            None => self.items.push((k, v)),
        }
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

struct SharedPairIter {
    items: Rc<RefCell<Vec<(Value, Value)>>>,
    pos: usize,
}

impl MapIter for SharedPairIter {
    fn at_end(&self) -> bool {
        self.pos >= self.items.borrow().len()
    }

    fn inc(&mut self) {
        self.pos += 1;
    }

    fn get(&self) -> (Value, Value) {
        self.items.borrow()[self.pos].clone()
    }
}

/// Mapping adaptor aliasing native-owned storage.
pub struct SharedMap {
    pub items: Rc<RefCell<Vec<(Value, Value)>>>,
    pub key: ArgType,
    pub value: ArgType,
}

impl MapAdaptor for SharedMap {
    fn key_type(&self) -> &ArgType {
        &self.key
    }

    fn value_type(&self) -> &ArgType {
        &self.value
    }

    fn size(&self) -> usize {
        self.items.borrow().len()
    }

    fn create_iterator(&self) -> Box<dyn MapIter + '_> {
        Box::new(SharedPairIter {
            items: Rc::clone(&self.items),
            pos: 0,
        })
    }

    fn insert(&mut self, k: Value, v: Value) {
        let mut items = self.items.borrow_mut();
        match items.iter_mut().find(|(ik, _)| *ik == k) {
            Some(slot) => slot.1 = v,
            None => items.push((k, v)),
        }
    }

    fn clear(&mut self) {
        self.items.borrow_mut().clear();
    }
}

impl fmt::Debug for HostVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostVector(len={}, inner={})", self.items.len(), self.inner)
    }
}
