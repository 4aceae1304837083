//! Writers and readers - (de)serialization between host values and the
//! argument channel.
//!
//! Each [`BasicType`] kind has one writer (host [`Value`] into a channel
//! slot) and one reader (channel slot back into a host value). Dispatch
//! indexes a static table by kind discriminant, so adding a kind means
//! adding a table row, never touching the call path.
//!
//! Writers honor the slot's [`ArgType`]: mutable indirect scalars become
//! shared boxed cells, nil passes null through nullable modes (string and
//! byte slots substitute an empty value instead, variants box it), and
//! object slots run the full compatibility ladder (alias, copy,
//! conversion, adapter unwrap, implicit construction from a tuple).
//! Temporaries created along the way are parked on the call [`Heap`] and
//! die when the call completes.

use crate::adaptors::{HostBytes, HostMap, HostString, HostVariant, HostVector};
use crate::arg_type::{ArgType, BasicType};
use crate::bridge::Bridge;
use crate::class::MethodDescriptor;
use crate::compat;
use crate::error::{BindingError, BindingResult};
use crate::host::Value;
use crate::ident::ClassId;
use crate::serial::{Heap, ObjectSlot, ScalarCell, SerialArgs, Slot};

type WriteFn = fn(&mut Bridge, &Value, &ArgType, &mut SerialArgs, &mut Heap) -> BindingResult<()>;
type ReadFn = fn(&mut Bridge, &ArgType, &mut SerialArgs) -> BindingResult<Value>;

// Rows are ordered by BasicType discriminant.
static WRITERS: [WriteFn; BasicType::COUNT] = [
    write_void,
    write_bool,
    write_int,
    write_int,
    write_int,
    write_int,
    write_int,
    write_int,
    write_int,
    write_int,
    write_float,
    write_float,
    write_string,
    write_bytes,
    write_variant,
    write_vector,
    write_map,
    write_object,
];

static READERS: [ReadFn; BasicType::COUNT] = [
    read_void,
    read_bool,
    read_int,
    read_int,
    read_int,
    read_int,
    read_int,
    read_int,
    read_int,
    read_int,
    read_float,
    read_float,
    read_string,
    read_bytes,
    read_variant,
    read_vector,
    read_map,
    read_object,
];

impl Bridge {
    /// Serialize one host value into the channel according to `at`.
    pub(crate) fn write_arg(
        &mut self,
        v: &Value,
        at: &ArgType,
        args: &mut SerialArgs,
        heap: &mut Heap,
    ) -> BindingResult<()> {
        WRITERS[at.basic() as usize](self, v, at, args, heap)
    }

    /// Deserialize one channel slot into a host value according to `at`.
    pub(crate) fn read_value(
        &mut self,
        at: &ArgType,
        args: &mut SerialArgs,
    ) -> BindingResult<Value> {
        READERS[at.basic() as usize](self, at, args)
    }
}

fn nil_slot(at: &ArgType, args: &mut SerialArgs) -> BindingResult<()> {
    if at.mode().is_nullable() {
        args.write(Slot::Null);
        Ok(())
    } else {
        Err(BindingError::NilForReference {
            expected: at.to_string(),
        })
    }
}

fn value_mismatch(at: &ArgType, v: &Value) -> BindingError {
    BindingError::TypeMismatch {
        detail: format!("cannot pass {} where {at} is expected", v.kind_name()),
    }
}

// ============================================================================
// Writers
// ============================================================================

fn write_void(
    _: &mut Bridge,
    _: &Value,
    _: &ArgType,
    _: &mut SerialArgs,
    _: &mut Heap,
) -> BindingResult<()> {
    Ok(())
}

fn write_bool(
    _: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    heap: &mut Heap,
) -> BindingResult<()> {
    match v {
        Value::Nil => nil_slot(at, args),
        Value::Bool(b) => {
            if at.mode().is_mutable() {
                args.write(Slot::Boxed(heap.alloc_cell(ScalarCell::Bool(*b))));
            } else {
                args.write_bool(*b);
            }
            Ok(())
        }
        other => Err(value_mismatch(at, other)),
    }
}

fn write_int(
    _: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    heap: &mut Heap,
) -> BindingResult<()> {
    match v {
        Value::Nil => nil_slot(at, args),
        Value::Int(i) => {
            if let Some((lo, hi)) = at.basic().int_range() {
                if *i < lo || *i > hi {
                    return Err(BindingError::TypeMismatch {
                        detail: format!("{i} is out of range for {}", at.basic().name()),
                    });
                }
            }
            if at.mode().is_mutable() {
                args.write(Slot::Boxed(heap.alloc_cell(ScalarCell::Int(*i))));
            } else {
                args.write_int(*i);
            }
            Ok(())
        }
        other => Err(value_mismatch(at, other)),
    }
}

fn write_float(
    _: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    heap: &mut Heap,
) -> BindingResult<()> {
    let f = match v {
        Value::Nil => return nil_slot(at, args),
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        other => return Err(value_mismatch(at, other)),
    };
    if at.mode().is_mutable() {
        args.write(Slot::Boxed(heap.alloc_cell(ScalarCell::Float(f))));
    } else {
        args.write_float(f);
    }
    Ok(())
}

fn write_string(
    _: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    _: &mut Heap,
) -> BindingResult<()> {
    match v {
        Value::Nil if at.mode().is_nullable() => nil_slot(at, args),
        // Nil maps to the empty string when a value is required.
        Value::Nil => {
            args.write(Slot::Str(Box::new(HostString(String::new()))));
            Ok(())
        }
        Value::Str(s) => {
            args.write(Slot::Str(Box::new(HostString(s.clone()))));
            Ok(())
        }
        other => Err(value_mismatch(at, other)),
    }
}

fn write_bytes(
    _: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    _: &mut Heap,
) -> BindingResult<()> {
    match v {
        Value::Nil if at.mode().is_nullable() => nil_slot(at, args),
        Value::Nil => {
            args.write(Slot::Bytes(Box::new(HostBytes(Vec::new()))));
            Ok(())
        }
        Value::Bytes(b) => {
            args.write(Slot::Bytes(Box::new(HostBytes(b.clone()))));
            Ok(())
        }
        other => Err(value_mismatch(at, other)),
    }
}

fn write_variant(
    bridge: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    _: &mut Heap,
) -> BindingResult<()> {
    if v.is_nil() && at.mode().is_nullable() {
        args.write(Slot::Null);
        return Ok(());
    }
    let by_ref = at.mode().is_indirect();
    let value = match v {
        // An object inside a variant follows object ownership rules: an
        // indirect variant aliases the wrapper, a by-value one carries
        // its own copy.
        Value::Object(handle) => bridge.variant_object(*handle, by_ref)?,
        other => other.clone(),
    };
    args.write(Slot::Variant(Box::new(HostVariant { value, by_ref })));
    Ok(())
}

fn write_vector(
    _: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    _: &mut Heap,
) -> BindingResult<()> {
    match v {
        Value::Nil => nil_slot(at, args),
        Value::List(items) => {
            let inner = at.inner().ok_or_else(|| BindingError::TypeMismatch {
                detail: "vector slot lacks an element type".to_string(),
            })?;
            args.write(Slot::Vector(Box::new(HostVector {
                items: items.clone(),
                inner: inner.clone(),
            })));
            Ok(())
        }
        other => Err(value_mismatch(at, other)),
    }
}

fn write_map(
    _: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    _: &mut Heap,
) -> BindingResult<()> {
    match v {
        Value::Nil => nil_slot(at, args),
        Value::Map(pairs) => {
            let (key, value) = match (at.inner_key(), at.inner()) {
                (Some(k), Some(v)) => (k.clone(), v.clone()),
                _ => {
                    return Err(BindingError::TypeMismatch {
                        detail: "map slot lacks key/value types".to_string(),
                    });
                }
            };
            args.write(Slot::Map(Box::new(HostMap {
                items: pairs.clone(),
                key,
                value,
            })));
            Ok(())
        }
        other => Err(value_mismatch(at, other)),
    }
}

fn write_object(
    bridge: &mut Bridge,
    v: &Value,
    at: &ArgType,
    args: &mut SerialArgs,
    heap: &mut Heap,
) -> BindingResult<()> {
    let target = at.class().ok_or_else(|| BindingError::TypeMismatch {
        detail: "object slot lacks a class".to_string(),
    })?;
    match v {
        Value::Nil => nil_slot(at, args),
        Value::Object(handle) => bridge.write_bound_object(*handle, target, at, args, heap),
        Value::List(items) => bridge.write_constructed_object(items, target, at, args, heap),
        other => Err(value_mismatch(at, other)),
    }
}

impl Bridge {
    /// Pass an already-wrapped host object: alias, copy, convert or
    /// unwrap, in that order of preference.
    fn write_bound_object(
        &mut self,
        handle: crate::host::HostHandle,
        target: ClassId,
        at: &ArgType,
        args: &mut SerialArgs,
        heap: &mut Heap,
    ) -> BindingResult<()> {
        let (pid, obj) = self.native_object_for(handle)?;
        let obj_class =
            self.instances
                .class_of(obj)
                .ok_or_else(|| BindingError::ObjectDestroyed {
                    class: self.repo.name_of(target),
                })?;
        let proxy_const = self
            .proxies
            .get(pid)
            .is_some_and(|p| p.is_const());
        if proxy_const && at.mode().is_mutable() {
            return Err(BindingError::TypeMismatch {
                detail: format!(
                    "const {} cannot be passed through a mutable slot",
                    self.repo.name_of(obj_class)
                ),
            });
        }

        if self.repo.is_assignable(obj_class, target) {
            if at.transfers_ownership() {
                // The receiver takes the native lifetime; the wrapper
                // becomes a borrower and is pinned so identity survives
                // while native code holds the object.
                self.release_ownership(pid);
                args.write_object(obj, obj_class, true, false);
                return Ok(());
            }
            if at.prefers_copy() {
                if let Some(tmp) = self.clone_instance(obj, obj_class)? {
                    heap.push_temp_object(tmp);
                    args.write_object(tmp, obj_class, false, false);
                    return Ok(());
                }
            }
            args.write_object(
                obj,
                obj_class,
                false,
                at.mode().is_const() || proxy_const,
            );
            return Ok(());
        }

        if !at.mode().is_mutable() {
            let converter = self
                .repo
                .expect(target)
                .converter_from(obj_class)
                .cloned();
            if let Some(converter) = converter {
                let source = self
                    .instances
                    .get(obj)
                    .ok_or_else(|| BindingError::ObjectDestroyed {
                        class: self.repo.name_of(obj_class),
                    })?;
                let converted = converter(source);
                let tmp = self.instances.create(target, converted);
                heap.push_temp_object(tmp);
                args.write_object(tmp, target, false, at.mode().is_const());
                return Ok(());
            }
        }

        if !at.mode().is_indirect() {
            let unwrap = self.repo.expect(obj_class).adapted_inner().and_then(
                |(inner, f)| (inner == target).then(|| f.clone()),
            );
            if let Some(unwrap) = unwrap {
                let source = self
                    .instances
                    .get(obj)
                    .ok_or_else(|| BindingError::ObjectDestroyed {
                        class: self.repo.name_of(obj_class),
                    })?;
                let inner_value = unwrap(source);
                let tmp = self.instances.create(target, inner_value);
                heap.push_temp_object(tmp);
                args.write_object(tmp, target, false, false);
                return Ok(());
            }
        }

        Err(BindingError::UnexpectedObjectType {
            got: self.repo.name_of(obj_class),
            expected: self.repo.name_of(target),
        })
    }

    /// Implicitly construct an object argument from a host tuple.
    fn write_constructed_object(
        &mut self,
        items: &[Value],
        target: ClassId,
        at: &ArgType,
        args: &mut SerialArgs,
        heap: &mut Heap,
    ) -> BindingResult<()> {
        let class_name = self.repo.name_of(target);
        let ctors: Vec<MethodDescriptor> = self
            .repo
            .expect(target)
            .constructors_with_arity(items.len())
            .into_iter()
            .cloned()
            .collect();
        let no_ctor = || BindingError::NoCompatibleConstructor {
            class: class_name.clone(),
            arity: items.len(),
        };
        if ctors.is_empty() {
            return Err(no_ctor());
        }
        let picked = {
            let lookup = |h| self.proxy_info(h);
            compat::select_overload(&self.repo, &lookup, "new", &ctors, items)?
        };
        let Some((idx, _)) = picked else {
            return Err(no_ctor());
        };
        let ctor = ctors[idx].clone();
        let body = ctor.body().cloned().ok_or_else(no_ctor)?;

        let mut cargs = SerialArgs::new();
        let mut cret = SerialArgs::new();
        for (ctor_at, item) in ctor.args().iter().zip(items) {
            self.write_arg(item, ctor_at, &mut cargs, heap)?;
        }
        self.run_native(&body, None, &mut cargs, &mut cret)?;
        let slot = cret
            .read_object()?
            .ok_or_else(|| BindingError::TypeMismatch {
                detail: format!("constructor of '{class_name}' produced no object"),
            })?;

        if at.transfers_ownership() {
            args.write_object(slot.obj, target, true, false);
        } else {
            // The temporary lives exactly as long as the call.
            heap.push_temp_object(slot.obj);
            args.write_object(slot.obj, target, false, at.mode().is_const());
        }
        Ok(())
    }

    /// Resolve an object carried inside a variant. Indirect variants
    /// alias the existing wrapper; by-value variants get their own copy
    /// when the class is copyable, and fall back to aliasing otherwise.
    pub(crate) fn variant_object(
        &mut self,
        handle: crate::host::HostHandle,
        by_ref: bool,
    ) -> BindingResult<Value> {
        let (_, obj) = self.native_object_for(handle)?;
        if by_ref {
            return Ok(Value::Object(handle));
        }
        let class = self
            .instances
            .class_of(obj)
            .ok_or_else(|| BindingError::ObjectDestroyed {
                class: "<unknown>".to_string(),
            })?;
        match self.clone_instance(obj, class)? {
            Some(copy) => self.wrap_object(
                ObjectSlot {
                    obj: copy,
                    class,
                    pass: true,
                    const_ref: false,
                },
                true,
                false,
            ),
            None => Ok(Value::Object(handle)),
        }
    }

    pub(crate) fn clone_instance(
        &mut self,
        obj: crate::instance::ObjId,
        class: ClassId,
    ) -> BindingResult<Option<crate::instance::ObjId>> {
        let cloner = match self.repo.expect(class).cloner().cloned() {
            Some(c) => c,
            None => return Ok(None),
        };
        let source = self
            .instances
            .get(obj)
            .ok_or_else(|| BindingError::ObjectDestroyed {
                class: self.repo.name_of(class),
            })?;
        let copy = cloner(source);
        Ok(Some(self.instances.create(class, copy)))
    }
}

// ============================================================================
// Readers
// ============================================================================

fn read_void(_: &mut Bridge, _: &ArgType, _: &mut SerialArgs) -> BindingResult<Value> {
    Ok(Value::Nil)
}

fn slot_mismatch(expected: &str, got: &Slot) -> BindingError {
    BindingError::TypeMismatch {
        detail: format!("expected {expected} slot, got {}", got.kind_name()),
    }
}

fn read_bool(_: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Bool(b) => Ok(Value::Bool(b)),
        Slot::Boxed(cell) => match *cell.borrow() {
            ScalarCell::Bool(b) => Ok(Value::Bool(b)),
            _ => Err(BindingError::TypeMismatch {
                detail: "boxed cell does not hold a bool".to_string(),
            }),
        },
        other => Err(slot_mismatch("bool", &other)),
    }
}

fn read_int(_: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Int(i) => Ok(Value::Int(i)),
        Slot::Boxed(cell) => match *cell.borrow() {
            ScalarCell::Int(i) => Ok(Value::Int(i)),
            _ => Err(BindingError::TypeMismatch {
                detail: "boxed cell does not hold an int".to_string(),
            }),
        },
        other => Err(slot_mismatch("int", &other)),
    }
}

fn read_float(_: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Float(f) => Ok(Value::Float(f)),
        Slot::Int(i) => Ok(Value::Float(i as f64)),
        Slot::Boxed(cell) => match *cell.borrow() {
            ScalarCell::Float(f) => Ok(Value::Float(f)),
            ScalarCell::Int(i) => Ok(Value::Float(i as f64)),
            _ => Err(BindingError::TypeMismatch {
                detail: "boxed cell does not hold a float".to_string(),
            }),
        },
        other => Err(slot_mismatch("float", &other)),
    }
}

fn read_string(_: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Str(adaptor) => Ok(Value::Str(adaptor.get())),
        other => Err(slot_mismatch("string", &other)),
    }
}

fn read_bytes(_: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Bytes(adaptor) => Ok(Value::Bytes(adaptor.get())),
        other => Err(slot_mismatch("bytes", &other)),
    }
}

fn read_variant(bridge: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Variant(adaptor) => {
            let v = adaptor.get();
            // An owned variant hands any object payload to the receiver.
            if !adaptor.is_ref() {
                if let Value::Object(handle) = &v {
                    bridge.reclaim_wrapper(*handle);
                }
            }
            Ok(v)
        }
        other => Err(slot_mismatch("variant", &other)),
    }
}

fn read_vector(_: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Vector(adaptor) => Ok(Value::List(adaptor.to_list())),
        other => Err(slot_mismatch("vector", &other)),
    }
}

fn read_map(_: &mut Bridge, _: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    match args.read()? {
        Slot::Null => Ok(Value::Nil),
        Slot::Map(adaptor) => Ok(Value::Map(adaptor.to_pairs())),
        other => Err(slot_mismatch("map", &other)),
    }
}

fn read_object(bridge: &mut Bridge, at: &ArgType, args: &mut SerialArgs) -> BindingResult<Value> {
    let Some(slot) = args.read_object()? else {
        return Ok(Value::Nil);
    };
    // Ownership arrives with the slot (explicit transfer) or because the
    // slot is by-value, which always hands the receiver its own object.
    let owned = slot.pass || !at.mode().is_indirect();
    bridge.wrap_object(slot, owned, at.prefers_copy())
}
