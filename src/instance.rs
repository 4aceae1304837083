//! InstanceTable - generational storage for native objects.
//!
//! The binding layer never hands out raw pointers to native objects.
//! Instances live in a slab indexed by [`ObjId`], a pair of slot index and
//! generation; destroying a slot bumps its generation, so a stale id can
//! be detected instead of dangling. This is what backs the
//! `ObjectDestroyed` taxonomy.
//!
//! The table also keeps per-class destruction counters so ownership
//! round-trips are verifiable (exactly one destruction, never two).

use std::any::Any;

use rustc_hash::FxHashMap;

use crate::ident::ClassId;

/// Identity of a live (or once-live) native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId {
    index: u32,
    generation: u32,
}

struct Occupied {
    class: ClassId,
    value: Box<dyn Any>,
}

struct Entry {
    generation: u32,
    payload: Option<Occupied>,
}

/// Slab of type-erased native objects with use-after-free detection.
#[derive(Default)]
pub struct InstanceTable {
    entries: Vec<Entry>,
    free: Vec<u32>,
    destroyed: FxHashMap<ClassId, usize>,
    live: usize,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly constructed native object.
    pub fn create(&mut self, class: ClassId, value: Box<dyn Any>) -> ObjId {
        self.live += 1;
        let payload = Some(Occupied { class, value });
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.payload = payload;
                ObjId {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    payload,
                });
                ObjId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Run the native destructor (drop) for `id`.
    ///
    /// Returns false if the object was already destroyed; a double destroy
    /// is therefore observable, never undefined.
    pub fn destroy(&mut self, id: ObjId) -> bool {
        match self.entries.get_mut(id.index as usize) {
            Some(entry) if entry.generation == id.generation && entry.payload.is_some() => {
                let occupied = entry.payload.take().expect("checked above");
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
                *self.destroyed.entry(occupied.class).or_insert(0) += 1;
                drop(occupied);
                true
            }
            _ => false,
        }
    }

    /// Whether `id` still refers to a live object.
    pub fn is_alive(&self, id: ObjId) -> bool {
        self.entry(id).is_some()
    }

    /// Most-derived class the object was created as.
    pub fn class_of(&self, id: ObjId) -> Option<ClassId> {
        self.entry(id).map(|o| o.class)
    }

    /// Type-erased access.
    pub fn get(&self, id: ObjId) -> Option<&dyn Any> {
        self.entry(id).map(|o| o.value.as_ref())
    }

    /// Typed access.
    pub fn get_as<T: 'static>(&self, id: ObjId) -> Option<&T> {
        self.entry(id).and_then(|o| o.value.downcast_ref::<T>())
    }

    /// Typed mutable access.
    pub fn get_mut_as<T: 'static>(&mut self, id: ObjId) -> Option<&mut T> {
        match self.entries.get_mut(id.index as usize) {
            Some(entry) if entry.generation == id.generation => entry
                .payload
                .as_mut()
                .and_then(|o| o.value.downcast_mut::<T>()),
            _ => None,
        }
    }

    /// How many objects of `class` have been destroyed so far.
    pub fn destroyed_count(&self, class: ClassId) -> usize {
        self.destroyed.get(&class).copied().unwrap_or(0)
    }

    /// Number of currently live objects.
    pub fn live_count(&self) -> usize {
        self.live
    }

    fn entry(&self, id: ObjId) -> Option<&Occupied> {
        match self.entries.get(id.index as usize) {
            Some(entry) if entry.generation == id.generation => entry.payload.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Dummy(i32);

    #[test]
    fn stale_ids_do_not_resolve() {
        let mut table = InstanceTable::new();
        let class = ClassId::from_name("Dummy");
        let id = table.create(class, Box::new(Dummy(7)));
        assert_eq!(table.get_as::<Dummy>(id), Some(&Dummy(7)));

        assert!(table.destroy(id));
        assert!(!table.is_alive(id));
        assert!(table.get_as::<Dummy>(id).is_none());

        // Slot reuse must not resurrect the old id.
        let id2 = table.create(class, Box::new(Dummy(8)));
        assert!(!table.is_alive(id));
        assert_eq!(table.get_as::<Dummy>(id2), Some(&Dummy(8)));
    }

    #[test]
    fn double_destroy_is_detected() {
        let mut table = InstanceTable::new();
        let class = ClassId::from_name("Dummy");
        let id = table.create(class, Box::new(Dummy(1)));
        assert!(table.destroy(id));
        assert!(!table.destroy(id));
        assert_eq!(table.destroyed_count(class), 1);
    }
}
