//! Deterministic hash-based identity for bound classes and methods.
//!
//! Identities are computed from names (and, for methods, parameter kinds)
//! with XXHash64 plus domain-specific mixing constants, so the same
//! declaration always yields the same id regardless of registration order.
//! Registries key on plain `u64` values with no secondary name-to-id maps,
//! and the class builder uses method ids to reject duplicate declarations.

use std::fmt;

use xxhash_rust::xxh64::xxh64;

use crate::arg_type::BasicType;

/// Domain mixing constants.
///
/// Classes and methods with the same name must not collide, so each entity
/// domain folds in its own constant.
mod domain {
    pub const CLASS: u64 = 0x6d1c_34f2_9b7e_a580;
    pub const METHOD: u64 = 0x1f8a_5c03_d47b_e962;
    pub const SEP: u64 = 0x4bc9_4d6b_d060_53ad;
}

fn mix(seed: u64, word: u64) -> u64 {
    // xxh64 over the 8-byte word, seeded; cheap and stable.
    xxh64(&word.to_le_bytes(), seed)
}

/// Identity of a registered native class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    /// Compute the class id from its registered name.
    pub fn from_name(name: &str) -> Self {
        ClassId(mix(domain::CLASS, xxh64(name.as_bytes(), 0)))
    }

    /// Raw hash value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({:016x})", self.0)
    }
}

/// Identity of a method, constructor, callback or signal declaration.
///
/// The hash covers the owning class, the method name and the basic kinds of
/// the parameters, so overloads of the same name stay distinct.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u64);

impl MethodId {
    /// Compute a method id from its owning class, name and parameter kinds.
    pub fn new(class: ClassId, name: &str, params: &[BasicType]) -> Self {
        let mut h = mix(domain::METHOD, class.raw());
        h = mix(h, xxh64(name.as_bytes(), 0));
        for (i, kind) in params.iter().enumerate() {
            h = mix(h, domain::SEP.wrapping_add(i as u64));
            h = mix(h, *kind as u64);
        }
        MethodId(h)
    }

    /// Raw hash value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({:016x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_are_deterministic() {
        assert_eq!(ClassId::from_name("Point"), ClassId::from_name("Point"));
        assert_ne!(ClassId::from_name("Point"), ClassId::from_name("Box"));
    }

    #[test]
    fn overloads_get_distinct_ids() {
        let class = ClassId::from_name("Point");
        let a = MethodId::new(class, "f", &[BasicType::Int]);
        let b = MethodId::new(class, "f", &[BasicType::Double]);
        let c = MethodId::new(class, "f", &[BasicType::Int]);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn parameter_order_matters() {
        let class = ClassId::from_name("Point");
        let a = MethodId::new(class, "f", &[BasicType::Int, BasicType::Double]);
        let b = MethodId::new(class, "f", &[BasicType::Double, BasicType::Int]);
        assert_ne!(a, b);
    }
}
