//! Type-compatibility testing and overload selection.
//!
//! Resolution runs in two passes over the overloads of matching arity.
//! The strict pass demands exact kinds: integers in range, floats only
//! for float slots, objects of exactly the declared class. Only when the
//! strict pass finds nothing does the loose pass apply widenings:
//! int-to-float, derived-to-base, registered conversions, and tuples
//! standing in for implicitly constructed objects.
//!
//! Within a pass, more than one match is an [`AmbiguousOverload`] error
//! listing the candidates in declaration order; resolution never guesses.
//!
//! Object operands are host wrappers; the caller supplies a lookup from
//! host handle to the wrapper's binding snapshot ([`ProxyInfo`]) so this
//! module stays independent of the proxy table.
//!
//! [`AmbiguousOverload`]: crate::error::BindingError::AmbiguousOverload

use crate::arg_type::{ArgType, BasicType};
use crate::class::MethodDescriptor;
use crate::error::{BindingError, BindingResult};
use crate::host::{HostHandle, Value};
use crate::proxy::ProxyInfo;
use crate::registry::ClassRepository;

/// Which resolution pass produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    Strict,
    Loose,
}

/// Lookup from a host object handle to its binding snapshot.
pub type ProxyLookup<'a> = &'a dyn Fn(HostHandle) -> Option<ProxyInfo>;

/// Whether `v` can serialize into a slot of type `at`.
pub fn compatible(
    repo: &ClassRepository,
    lookup: ProxyLookup,
    at: &ArgType,
    v: &Value,
    loose: bool,
) -> bool {
    if v.is_nil() {
        // String and byte slots absorb nil as an empty value, a variant
        // boxes it; every other kind needs a nullable mode.
        return match at.basic() {
            BasicType::String | BasicType::ByteArray | BasicType::Variant => true,
            _ => at.mode().is_nullable(),
        };
    }
    match at.basic() {
        BasicType::Void => false,
        BasicType::Bool => matches!(v, Value::Bool(_)),
        kind if kind.is_int() => match (v, kind.int_range()) {
            (Value::Int(i), Some((lo, hi))) => *i >= lo && *i <= hi,
            _ => false,
        },
        kind if kind.is_float() => match v {
            Value::Float(_) => true,
            Value::Int(_) => loose,
            _ => false,
        },
        BasicType::String => matches!(v, Value::Str(_)),
        BasicType::ByteArray => matches!(v, Value::Bytes(_)),
        BasicType::Variant => true,
        BasicType::Vector => match (v, at.inner()) {
            (Value::List(items), Some(inner)) => items
                .iter()
                .all(|item| compatible(repo, lookup, inner, item, loose)),
            _ => false,
        },
        BasicType::Map => match (v, at.inner_key(), at.inner()) {
            (Value::Map(pairs), Some(key), Some(value)) => pairs.iter().all(|(k, val)| {
                compatible(repo, lookup, key, k, loose)
                    && compatible(repo, lookup, value, val, loose)
            }),
            _ => false,
        },
        BasicType::Object => object_compatible(repo, lookup, at, v, loose),
        _ => false,
    }
}

fn object_compatible(
    repo: &ClassRepository,
    lookup: ProxyLookup,
    at: &ArgType,
    v: &Value,
    loose: bool,
) -> bool {
    let Some(target) = at.class() else {
        return false;
    };
    match v {
        Value::Object(handle) => {
            let Some(info) = lookup(*handle) else {
                return false;
            };
            if !info.alive {
                return false;
            }
            // A const view never satisfies a mutable slot.
            if info.const_ref && at.mode().is_mutable() {
                return false;
            }
            if info.class == target {
                return true;
            }
            if !loose {
                return false;
            }
            if repo.is_assignable(info.class, target) {
                return true;
            }
            // Conversions produce a copy, so they only satisfy slots that
            // never mutate the original.
            if !at.mode().is_mutable() && repo.is_convertible(info.class, target) {
                return true;
            }
            // An adapter instance unwraps to its inner class when the
            // slot takes the inner by value.
            if let Some(desc) = repo.get(info.class) {
                if let Some((inner, _)) = desc.adapted_inner() {
                    if inner == target && !at.mode().is_indirect() {
                        return true;
                    }
                }
            }
            false
        }
        // A tuple stands in for an object when the class has a
        // constructor of matching arity; only in the loose pass.
        Value::List(items) if loose => repo
            .get(target)
            .is_some_and(|desc| !desc.constructors_with_arity(items.len()).is_empty()),
        _ => false,
    }
}

/// Select one overload for `argv` from `candidates`.
///
/// Returns the candidate index and the pass that matched it, `None` when
/// nothing matches (the caller decides between `NoSuchMethod` and
/// `NoCompatibleConstructor`), or `AmbiguousOverload` when a single pass
/// matches more than once.
pub fn select_overload(
    repo: &ClassRepository,
    lookup: ProxyLookup,
    method: &str,
    candidates: &[MethodDescriptor],
    argv: &[Value],
) -> BindingResult<Option<(usize, MatchPass)>> {
    let arity: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, m)| m.args().len() == argv.len())
        .map(|(i, _)| i)
        .collect();

    for pass in [MatchPass::Strict, MatchPass::Loose] {
        let loose = pass == MatchPass::Loose;
        let matched: Vec<usize> = arity
            .iter()
            .copied()
            .filter(|&i| {
                candidates[i]
                    .args()
                    .iter()
                    .zip(argv)
                    .all(|(at, v)| compatible(repo, lookup, at, v, loose))
            })
            .collect();
        match matched.len() {
            0 => continue,
            1 => return Ok(Some((matched[0], pass))),
            _ => {
                return Err(BindingError::AmbiguousOverload {
                    method: method.to_string(),
                    candidates: matched
                        .into_iter()
                        .map(|i| candidates[i].signature())
                        .collect(),
                });
            }
        }
    }
    Ok(None)
}
