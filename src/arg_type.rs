//! ArgType - per-slot type descriptor for arguments and return values.
//!
//! Every parameter and return slot of a bound method is described by an
//! [`ArgType`]: a basic kind, exactly one pass mode (value, pointer, const
//! pointer, reference, const reference), an ownership-transfer flag for
//! object kinds, inner descriptors for containers and the owning class for
//! object kinds.
//!
//! # Example
//!
//! ```
//! use crossbind::{ArgType, BasicType, ClassId};
//!
//! // int
//! let i = ArgType::scalar(BasicType::Int);
//!
//! // const Point &
//! let p = ArgType::object(ClassId::from_name("Point")).cref();
//! assert!(p.mode().is_cref());
//!
//! // Vec<double>
//! let v = ArgType::vector(ArgType::scalar(BasicType::Double));
//! assert_eq!(v.inner().unwrap().basic(), BasicType::Double);
//! ```

use std::fmt::{self, Display, Formatter};

use crate::ident::ClassId;

/// Basic kind of a call slot.
///
/// Discriminants are contiguous so writer/reader dispatch tables can index
/// directly by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BasicType {
    Void = 0,
    Bool = 1,
    Char = 2,
    UChar = 3,
    Short = 4,
    UShort = 5,
    Int = 6,
    UInt = 7,
    Long = 8,
    ULong = 9,
    Float = 10,
    Double = 11,
    String = 12,
    ByteArray = 13,
    Variant = 14,
    Vector = 15,
    Map = 16,
    Object = 17,
}

impl BasicType {
    /// Number of basic kinds; dispatch tables are sized by this.
    pub const COUNT: usize = 18;

    /// True for the signed and unsigned integer family.
    pub fn is_int(self) -> bool {
        matches!(
            self,
            BasicType::Char
                | BasicType::UChar
                | BasicType::Short
                | BasicType::UShort
                | BasicType::Int
                | BasicType::UInt
                | BasicType::Long
                | BasicType::ULong
        )
    }

    /// True for the floating-point family.
    pub fn is_float(self) -> bool {
        matches!(self, BasicType::Float | BasicType::Double)
    }

    /// True for any numeric kind (integer or float).
    pub fn is_numeric(self) -> bool {
        self.is_int() || self.is_float()
    }

    /// True for kinds passed through scalar slots.
    pub fn is_scalar(self) -> bool {
        self == BasicType::Bool || self.is_numeric()
    }

    /// Representable range for integer kinds.
    ///
    /// Host integers are `i64`; `ULong` saturates at `i64::MAX` since the
    /// host side cannot express larger values.
    pub fn int_range(self) -> Option<(i64, i64)> {
        match self {
            BasicType::Char => Some((i8::MIN as i64, i8::MAX as i64)),
            BasicType::UChar => Some((0, u8::MAX as i64)),
            BasicType::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            BasicType::UShort => Some((0, u16::MAX as i64)),
            BasicType::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            BasicType::UInt => Some((0, u32::MAX as i64)),
            BasicType::Long => Some((i64::MIN, i64::MAX)),
            BasicType::ULong => Some((0, i64::MAX)),
            _ => None,
        }
    }

    /// Lowercase display name.
    pub fn name(self) -> &'static str {
        match self {
            BasicType::Void => "void",
            BasicType::Bool => "bool",
            BasicType::Char => "char",
            BasicType::UChar => "uchar",
            BasicType::Short => "short",
            BasicType::UShort => "ushort",
            BasicType::Int => "int",
            BasicType::UInt => "uint",
            BasicType::Long => "long",
            BasicType::ULong => "ulong",
            BasicType::Float => "float",
            BasicType::Double => "double",
            BasicType::String => "string",
            BasicType::ByteArray => "bytes",
            BasicType::Variant => "variant",
            BasicType::Vector => "vector",
            BasicType::Map => "map",
            BasicType::Object => "object",
        }
    }
}

/// How a slot is passed across the boundary.
///
/// Exactly one mode applies to each slot; the spec's `is_ptr`/`is_cptr`/
/// `is_ref`/`is_cref` qualifiers are accessors over this enum so the
/// one-of invariant holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassMode {
    /// Passed by value; the receiver gets its own copy.
    #[default]
    Value,
    /// Mutable pointer; nil is legal and passes null.
    Ptr,
    /// Const pointer; nil is legal and passes null.
    CPtr,
    /// Mutable reference; nil is illegal.
    Ref,
    /// Const reference; nil is illegal.
    CRef,
}

impl PassMode {
    pub fn is_ptr(self) -> bool {
        self == PassMode::Ptr
    }

    pub fn is_cptr(self) -> bool {
        self == PassMode::CPtr
    }

    pub fn is_ref(self) -> bool {
        self == PassMode::Ref
    }

    pub fn is_cref(self) -> bool {
        self == PassMode::CRef
    }

    /// True for both pointer modes, where nil passes null.
    pub fn is_nullable(self) -> bool {
        matches!(self, PassMode::Ptr | PassMode::CPtr)
    }

    /// True for modes that alias the caller's storage rather than copying.
    pub fn is_indirect(self) -> bool {
        self != PassMode::Value
    }

    /// True for modes that permit mutation through the slot.
    pub fn is_mutable(self) -> bool {
        matches!(self, PassMode::Ptr | PassMode::Ref)
    }

    /// True for the const-qualified indirect modes.
    pub fn is_const(self) -> bool {
        matches!(self, PassMode::CPtr | PassMode::CRef)
    }
}

impl Display for PassMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PassMode::Value => Ok(()),
            PassMode::Ptr => write!(f, " *"),
            PassMode::CPtr => write!(f, " const *"),
            PassMode::Ref => write!(f, " &"),
            PassMode::CRef => write!(f, " const &"),
        }
    }
}

/// Complete description of one argument or return slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgType {
    basic: BasicType,
    mode: PassMode,
    /// Ownership of the passed object transfers to the receiver. Only
    /// meaningful for `Object`; ignored for every other kind.
    pass_obj: bool,
    /// The receiver should clone rather than alias the object.
    prefer_copy: bool,
    /// Element type for `Vector`, value type for `Map`.
    inner: Option<Box<ArgType>>,
    /// Key type for `Map`.
    inner_key: Option<Box<ArgType>>,
    /// Owning class for `Object`.
    class: Option<ClassId>,
}

impl ArgType {
    /// The void slot (no value).
    pub fn void() -> Self {
        Self::of(BasicType::Void)
    }

    /// A scalar, string, bytes or variant slot passed by value.
    pub fn scalar(basic: BasicType) -> Self {
        debug_assert!(!matches!(
            basic,
            BasicType::Vector | BasicType::Map | BasicType::Object
        ));
        Self::of(basic)
    }

    /// An object slot of the given class, passed by value.
    pub fn object(class: ClassId) -> Self {
        let mut t = Self::of(BasicType::Object);
        t.class = Some(class);
        t
    }

    /// A vector slot with the given element type.
    pub fn vector(inner: ArgType) -> Self {
        let mut t = Self::of(BasicType::Vector);
        t.inner = Some(Box::new(inner));
        t
    }

    /// A map slot with the given key and value types.
    pub fn map(key: ArgType, value: ArgType) -> Self {
        let mut t = Self::of(BasicType::Map);
        t.inner_key = Some(Box::new(key));
        t.inner = Some(Box::new(value));
        t
    }

    fn of(basic: BasicType) -> Self {
        ArgType {
            basic,
            mode: PassMode::Value,
            pass_obj: false,
            prefer_copy: false,
            inner: None,
            inner_key: None,
            class: None,
        }
    }

    // === Builder modifiers ===

    /// Pass as a mutable pointer.
    pub fn ptr(mut self) -> Self {
        self.mode = PassMode::Ptr;
        self
    }

    /// Pass as a const pointer.
    pub fn cptr(mut self) -> Self {
        self.mode = PassMode::CPtr;
        self
    }

    /// Pass as a mutable reference.
    pub fn refer(mut self) -> Self {
        self.mode = PassMode::Ref;
        self
    }

    /// Pass as a const reference.
    pub fn cref(mut self) -> Self {
        self.mode = PassMode::CRef;
        self
    }

    /// Ownership transfers to the receiver.
    pub fn pass_obj(mut self) -> Self {
        self.pass_obj = true;
        self
    }

    /// The receiver should clone rather than alias.
    pub fn prefer_copy(mut self) -> Self {
        self.prefer_copy = true;
        self
    }

    // === Accessors ===

    pub fn basic(&self) -> BasicType {
        self.basic
    }

    pub fn mode(&self) -> PassMode {
        self.mode
    }

    pub fn transfers_ownership(&self) -> bool {
        self.basic == BasicType::Object && self.pass_obj
    }

    pub fn prefers_copy(&self) -> bool {
        self.prefer_copy
    }

    pub fn inner(&self) -> Option<&ArgType> {
        self.inner.as_deref()
    }

    pub fn inner_key(&self) -> Option<&ArgType> {
        self.inner_key.as_deref()
    }

    pub fn class(&self) -> Option<ClassId> {
        self.class
    }

    pub fn is_void(&self) -> bool {
        self.basic == BasicType::Void
    }
}

impl Display for ArgType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.basic {
            BasicType::Vector => {
                write!(f, "vector<")?;
                if let Some(inner) = self.inner() {
                    write!(f, "{inner}")?;
                }
                write!(f, ">")?;
            }
            BasicType::Map => {
                write!(f, "map<")?;
                if let Some(k) = self.inner_key() {
                    write!(f, "{k}")?;
                }
                write!(f, ",")?;
                if let Some(v) = self.inner() {
                    write!(f, "{v}")?;
                }
                write!(f, ">")?;
            }
            BasicType::Object => match self.class {
                Some(class) => write!(f, "object[{class:?}]")?,
                None => write!(f, "object")?,
            },
            other => write!(f, "{}", other.name())?,
        }
        write!(f, "{}", self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_mode_applies() {
        let t = ArgType::scalar(BasicType::Int).refer();
        assert!(t.mode().is_ref());
        assert!(!t.mode().is_ptr());
        assert!(!t.mode().is_cref());
        assert!(t.mode().is_indirect());
    }

    #[test]
    fn pass_obj_ignored_for_non_objects() {
        let t = ArgType::scalar(BasicType::Int).pass_obj();
        assert!(!t.transfers_ownership());
        let o = ArgType::object(ClassId::from_name("Point")).pass_obj();
        assert!(o.transfers_ownership());
    }

    #[test]
    fn int_ranges() {
        assert_eq!(BasicType::UChar.int_range(), Some((0, 255)));
        assert_eq!(BasicType::String.int_range(), None);
    }

    #[test]
    fn display_reads_naturally() {
        let t = ArgType::vector(ArgType::scalar(BasicType::Int)).cref();
        assert_eq!(t.to_string(), "vector<int> const &");
    }

    #[test]
    fn every_kind_displays_by_name() {
        let named = [
            (BasicType::Void, "void"),
            (BasicType::Bool, "bool"),
            (BasicType::Char, "char"),
            (BasicType::UChar, "uchar"),
            (BasicType::Short, "short"),
            (BasicType::UShort, "ushort"),
            (BasicType::Int, "int"),
            (BasicType::UInt, "uint"),
            (BasicType::Long, "long"),
            (BasicType::ULong, "ulong"),
            (BasicType::Float, "float"),
            (BasicType::Double, "double"),
            (BasicType::String, "string"),
            (BasicType::ByteArray, "bytes"),
            (BasicType::Variant, "variant"),
            (BasicType::Vector, "vector"),
            (BasicType::Map, "map"),
            (BasicType::Object, "object"),
        ];
        assert_eq!(named.len(), BasicType::COUNT);
        for (kind, name) in named {
            assert_eq!(kind.name(), name);
        }
        assert_eq!(ArgType::scalar(BasicType::Double).ptr().to_string(), "double *");
    }
}
