//! Type model shared by the typed tree and MIR.
//!
//! Types arrive fully resolved: no inference variables, no generics. The
//! builder only asks layout-free questions of them (copy, drop glue,
//! scalar width, projection result types).

use std::fmt;
use std::sync::Arc;

use derive_more::Display;
use itertools::Itertools;

use crate::ident::Symbol;

pub type DefId = u32;
pub type FieldIdx = usize;
pub type VariantIdx = usize;

/// Target pointer width in bytes. `isize`/`usize` and lengths use it.
pub const POINTER_SIZE: Size = Size::from_bytes(8);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ty {
    pub kind: TyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TyKind {
    /// The primitive boolean type. Written as `bool`.
    Bool,

    /// The primitive character type; holds a Unicode scalar value.
    Char,

    /// A primitive signed integer type. For example, `i32`.
    Int(IntTy),

    /// A primitive unsigned integer type. For example, `u32`.
    Uint(UintTy),

    /// A primitive floating-point type. For example, `f64`.
    Float(FloatTy),

    /// The string slice type. Only seen behind a reference.
    Str,

    /// Structures and enumerations.
    Adt(Arc<AdtDef>),

    /// An array with the given length. `[T; n]`.
    Array(Box<Ty>, u64),

    /// The pointee of an array slice. Written as `[T]`.
    Slice(Box<Ty>),

    /// A raw pointer. Written as `*const T` or `*mut T`.
    RawPtr(Box<Ty>, Mutability),

    /// A reference. Written as `&T` or `&mut T`.
    Ref(Box<Ty>, Mutability),

    /// The zero-sized type of a function item.
    FnDef(Symbol),

    /// The never type `!`.
    Never,

    /// A tuple type. For example, `(i32, bool)`. The empty tuple is unit.
    Tuple(Vec<Ty>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IntTy {
    #[display("isize")]
    Isize,
    #[display("i8")]
    I8,
    #[display("i16")]
    I16,
    #[display("i32")]
    I32,
    #[display("i64")]
    I64,
    #[display("i128")]
    I128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UintTy {
    #[display("usize")]
    Usize,
    #[display("u8")]
    U8,
    #[display("u16")]
    U16,
    #[display("u32")]
    U32,
    #[display("u64")]
    U64,
    #[display("u128")]
    U128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FloatTy {
    #[display("f32")]
    F32,
    #[display("f64")]
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mutability {
    #[default]
    Not,
    Mut,
}

impl Mutability {
    pub fn is_mut(self) -> bool {
        matches!(self, Mutability::Mut)
    }

    pub fn prefix_str(self) -> &'static str {
        match self {
            Mutability::Not => "",
            Mutability::Mut => "mut ",
        }
    }
}

impl IntTy {
    pub fn size(self) -> Size {
        match self {
            IntTy::Isize => POINTER_SIZE,
            IntTy::I8 => Size::from_bytes(1),
            IntTy::I16 => Size::from_bytes(2),
            IntTy::I32 => Size::from_bytes(4),
            IntTy::I64 => Size::from_bytes(8),
            IntTy::I128 => Size::from_bytes(16),
        }
    }
}

impl UintTy {
    pub fn size(self) -> Size {
        match self {
            UintTy::Usize => POINTER_SIZE,
            UintTy::U8 => Size::from_bytes(1),
            UintTy::U16 => Size::from_bytes(2),
            UintTy::U32 => Size::from_bytes(4),
            UintTy::U64 => Size::from_bytes(8),
            UintTy::U128 => Size::from_bytes(16),
        }
    }
}

impl FloatTy {
    pub fn size(self) -> Size {
        match self {
            FloatTy::F32 => Size::from_bytes(4),
            FloatTy::F64 => Size::from_bytes(8),
        }
    }
}

/// Width of a scalar value in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Size {
    pub bytes: u64,
}

impl Size {
    pub const ZERO: Size = Size { bytes: 0 };

    pub const fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    pub fn bits(self) -> u64 {
        self.bytes * 8
    }

    /// Keep the low `self.bits()` bits of `value`.
    pub fn truncate(self, value: u128) -> u128 {
        let bits = self.bits();
        if bits == 0 {
            return 0;
        }
        let shift = 128 - bits;
        (value << shift) >> shift
    }

    /// Interpret the low `self.bits()` bits of `value` as two's complement.
    pub fn sign_extend(self, value: u128) -> i128 {
        let bits = self.bits();
        if bits == 0 {
            return 0;
        }
        let shift = 128 - bits;
        ((value << shift) as i128) >> shift
    }

    pub fn signed_int_min(self) -> i128 {
        self.sign_extend(1_u128 << (self.bits() - 1))
    }

    pub fn signed_int_max(self) -> i128 {
        i128::MAX >> (128 - self.bits())
    }

    pub fn unsigned_int_max(self) -> u128 {
        u128::MAX >> (128 - self.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdtKind {
    Struct,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AdtFlags {
    /// The type implements `Copy`.
    pub is_copy: bool,
    /// The type has a user-written destructor.
    pub has_dtor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdtDef {
    pub did: DefId,
    pub name: Symbol,
    pub kind: AdtKind,
    pub variants: Vec<VariantDef>,
    pub flags: AdtFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantDef {
    pub name: Symbol,
    /// Discriminant value; always 0 for structs.
    pub discr: i128,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: Symbol,
    pub ty: Ty,
}

impl FieldDef {
    pub fn new(name: impl Into<Symbol>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl VariantDef {
    pub fn new(name: impl Into<Symbol>, discr: i128, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            discr,
            fields,
        }
    }

    /// Tuple-like variants name their fields `0`, `1`, ...
    pub fn is_tuple_like(&self) -> bool {
        self.fields
            .iter()
            .all(|field| field.name.starts_with(|c: char| c.is_ascii_digit()))
    }
}

impl AdtDef {
    pub fn new_struct(
        did: DefId,
        name: impl Into<Symbol>,
        fields: Vec<FieldDef>,
        flags: AdtFlags,
    ) -> Self {
        let name = name.into();
        Self {
            did,
            variants: vec![VariantDef::new(name.clone(), 0, fields)],
            name,
            kind: AdtKind::Struct,
            flags,
        }
    }

    pub fn new_enum(
        did: DefId,
        name: impl Into<Symbol>,
        variants: Vec<VariantDef>,
        flags: AdtFlags,
    ) -> Self {
        Self {
            did,
            name: name.into(),
            kind: AdtKind::Enum,
            variants,
            flags,
        }
    }

    pub fn is_enum(&self) -> bool {
        self.kind == AdtKind::Enum
    }

    pub fn variant(&self, idx: VariantIdx) -> Option<&VariantDef> {
        self.variants.get(idx)
    }

    /// Type of the value produced by reading this ADT's discriminant.
    pub fn discriminant_ty(&self) -> Ty {
        Ty::int(IntTy::Isize)
    }

    fn fields_need_drop(&self) -> bool {
        self.variants
            .iter()
            .flat_map(|variant| variant.fields.iter())
            .any(|field| field.ty.needs_drop())
    }
}

impl Ty {
    pub fn new(kind: TyKind) -> Self {
        Self { kind }
    }

    pub fn bool() -> Self {
        Self::new(TyKind::Bool)
    }

    pub fn char() -> Self {
        Self::new(TyKind::Char)
    }

    pub fn int(int: IntTy) -> Self {
        Self::new(TyKind::Int(int))
    }

    pub fn uint(uint: UintTy) -> Self {
        Self::new(TyKind::Uint(uint))
    }

    pub fn float(float: FloatTy) -> Self {
        Self::new(TyKind::Float(float))
    }

    pub fn i32() -> Self {
        Self::int(IntTy::I32)
    }

    pub fn i64() -> Self {
        Self::int(IntTy::I64)
    }

    pub fn u8() -> Self {
        Self::uint(UintTy::U8)
    }

    pub fn u32() -> Self {
        Self::uint(UintTy::U32)
    }

    pub fn usize() -> Self {
        Self::uint(UintTy::Usize)
    }

    pub fn str() -> Self {
        Self::new(TyKind::Str)
    }

    pub fn unit() -> Self {
        Self::new(TyKind::Tuple(Vec::new()))
    }

    pub fn never() -> Self {
        Self::new(TyKind::Never)
    }

    pub fn tuple(elems: Vec<Ty>) -> Self {
        Self::new(TyKind::Tuple(elems))
    }

    pub fn array(elem: Ty, len: u64) -> Self {
        Self::new(TyKind::Array(Box::new(elem), len))
    }

    pub fn slice(elem: Ty) -> Self {
        Self::new(TyKind::Slice(Box::new(elem)))
    }

    pub fn reference(pointee: Ty, mutability: Mutability) -> Self {
        Self::new(TyKind::Ref(Box::new(pointee), mutability))
    }

    pub fn raw_ptr(pointee: Ty, mutability: Mutability) -> Self {
        Self::new(TyKind::RawPtr(Box::new(pointee), mutability))
    }

    pub fn adt(def: Arc<AdtDef>) -> Self {
        Self::new(TyKind::Adt(def))
    }

    pub fn fn_def(name: impl Into<Symbol>) -> Self {
        Self::new(TyKind::FnDef(name.into()))
    }

    pub fn is_unit(&self) -> bool {
        matches!(&self.kind, TyKind::Tuple(elems) if elems.is_empty())
    }

    pub fn is_never(&self) -> bool {
        matches!(self.kind, TyKind::Never)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.kind, TyKind::Bool)
    }

    pub fn is_char(&self) -> bool {
        matches!(self.kind, TyKind::Char)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self.kind, TyKind::Int(_) | TyKind::Uint(_))
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.kind, TyKind::Int(_))
    }

    /// Width of values of this type when they are representable as a
    /// single scalar.
    pub fn scalar_size(&self) -> Option<Size> {
        match &self.kind {
            TyKind::Bool => Some(Size::from_bytes(1)),
            TyKind::Char => Some(Size::from_bytes(4)),
            TyKind::Int(int) => Some(int.size()),
            TyKind::Uint(uint) => Some(uint.size()),
            TyKind::Float(float) => Some(float.size()),
            _ => None,
        }
    }

    pub fn is_copy(&self) -> bool {
        match &self.kind {
            TyKind::Bool
            | TyKind::Char
            | TyKind::Int(_)
            | TyKind::Uint(_)
            | TyKind::Float(_)
            | TyKind::RawPtr(..)
            | TyKind::FnDef(_)
            | TyKind::Never => true,
            TyKind::Ref(_, mutability) => !mutability.is_mut(),
            TyKind::Str | TyKind::Slice(_) => false,
            TyKind::Array(elem, _) => elem.is_copy(),
            TyKind::Tuple(elems) => elems.iter().all(Ty::is_copy),
            TyKind::Adt(def) => def.flags.is_copy,
        }
    }

    /// Whether dropping a value of this type runs any code.
    pub fn needs_drop(&self) -> bool {
        match &self.kind {
            TyKind::Adt(def) => def.flags.has_dtor || def.fields_need_drop(),
            TyKind::Array(elem, len) => *len > 0 && elem.needs_drop(),
            TyKind::Slice(elem) => elem.needs_drop(),
            TyKind::Tuple(elems) => elems.iter().any(Ty::needs_drop),
            _ => false,
        }
    }

    pub fn builtin_deref(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Ref(pointee, _) | TyKind::RawPtr(pointee, _) => Some(pointee),
            _ => None,
        }
    }

    pub fn builtin_index(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Array(elem, _) | TyKind::Slice(elem) => Some(elem),
            _ => None,
        }
    }

    /// Type of field `field` of `variant` (or of the only variant / tuple).
    pub fn field_ty(&self, variant: Option<VariantIdx>, field: FieldIdx) -> Option<&Ty> {
        match &self.kind {
            TyKind::Tuple(elems) => elems.get(field),
            TyKind::Adt(def) => def
                .variants
                .get(variant.unwrap_or(0))
                .and_then(|variant| variant.fields.get(field))
                .map(|field| &field.ty),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TyKind::Bool => write!(f, "bool"),
            TyKind::Char => write!(f, "char"),
            TyKind::Int(int) => write!(f, "{}", int),
            TyKind::Uint(uint) => write!(f, "{}", uint),
            TyKind::Float(float) => write!(f, "{}", float),
            TyKind::Str => write!(f, "str"),
            TyKind::Adt(def) => write!(f, "{}", def.name),
            TyKind::Array(elem, len) => write!(f, "[{}; {}]", elem, len),
            TyKind::Slice(elem) => write!(f, "[{}]", elem),
            TyKind::RawPtr(pointee, Mutability::Not) => write!(f, "*const {}", pointee),
            TyKind::RawPtr(pointee, Mutability::Mut) => write!(f, "*mut {}", pointee),
            TyKind::Ref(pointee, mutability) => {
                write!(f, "&{}{}", mutability.prefix_str(), pointee)
            }
            TyKind::FnDef(name) => write!(f, "fn {}", name),
            TyKind::Never => write!(f, "!"),
            TyKind::Tuple(elems) if elems.len() == 1 => write!(f, "({},)", elems[0]),
            TyKind::Tuple(elems) => write!(f, "({})", elems.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn droppable() -> Ty {
        Ty::adt(Arc::new(AdtDef::new_struct(
            0,
            "String",
            Vec::new(),
            AdtFlags {
                is_copy: false,
                has_dtor: true,
            },
        )))
    }

    #[test]
    fn size_truncates_and_sign_extends() {
        let byte = Size::from_bytes(1);
        assert_eq!(byte.truncate(0x1ff), 0xff);
        assert_eq!(byte.sign_extend(0xff), -1);
        assert_eq!(byte.sign_extend(0x7f), 127);
        assert_eq!(byte.signed_int_min(), -128);
        assert_eq!(byte.signed_int_max(), 127);
        assert_eq!(byte.unsigned_int_max(), 255);
        assert_eq!(Size::from_bytes(16).signed_int_min(), i128::MIN);
        assert_eq!(Size::from_bytes(16).unsigned_int_max(), u128::MAX);
    }

    #[test]
    fn drop_glue_follows_fields() {
        assert!(droppable().needs_drop());
        assert!(Ty::tuple(vec![Ty::i32(), droppable()]).needs_drop());
        assert!(!Ty::array(droppable(), 0).needs_drop());
        assert!(!Ty::reference(droppable(), Mutability::Not).needs_drop());
        assert!(!Ty::i32().needs_drop());
    }

    #[test]
    fn copy_semantics() {
        assert!(Ty::tuple(vec![Ty::i32(), Ty::bool()]).is_copy());
        assert!(Ty::reference(droppable(), Mutability::Not).is_copy());
        assert!(!Ty::reference(Ty::i32(), Mutability::Mut).is_copy());
        assert!(!droppable().is_copy());
    }

    #[test]
    fn display_matches_source_syntax() {
        assert_eq!(Ty::unit().to_string(), "()");
        assert_eq!(Ty::tuple(vec![Ty::i32()]).to_string(), "(i32,)");
        assert_eq!(
            Ty::tuple(vec![Ty::i32(), Ty::bool()]).to_string(),
            "(i32, bool)"
        );
        assert_eq!(Ty::array(Ty::u8(), 4).to_string(), "[u8; 4]");
        assert_eq!(
            Ty::reference(Ty::slice(Ty::usize()), Mutability::Mut).to_string(),
            "&mut [usize]"
        );
    }
}
