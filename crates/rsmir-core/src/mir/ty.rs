//! MIR-level view of shared type information.

pub use crate::types::{
    AdtDef, AdtFlags, AdtKind, FieldDef, FieldIdx, FloatTy, IntTy, Mutability, Size, Ty, TyKind,
    UintTy, VariantDef, VariantIdx, POINTER_SIZE,
};

pub type DefId = crate::types::DefId;
