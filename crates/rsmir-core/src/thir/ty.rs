//! Typed-tree view of shared type information.

pub use crate::types::{
    AdtDef, AdtFlags, AdtKind, FieldDef, FieldIdx, FloatTy, IntTy, Mutability, Ty, TyKind, UintTy,
    VariantDef, VariantIdx,
};

pub type DefId = crate::types::DefId;
