//! Pattern lowering.
//!
//! A pattern checked against a place turns into the tests that decide
//! whether it matches and the bindings it introduces. Both come out in
//! left-to-right source order; nothing is emitted here, the match and
//! `let` lowering decide how tests and bindings become blocks.

use std::sync::Arc;

use rsmir_core::error::{Error, Result};
use rsmir_core::mir::{AdtDef, Mutability, Place, Scalar, Symbol, Ty, VariantIdx};
use rsmir_core::span::Span;
use rsmir_core::thir::{BindingMode, LocalVarId, Pat, PatKind};
use rsmir_core::bail;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Test {
    /// The enum at `place` holds `variant_index`.
    Variant {
        place: Place,
        adt_def: Arc<AdtDef>,
        variant_index: VariantIdx,
    },
    /// The scalar at `place` equals `value`.
    Eq { place: Place, value: Scalar, ty: Ty },
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct PatBinding {
    pub var: LocalVarId,
    pub name: Symbol,
    /// Place of the matched value; by-reference bindings borrow it.
    pub place: Place,
    pub mode: BindingMode,
    pub mutability: Mutability,
    /// Type of the bound variable.
    pub ty: Ty,
    pub span: Span,
}

impl PatBinding {
    /// Binding takes ownership of part of the matched value.
    pub fn moves_out(&self) -> bool {
        self.mode == BindingMode::ByValue && !self.ty.is_copy()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct PatternPlan {
    pub tests: Vec<Test>,
    pub bindings: Vec<PatBinding>,
}

impl PatternPlan {
    pub fn is_irrefutable(&self) -> bool {
        self.tests.is_empty()
    }
}

pub(super) fn lower_pattern(pattern: &Pat, place: Place) -> Result<PatternPlan> {
    let mut plan = PatternPlan::default();
    collect(pattern, place, &mut plan)?;
    Ok(plan)
}

fn collect(pattern: &Pat, place: Place, plan: &mut PatternPlan) -> Result<()> {
    match &pattern.kind {
        PatKind::Wild | PatKind::Rest => {}
        PatKind::Binding {
            mutability,
            name,
            mode,
            var,
            ty,
            subpattern,
        } => {
            plan.bindings.push(PatBinding {
                var: *var,
                name: name.clone(),
                place: place.clone(),
                mode: *mode,
                mutability: *mutability,
                ty: ty.clone(),
                span: pattern.span,
            });
            if let Some(subpattern) = subpattern {
                collect(subpattern, place, plan)?;
            }
        }
        PatKind::Leaf { subpatterns } => {
            for field_pat in subpatterns {
                let field_place = place
                    .clone()
                    .field(field_pat.field, field_pat.pattern.ty.clone());
                collect(&field_pat.pattern, field_place, plan)?;
            }
        }
        PatKind::Variant {
            adt_def,
            variant_index,
            subpatterns,
        } => {
            let Some(variant) = adt_def.variant(*variant_index) else {
                bail!("`{}` has no variant #{}", adt_def.name, variant_index)
            };
            if adt_def.variants.len() > 1 {
                plan.tests.push(Test::Variant {
                    place: place.clone(),
                    adt_def: adt_def.clone(),
                    variant_index: *variant_index,
                });
            }
            let variant_place = if adt_def.is_enum() {
                place.downcast(variant.name.clone(), *variant_index)
            } else {
                place
            };
            for field_pat in subpatterns {
                let field_place = variant_place
                    .clone()
                    .field(field_pat.field, field_pat.pattern.ty.clone());
                collect(&field_pat.pattern, field_place, plan)?;
            }
        }
        PatKind::Deref { subpattern } => collect(subpattern, place.deref(), plan)?,
        PatKind::Constant { value } => plan.tests.push(Test::Eq {
            place,
            value: *value,
            ty: pattern.ty.clone(),
        }),
        PatKind::Or { .. } => return Err(Error::unsupported("or-pattern", pattern.span)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rsmir_core::mir::{BorrowKind, PlaceElem};
    use rsmir_core::thir::ThirBuilder;
    use rsmir_core::types::{AdtFlags, FieldDef, VariantDef};

    fn option_i32() -> Arc<AdtDef> {
        Arc::new(AdtDef::new_enum(
            0,
            "Option",
            vec![
                VariantDef::new("None", 0, Vec::new()),
                VariantDef::new("Some", 1, vec![FieldDef::new("0", Ty::i32())]),
            ],
            AdtFlags {
                is_copy: true,
                has_dtor: false,
            },
        ))
    }

    #[test]
    fn tuple_patterns_project_fields_left_to_right() {
        let mut thir = ThirBuilder::new();
        let (a, a_var) = thir.binding("a", Ty::i32());
        let one = thir.i32_pat(1);
        let rest = thir.wild(Ty::bool());
        let pattern = thir.tuple_pat(vec![a, one, rest]);

        let plan = lower_pattern(&pattern, Place::from_local(1)).unwrap();

        assert_eq!(plan.bindings.len(), 1);
        assert_eq!(plan.bindings[0].var, a_var);
        assert_eq!(
            plan.bindings[0].place,
            Place::from_local(1).field(0, Ty::i32())
        );
        assert_eq!(
            plan.tests,
            vec![Test::Eq {
                place: Place::from_local(1).field(1, Ty::i32()),
                value: Scalar::from_int(1, rsmir_core::types::Size::from_bytes(4)),
                ty: Ty::i32(),
            }]
        );
        assert!(!plan.is_irrefutable());
    }

    #[test]
    fn variant_patterns_test_then_downcast() {
        let mut thir = ThirBuilder::new();
        let (x, _) = thir.binding("x", Ty::i32());
        let pattern = thir.variant_pat(option_i32(), 1, vec![x]);

        let plan = lower_pattern(&pattern, Place::from_local(2)).unwrap();

        assert!(matches!(
            plan.tests.as_slice(),
            [Test::Variant { variant_index: 1, .. }]
        ));
        assert_eq!(
            plan.bindings[0].place.projection,
            vec![
                PlaceElem::Downcast(Symbol::from("Some"), 1),
                PlaceElem::Field(0, Ty::i32()),
            ]
        );
    }

    #[test]
    fn single_variant_structs_need_no_test() {
        let point = Arc::new(AdtDef::new_struct(
            1,
            "Point",
            vec![FieldDef::new("x", Ty::i32()), FieldDef::new("y", Ty::i32())],
            AdtFlags::default(),
        ));
        let mut thir = ThirBuilder::new();
        let (y, _) = thir.ref_binding("y", BorrowKind::Shared, Ty::i32());
        let x = thir.wild(Ty::i32());
        let pattern = thir.variant_pat(point, 0, vec![x, y]);

        let plan = lower_pattern(&pattern, Place::from_local(1)).unwrap();

        assert!(plan.is_irrefutable());
        assert_eq!(plan.bindings[0].mode, BindingMode::ByRef(BorrowKind::Shared));
        assert_eq!(
            plan.bindings[0].place,
            Place::from_local(1).field(1, Ty::i32())
        );
    }

    #[test]
    fn reference_patterns_dereference() {
        let mut thir = ThirBuilder::new();
        let (inner, _) = thir.binding("v", Ty::i32());
        let pattern = thir.deref_pat(inner, Ty::reference(Ty::i32(), Mutability::Not));

        let plan = lower_pattern(&pattern, Place::from_local(1)).unwrap();

        assert_eq!(plan.bindings[0].place, Place::from_local(1).deref());
    }

    #[test]
    fn or_patterns_are_unsupported() {
        let mut thir = ThirBuilder::new();
        let one = thir.i32_pat(1);
        let two = thir.i32_pat(2);
        let pattern = thir.or_pat(vec![one, two], Ty::i32());

        let err = lower_pattern(&pattern, Place::from_local(1)).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }
}
