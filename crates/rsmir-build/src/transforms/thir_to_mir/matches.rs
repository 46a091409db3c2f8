//! `match` and `if let`.
//!
//! Arms are tried top to bottom. Each arm checks its pattern's tests in
//! order, every failed test jumps to the next arm; the block after the
//! last arm is unreachable since matches are exhaustive.

use rsmir_core::error::{Error, Result};
use rsmir_core::mir::{
    BasicBlockId, BinOp, BorrowKind, Constant, Mutability, Operand, Place, Rvalue, SwitchTargets,
    TerminatorKind, Ty,
};
use rsmir_core::span::Span;
use rsmir_core::thir::{Arm, Expr, Pat};
use rsmir_core::{bail, trace};

use super::pattern::{self, PatBinding, Test};
use super::scope::ScopeKind;
use super::BodyBuilder;

impl<'a> BodyBuilder<'a> {
    pub(super) fn lower_match(
        &mut self,
        destination: &Place,
        scrutinee: &Expr,
        arms: &[Arm],
        span: Span,
    ) -> Result<()> {
        let scrutinee = self.as_place(scrutinee)?;
        if arms.is_empty() {
            // matching on an uninhabited value
            self.terminate(TerminatorKind::Unreachable, span)?;
            self.diverge();
            return Ok(());
        }

        let mut arm_ends = Vec::with_capacity(arms.len());
        for (index, arm) in arms.iter().enumerate() {
            trace!(arm = index, "lowering match arm");
            let plan = pattern::lower_pattern(&arm.pattern, scrutinee.clone())?;
            let next_arm = self.new_block();
            self.emit_tests(&plan.tests, next_arm, arm.span)?;

            self.push_scope(ScopeKind::Arm);
            let arm_scope = self.scopes.innermost();
            match &arm.guard {
                Some(guard) => {
                    // Moves out of the scrutinee wait until the guard holds;
                    // the next arm may still need the value.
                    let (moving, borrowed): (Vec<_>, Vec<_>) =
                        plan.bindings.into_iter().partition(PatBinding::moves_out);
                    self.bind_pattern(&borrowed, arm_scope)?;
                    self.borrow_for_guard(&moving);
                    let guarded = self.lower_guard(guard, arm_scope, next_arm);
                    self.guard_places.clear();
                    guarded?;
                    self.bind_pattern(&moving, arm_scope)?;
                }
                None => self.bind_pattern(&plan.bindings, arm_scope)?,
            }
            self.lower_expr_into(destination, &arm.body)?;
            self.pop_scope(ScopeKind::Arm)?;
            arm_ends.push(self.current_block);

            self.current_block = next_arm;
        }
        self.terminate(TerminatorKind::Unreachable, span)?;

        self.join(&arm_ends, span)
    }

    /// Inside a guard, moving bindings read the matched place through a
    /// shared borrow.
    fn borrow_for_guard(&mut self, bindings: &[PatBinding]) {
        for binding in bindings {
            let ty = Ty::reference(binding.ty.clone(), Mutability::Not);
            let borrow = Place::from_local(self.new_temp(ty, binding.span));
            self.push_assign(
                borrow.clone(),
                Rvalue::Ref(BorrowKind::Shared, binding.place.clone()),
                binding.span,
            );
            self.guard_places.insert(binding.var, borrow.deref());
        }
    }

    /// A failed guard leaves the arm's scope, then tries the next arm.
    fn lower_guard(&mut self, guard: &Expr, arm_scope: usize, next_arm: BasicBlockId) -> Result<()> {
        let cond = self.as_operand(guard)?;
        let body = self.new_block();
        let failed = self.new_block();
        self.terminate(
            TerminatorKind::SwitchInt {
                discr: cond,
                switch_ty: Ty::bool(),
                targets: SwitchTargets::static_if(0, failed, body),
            },
            guard.span,
        )?;
        self.current_block = failed;
        self.emit_exit_drops(arm_scope)?;
        self.goto(next_arm, guard.span)?;
        self.current_block = body;
        Ok(())
    }

    pub(super) fn lower_if_let(
        &mut self,
        destination: &Place,
        scrutinee: &Expr,
        pat: &Pat,
        then: &Expr,
        else_opt: Option<&Expr>,
        span: Span,
    ) -> Result<()> {
        let scrutinee = self.as_place(scrutinee)?;
        let plan = pattern::lower_pattern(pat, scrutinee)?;
        let else_block = self.new_block();
        self.emit_tests(&plan.tests, else_block, span)?;

        self.push_scope(ScopeKind::Arm);
        let scope = self.scopes.innermost();
        self.bind_pattern(&plan.bindings, scope)?;
        self.lower_expr_into(destination, then)?;
        self.pop_scope(ScopeKind::Arm)?;
        let then_end = self.current_block;

        self.current_block = else_block;
        match else_opt {
            Some(else_expr) => self.lower_expr_into(destination, else_expr)?,
            None => self.assign_unit(destination, span),
        }
        let else_end = self.current_block;

        self.join(&[then_end, else_end], span)
    }

    /// Emits `tests` in order; the first failing one jumps to `fail`.
    /// Leaves the builder in the block where all of them passed.
    fn emit_tests(&mut self, tests: &[Test], fail: BasicBlockId, span: Span) -> Result<()> {
        for test in tests {
            let success = self.new_block();
            let (discr, switch_ty, targets) = match test {
                Test::Variant {
                    place,
                    adt_def,
                    variant_index,
                } => {
                    let Some(variant) = adt_def.variant(*variant_index) else {
                        bail!("`{}` has no variant #{}", adt_def.name, variant_index)
                    };
                    let discr_ty = adt_def.discriminant_ty();
                    let Some(size) = discr_ty.scalar_size() else {
                        bail!("discriminant of `{}` is not a scalar", adt_def.name)
                    };
                    let discr = Place::from_local(self.new_temp(discr_ty.clone(), span));
                    self.push_assign(discr.clone(), Rvalue::Discriminant(place.clone()), span);
                    let value = size.truncate(variant.discr as u128);
                    (
                        Operand::Move(discr),
                        discr_ty,
                        SwitchTargets::static_if(value, success, fail),
                    )
                }
                Test::Eq { place, value, ty } if ty.is_integral() || ty.is_bool() || ty.is_char() => {
                    let Some(size) = ty.scalar_size() else {
                        bail!("constant pattern of non-scalar type `{}`", ty)
                    };
                    let bits = value
                        .to_bits(size)
                        .map_err(|err| Error::const_eval(err.into(), span))?;
                    (
                        Operand::Copy(place.clone()),
                        ty.clone(),
                        SwitchTargets::static_if(bits, success, fail),
                    )
                }
                Test::Eq { place, value, ty } => {
                    let eq = Place::from_local(self.new_temp(Ty::bool(), span));
                    let constant = Constant::scalar(*value, ty.clone(), span);
                    self.push_assign(
                        eq.clone(),
                        Rvalue::BinaryOp(
                            BinOp::Eq,
                            Operand::Copy(place.clone()),
                            Operand::constant(constant),
                        ),
                        span,
                    );
                    (
                        Operand::Move(eq),
                        Ty::bool(),
                        SwitchTargets::static_if(0, fail, success),
                    )
                }
            };
            self.terminate(
                TerminatorKind::SwitchInt {
                    discr,
                    switch_ty,
                    targets,
                },
                span,
            )?;
            self.current_block = success;
        }
        Ok(())
    }
}
