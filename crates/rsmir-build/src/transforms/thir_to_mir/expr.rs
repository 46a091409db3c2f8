//! Expression lowering.
//!
//! Expressions are lowered in one of four categories: as a constant
//! (literals, item paths, folded arithmetic), as a place, as an rvalue
//! (computations over operands), or directly into a destination place
//! (everything with control flow). Each category falls back to the next
//! more general one through a temporary, so every expression kind has
//! exactly one real lowering.

use itertools::Itertools;
use rsmir_core::error::{Error, Result};
use rsmir_core::mir::{
    AggregateKind, AssertMessage, BinOp, CastKind, Constant, ConstantKind, LocalId, Operand,
    Place, Rvalue, Scalar, StatementKind, TerminatorKind, Ty, TyKind, UnOp,
};
use rsmir_core::span::Span;
use rsmir_core::thir::{self, Expr, ExprKind, ItemRefKind, Lit};
use rsmir_core::types::{IntTy, UintTy};
use rsmir_core::{bail, bug};

use super::const_eval;
use super::scope::DropKind;
use super::BodyBuilder;

impl<'a> BodyBuilder<'a> {
    /// Evaluates `expr` and writes its value into `destination`.
    pub(super) fn lower_expr_into(&mut self, destination: &Place, expr: &Expr) -> Result<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Block(block) => self.lower_block_into(destination, block),
            ExprKind::If {
                cond,
                then,
                else_opt,
            } => self.lower_if(destination, cond, then, else_opt.as_deref(), span),
            ExprKind::Match { scrutinee, arms } => {
                self.lower_match(destination, scrutinee, arms, span)
            }
            ExprKind::Loop { body, label } => self.lower_loop(destination, body, label.as_ref(), span),
            ExprKind::While { .. } => Err(Error::unsupported("`while` loop", span)),
            ExprKind::LogicalOp { op, lhs, rhs } => {
                self.lower_logical_op(destination, *op, lhs, rhs, span)
            }
            ExprKind::Call {
                fun,
                args,
                from_hir_call,
            } => self.lower_call(destination, expr, fun, args, *from_hir_call),
            ExprKind::Break { label, value } => {
                self.lower_break(label.as_ref(), value.as_deref(), span)
            }
            ExprKind::Continue { label } => self.lower_continue(label.as_ref(), span),
            ExprKind::Return { value } => self.lower_return(value.as_deref(), span),
            ExprKind::Assign { lhs, rhs } => {
                self.lower_assign(lhs, rhs, span)?;
                self.assign_unit(destination, span);
                Ok(())
            }
            ExprKind::AssignOp { op, lhs, rhs } => {
                self.lower_assign_op(*op, lhs, rhs, span)?;
                self.assign_unit(destination, span);
                Ok(())
            }
            ExprKind::Let { .. } => bail!("`let` expression outside of an `if` condition"),
            ExprKind::Literal(_)
            | ExprKind::VarRef { .. }
            | ExprKind::Path(_)
            | ExprKind::Binary(..)
            | ExprKind::Unary(..)
            | ExprKind::Cast(_)
            | ExprKind::Deref { .. }
            | ExprKind::Index { .. }
            | ExprKind::Field { .. }
            | ExprKind::Borrow { .. }
            | ExprKind::Tuple { .. }
            | ExprKind::Array { .. }
            | ExprKind::Repeat { .. }
            | ExprKind::Adt(_) => {
                let rvalue = self.as_rvalue(expr)?;
                self.push_assign_moving(destination.clone(), rvalue, span);
                Ok(())
            }
        }
    }

    /// Value of `expr` as an operand. Places are read in place, anything
    /// else goes through a temporary.
    pub(super) fn as_operand(&mut self, expr: &Expr) -> Result<Operand> {
        if let Some(constant) = self.try_as_constant(expr)? {
            return Ok(Operand::constant(constant));
        }
        if expr.is_place_expr() {
            let place = self.lower_place(expr)?;
            return Ok(Self::consume(place, &expr.ty));
        }
        let temp = self.as_temp(expr, true)?;
        Ok(Operand::Move(Place::from_local(temp)))
    }

    /// Reads `place`: `Copy` for `Copy` types, `Move` otherwise.
    pub(super) fn consume(place: Place, ty: &Ty) -> Operand {
        if ty.is_copy() {
            Operand::Copy(place)
        } else {
            Operand::Move(place)
        }
    }

    /// Fresh temporary holding the value of `expr`, dropped with the
    /// current temporary scope.
    pub(super) fn as_temp(&mut self, expr: &Expr, drop_value: bool) -> Result<LocalId> {
        let scope = self.scopes.temp_scope();
        self.as_temp_in(expr, scope, drop_value)
    }

    /// Same as [`BodyBuilder::as_temp`], but owned by `scope`. With
    /// `drop_value` unset only the storage is scheduled.
    pub(super) fn as_temp_in(&mut self, expr: &Expr, scope: usize, drop_value: bool) -> Result<LocalId> {
        let span = expr.span;
        let temp = self.new_temp(expr.ty.clone(), span);
        self.push_statement(StatementKind::StorageLive(temp), span);
        self.schedule_drop(scope, temp, DropKind::Storage, span);
        self.lower_expr_into(&Place::from_local(temp), expr)?;
        if drop_value {
            self.schedule_value_drop(scope, temp, span);
        }
        Ok(temp)
    }

    /// Literals, item paths, unit, negated literals and, inside const and
    /// static initializers, arithmetic over constants. Emits nothing.
    pub(super) fn try_as_constant(&self, expr: &Expr) -> Result<Option<Constant>> {
        let span = expr.span;
        let literal = match &expr.kind {
            ExprKind::Literal(Lit::Str(value)) => ConstantKind::Str(value.clone()),
            ExprKind::Literal(lit) => match const_eval::literal_scalar(lit, &expr.ty) {
                Some(scalar) => ConstantKind::Scalar(scalar),
                None => bail!("literal {:?} does not fit type `{}`", lit, expr.ty),
            },
            ExprKind::Path(item) => match item.kind {
                ItemRefKind::Fn => ConstantKind::Fn(item.name.clone()),
                ItemRefKind::Const | ItemRefKind::Static => ConstantKind::Named(item.name.clone()),
            },
            ExprKind::Tuple { fields } if fields.is_empty() => ConstantKind::ZeroSized,
            ExprKind::Unary(UnOp::Neg, arg) if matches!(arg.kind, ExprKind::Literal(_)) => {
                let magnitude = match &arg.kind {
                    ExprKind::Literal(lit) => const_eval::negated_literal_magnitude(lit, &arg.ty),
                    _ => None,
                };
                let Some(value) = magnitude else {
                    bail!("negated literal does not fit type `{}`", arg.ty)
                };
                let negated = const_eval::negate_literal(value, &expr.ty)
                    .map_err(|err| Error::const_eval(err, span))?;
                ConstantKind::Scalar(negated)
            }
            ExprKind::Binary(op, lhs, rhs) if self.const_context => {
                let (Some(l), Some(r)) = (self.try_as_scalar(lhs)?, self.try_as_scalar(rhs)?) else {
                    return Ok(None);
                };
                let value = const_eval::eval_binary(*op, l, r, &lhs.ty, &rhs.ty)
                    .map_err(|err| Error::const_eval(err, span))?;
                ConstantKind::Scalar(value)
            }
            ExprKind::Unary(op, arg) if self.const_context => {
                let Some(value) = self.try_as_scalar(arg)? else {
                    return Ok(None);
                };
                let value = const_eval::eval_unary(*op, value, &arg.ty)
                    .map_err(|err| Error::const_eval(err, span))?;
                ConstantKind::Scalar(value)
            }
            ExprKind::Cast(arg) if self.const_context => {
                let Some(value) = self.try_as_scalar(arg)? else {
                    return Ok(None);
                };
                let value = const_eval::eval_cast(value, &arg.ty, &expr.ty)
                    .map_err(|err| Error::const_eval(err, span))?;
                ConstantKind::Scalar(value)
            }
            _ => return Ok(None),
        };
        Ok(Some(Constant::new(literal, expr.ty.clone(), span)))
    }

    fn try_as_scalar(&self, expr: &Expr) -> Result<Option<Scalar>> {
        Ok(self
            .try_as_constant(expr)?
            .and_then(|constant| constant.as_scalar()))
    }

    pub(super) fn as_rvalue(&mut self, expr: &Expr) -> Result<Rvalue> {
        if let Some(constant) = self.try_as_constant(expr)? {
            return Ok(Rvalue::Use(Operand::constant(constant)));
        }
        let span = expr.span;
        match &expr.kind {
            ExprKind::Binary(op, lhs, rhs) => {
                let lhs_op = self.as_operand(lhs)?;
                let rhs_op = self.as_operand(rhs)?;
                self.build_binary_op(*op, lhs_op, rhs_op, &lhs.ty, &rhs.ty, &expr.ty, span)
            }
            ExprKind::Unary(op, arg) => {
                let arg_op = self.as_operand(arg)?;
                self.build_unary_op(*op, arg_op, &arg.ty, span)
            }
            ExprKind::Cast(arg) => {
                let Some(kind) = cast_kind(&arg.ty, &expr.ty) else {
                    return Err(Error::unsupported(
                        format!("cast from `{}` to `{}`", arg.ty, expr.ty),
                        span,
                    ));
                };
                let arg_op = self.as_operand(arg)?;
                Ok(Rvalue::Cast(kind, arg_op, expr.ty.clone()))
            }
            ExprKind::Borrow { borrow_kind, arg } => {
                let place = self.as_place(arg)?;
                Ok(Rvalue::Ref(*borrow_kind, place))
            }
            ExprKind::Tuple { fields } => {
                let operands = self.as_operands(fields)?;
                Ok(Rvalue::Aggregate(Box::new(AggregateKind::Tuple), operands))
            }
            ExprKind::Array { fields } => {
                let Some(elem_ty) = expr.ty.builtin_index().cloned() else {
                    bail!("array literal of non-array type `{}`", expr.ty)
                };
                let operands = self.as_operands(fields)?;
                Ok(Rvalue::Aggregate(Box::new(AggregateKind::Array(elem_ty)), operands))
            }
            ExprKind::Repeat { value, count } => {
                let value_op = self.as_operand(value)?;
                Ok(Rvalue::Repeat(value_op, *count))
            }
            ExprKind::Adt(adt) => self.lower_adt(adt),
            ExprKind::VarRef { .. }
            | ExprKind::Field { .. }
            | ExprKind::Index { .. }
            | ExprKind::Deref { .. } => {
                let place = self.lower_place(expr)?;
                Ok(Rvalue::Use(Self::consume(place, &expr.ty)))
            }
            ExprKind::Literal(_) | ExprKind::Path(_) => {
                bug!("constant expression was not lowered as a constant")
            }
            ExprKind::Block(_)
            | ExprKind::If { .. }
            | ExprKind::Let { .. }
            | ExprKind::Match { .. }
            | ExprKind::Loop { .. }
            | ExprKind::While { .. }
            | ExprKind::LogicalOp { .. }
            | ExprKind::Call { .. }
            | ExprKind::Break { .. }
            | ExprKind::Continue { .. }
            | ExprKind::Return { .. }
            | ExprKind::Assign { .. }
            | ExprKind::AssignOp { .. } => {
                let temp = self.as_temp(expr, true)?;
                Ok(Rvalue::Use(Operand::Move(Place::from_local(temp))))
            }
        }
    }

    fn as_operands(&mut self, exprs: &[Expr]) -> Result<Vec<Operand>> {
        exprs.iter().map(|expr| self.as_operand(expr)).try_collect()
    }

    /// Fields are evaluated in source order and stored in declaration
    /// order.
    fn lower_adt(&mut self, adt: &thir::AdtExpr) -> Result<Rvalue> {
        let Some(variant) = adt.adt_def.variant(adt.variant_index) else {
            bail!("`{}` has no variant #{}", adt.adt_def.name, adt.variant_index)
        };
        let mut slots: Vec<Option<Operand>> = vec![None; variant.fields.len()];
        for field_expr in &adt.fields {
            let operand = self.as_operand(&field_expr.expr)?;
            match slots.get_mut(field_expr.field) {
                Some(slot) => *slot = Some(operand),
                None => bail!("`{}` has no field #{}", variant.name, field_expr.field),
            }
        }
        let mut operands = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(operand) => operands.push(operand),
                None => bail!("missing field #{} in `{}` literal", index, variant.name),
            }
        }
        Ok(Rvalue::Aggregate(
            Box::new(AggregateKind::Adt(adt.adt_def.clone(), adt.variant_index)),
            operands,
        ))
    }

    /// `lhs op rhs` with the runtime checks integer arithmetic needs.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn build_binary_op(
        &mut self,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
        lhs_ty: &Ty,
        rhs_ty: &Ty,
        result_ty: &Ty,
        span: Span,
    ) -> Result<Rvalue> {
        let integral = lhs_ty.is_integral();
        let overflow_checks = self.config.overflow_checks && integral;

        if overflow_checks && op.is_checkable() {
            let result = self.new_temp(Ty::tuple(vec![result_ty.clone(), Ty::bool()]), span);
            let result = Place::from_local(result);
            self.push_assign(
                result.clone(),
                Rvalue::CheckedBinaryOp(op, lhs.to_copy(), rhs.to_copy()),
                span,
            );
            let overflowed = Operand::Move(result.clone().field(1, Ty::bool()));
            self.assert(overflowed, false, AssertMessage::Overflow(op, lhs, rhs), span)?;
            return Ok(Rvalue::Use(Operand::Move(result.field(0, result_ty.clone()))));
        }

        if overflow_checks && op.is_shift() {
            let (Some(lhs_size), Some(rhs_size)) = (lhs_ty.scalar_size(), rhs_ty.scalar_size())
            else {
                bail!("shift of non-integer types `{}` and `{}`", lhs_ty, rhs_ty)
            };
            let amount_ty = unsigned_counterpart(rhs_ty);
            let amount = if rhs_ty.is_signed() {
                let amount = self.new_temp(amount_ty.clone(), span);
                self.push_assign(
                    Place::from_local(amount),
                    Rvalue::Cast(CastKind::IntToInt, rhs.to_copy(), amount_ty.clone()),
                    span,
                );
                Operand::Move(Place::from_local(amount))
            } else {
                rhs.to_copy()
            };
            let bits = Constant::scalar(
                Scalar::from_uint(lhs_size.bits() as u128, rhs_size),
                amount_ty,
                span,
            );
            let in_range = self.new_temp(Ty::bool(), span);
            self.push_assign(
                Place::from_local(in_range),
                Rvalue::BinaryOp(BinOp::Lt, amount, Operand::constant(bits)),
                span,
            );
            self.assert(
                Operand::Move(Place::from_local(in_range)),
                true,
                AssertMessage::Overflow(op, lhs.to_copy(), rhs.to_copy()),
                span,
            )?;
        }

        if integral && matches!(op, BinOp::Div | BinOp::Rem) {
            self.check_divisor(op, &lhs, &rhs, rhs_ty, span)?;
        }

        Ok(Rvalue::BinaryOp(op, lhs, rhs))
    }

    /// Division and remainder assert a non-zero divisor and, for signed
    /// types, that `MIN / -1` does not overflow.
    fn check_divisor(
        &mut self,
        op: BinOp,
        lhs: &Operand,
        rhs: &Operand,
        ty: &Ty,
        span: Span,
    ) -> Result<()> {
        let Some(size) = ty.scalar_size() else {
            bail!("division of non-integer type `{}`", ty)
        };
        let int_constant = |value: i128| {
            Operand::constant(Constant::scalar(Scalar::from_int(value, size), ty.clone(), span))
        };

        let is_zero = self.new_temp(Ty::bool(), span);
        self.push_assign(
            Place::from_local(is_zero),
            Rvalue::BinaryOp(BinOp::Eq, rhs.to_copy(), int_constant(0)),
            span,
        );
        let msg = match op {
            BinOp::Div => AssertMessage::DivisionByZero(lhs.to_copy()),
            _ => AssertMessage::RemainderByZero(lhs.to_copy()),
        };
        self.assert(Operand::Move(Place::from_local(is_zero)), false, msg, span)?;

        if ty.is_signed() {
            let is_neg_one = self.new_temp(Ty::bool(), span);
            self.push_assign(
                Place::from_local(is_neg_one),
                Rvalue::BinaryOp(BinOp::Eq, rhs.to_copy(), int_constant(-1)),
                span,
            );
            let is_min = self.new_temp(Ty::bool(), span);
            self.push_assign(
                Place::from_local(is_min),
                Rvalue::BinaryOp(BinOp::Eq, lhs.to_copy(), int_constant(size.signed_int_min())),
                span,
            );
            let overflows = self.new_temp(Ty::bool(), span);
            self.push_assign(
                Place::from_local(overflows),
                Rvalue::BinaryOp(
                    BinOp::BitAnd,
                    Operand::Move(Place::from_local(is_neg_one)),
                    Operand::Move(Place::from_local(is_min)),
                ),
                span,
            );
            self.assert(
                Operand::Move(Place::from_local(overflows)),
                false,
                AssertMessage::Overflow(op, lhs.to_copy(), rhs.to_copy()),
                span,
            )?;
        }
        Ok(())
    }

    pub(super) fn build_unary_op(
        &mut self,
        op: UnOp,
        arg: Operand,
        arg_ty: &Ty,
        span: Span,
    ) -> Result<Rvalue> {
        if self.config.overflow_checks && op == UnOp::Neg {
            if let TyKind::Int(int) = &arg_ty.kind {
                let size = int.size();
                let min = Constant::scalar(
                    Scalar::from_int(size.signed_int_min(), size),
                    arg_ty.clone(),
                    span,
                );
                let is_min = self.new_temp(Ty::bool(), span);
                self.push_assign(
                    Place::from_local(is_min),
                    Rvalue::BinaryOp(BinOp::Eq, arg.to_copy(), Operand::constant(min)),
                    span,
                );
                self.assert(
                    Operand::Move(Place::from_local(is_min)),
                    false,
                    AssertMessage::OverflowNeg(arg.to_copy()),
                    span,
                )?;
            }
        }
        Ok(Rvalue::UnaryOp(op, arg))
    }

    /// Ends the current block with an assertion; execution continues in
    /// a fresh block when `cond == expected`.
    pub(super) fn assert(
        &mut self,
        cond: Operand,
        expected: bool,
        msg: AssertMessage,
        span: Span,
    ) -> Result<()> {
        let success = self.new_block();
        let cleanup = self.diverge_cleanup();
        self.terminate(
            TerminatorKind::Assert {
                cond,
                expected,
                msg,
                target: success,
                cleanup,
            },
            span,
        )?;
        self.current_block = success;
        Ok(())
    }

    /// Callee first, then arguments left to right.
    fn lower_call(
        &mut self,
        destination: &Place,
        expr: &Expr,
        fun: &Expr,
        args: &[Expr],
        from_hir_call: bool,
    ) -> Result<()> {
        let func = self.as_operand(fun)?;
        let args = self.as_operands(args)?;
        let target = if expr.ty.is_never() {
            None
        } else {
            Some(self.new_block())
        };
        // the callee owns its arguments, also when it unwinds
        self.record_operands_moved(&args);
        let cleanup = self.diverge_cleanup();
        self.terminate(
            TerminatorKind::Call {
                func,
                args,
                destination: destination.clone(),
                target,
                cleanup,
                from_hir_call,
                fn_span: expr.span,
            },
            expr.span,
        )?;
        match target {
            Some(target) => self.current_block = target,
            None => self.diverge(),
        }
        Ok(())
    }

    /// `lhs = rhs`: the value first, then the place. Values with drop glue
    /// drop the old contents before the write.
    pub(super) fn lower_assign(&mut self, lhs: &Expr, rhs: &Expr, span: Span) -> Result<()> {
        if !lhs.is_place_expr() {
            return Err(Error::unsupported("assignment to a non-place expression", span));
        }
        if lhs.ty.needs_drop() {
            let value = self.as_operand(rhs)?;
            let place = self.lower_place(lhs)?;
            self.record_operands_moved(std::slice::from_ref(&value));
            let target = self.new_block();
            let unwind = self.diverge_cleanup();
            self.terminate(
                TerminatorKind::Drop {
                    place: place.clone(),
                    target,
                    unwind,
                },
                span,
            )?;
            self.current_block = target;
            self.push_assign(place, Rvalue::Use(value), span);
        } else {
            let rvalue = self.as_rvalue(rhs)?;
            let place = self.lower_place(lhs)?;
            self.push_assign_moving(place, rvalue, span);
        }
        Ok(())
    }

    /// `lhs op= rhs`: operand first, then the place, written back as
    /// `lhs = op(copy lhs, rhs)`.
    pub(super) fn lower_assign_op(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, span: Span) -> Result<()> {
        if !lhs.is_place_expr() {
            return Err(Error::unsupported("compound assignment to a non-place expression", span));
        }
        let rhs_op = self.as_operand(rhs)?;
        let place = self.lower_place(lhs)?;
        let rvalue = self.build_binary_op(
            op,
            Operand::Copy(place.clone()),
            rhs_op,
            &lhs.ty,
            &rhs.ty,
            &lhs.ty,
            span,
        )?;
        self.push_assign(place, rvalue, span);
        Ok(())
    }

    pub(super) fn assign_unit(&mut self, destination: &Place, span: Span) {
        self.push_assign(
            destination.clone(),
            Rvalue::Use(Operand::constant(Constant::unit(span))),
            span,
        );
    }

    /// Assignment whose rvalue consumes its operands.
    fn push_assign_moving(&mut self, place: Place, rvalue: Rvalue, span: Span) {
        let moved: Vec<Operand> = match &rvalue {
            Rvalue::Use(op) | Rvalue::Repeat(op, _) | Rvalue::Cast(_, op, _) => vec![op.clone()],
            Rvalue::Aggregate(_, ops) => ops.clone(),
            _ => Vec::new(),
        };
        self.push_assign(place, rvalue, span);
        self.record_operands_moved(&moved);
    }
}

pub(super) fn cast_kind(from: &Ty, to: &Ty) -> Option<CastKind> {
    use TyKind::*;
    Some(match (&from.kind, &to.kind) {
        (Int(_) | Uint(_) | Bool | Char, Int(_) | Uint(_)) => CastKind::IntToInt,
        (Uint(UintTy::U8), Char) => CastKind::IntToInt,
        (Int(_) | Uint(_), Float(_)) => CastKind::IntToFloat,
        (Float(_), Int(_) | Uint(_)) => CastKind::FloatToInt,
        (Float(_), Float(_)) => CastKind::FloatToFloat,
        (RawPtr(..) | Ref(..), RawPtr(..)) => CastKind::PtrToPtr,
        _ => return None,
    })
}

/// Unsigned type of the same width; other types map to themselves.
fn unsigned_counterpart(ty: &Ty) -> Ty {
    match &ty.kind {
        TyKind::Int(int) => Ty::uint(match int {
            IntTy::Isize => UintTy::Usize,
            IntTy::I8 => UintTy::U8,
            IntTy::I16 => UintTy::U16,
            IntTy::I32 => UintTy::U32,
            IntTy::I64 => UintTy::U64,
            IntTy::I128 => UintTy::U128,
        }),
        _ => ty.clone(),
    }
}
