use rsmir_core::bail;
use rsmir_core::error::{Error, Result};
use rsmir_core::mir::{AssertMessage, BinOp, LocalId, Operand, Place, Rvalue, Ty};
use rsmir_core::span::Span;
use rsmir_core::thir::{Expr, ExprKind};

use super::BodyBuilder;

impl<'a> BodyBuilder<'a> {
    /// Place holding the value of `expr`. Value expressions are first
    /// materialized into a temporary of the current temporary scope.
    pub(super) fn as_place(&mut self, expr: &Expr) -> Result<Place> {
        if expr.is_place_expr() {
            return self.lower_place(expr);
        }
        let temp = self.as_temp(expr, true)?;
        Ok(Place::from_local(temp))
    }

    /// Resolves a place expression to a base local plus projections,
    /// outermost base first.
    pub(super) fn lower_place(&mut self, expr: &Expr) -> Result<Place> {
        match &expr.kind {
            ExprKind::VarRef { id } => {
                if let Some(place) = self.guard_places.get(id) {
                    return Ok(place.clone());
                }
                match self.var_map.get(id) {
                    Some(local) => Ok(Place::from_local(*local)),
                    None => bail!("reference to undeclared variable {:?}", id),
                }
            }
            ExprKind::Field { base, field } => {
                let base = self.as_place(base)?;
                Ok(base.field(*field, expr.ty.clone()))
            }
            ExprKind::Deref { overloaded: Some(_), .. } => {
                Err(Error::unsupported("overloaded dereference", expr.span))
            }
            ExprKind::Deref { arg, overloaded: None } => {
                let pointer = self.as_place(arg)?;
                Ok(pointer.deref())
            }
            ExprKind::Index { base, index } => {
                let base = self.as_place(base)?;
                let index = self.as_temp(index, false)?;
                self.bounds_check(&base, index, expr.span)?;
                Ok(base.index(index))
            }
            _ => bail!("expression is not a place: {:?}", expr.kind),
        }
    }

    /// `len = Len(base); lt = index < len; assert(lt)`. Emitted for every
    /// index, constant or not.
    fn bounds_check(&mut self, base: &Place, index: LocalId, span: Span) -> Result<()> {
        let len = Place::from_local(self.new_temp(Ty::usize(), span));
        let lt = Place::from_local(self.new_temp(Ty::bool(), span));
        let index = Place::from_local(index);

        self.push_assign(len.clone(), Rvalue::Len(base.clone()), span);
        self.push_assign(
            lt.clone(),
            Rvalue::BinaryOp(BinOp::Lt, Operand::Copy(index.clone()), Operand::Copy(len.clone())),
            span,
        );
        self.assert(
            Operand::Move(lt),
            true,
            AssertMessage::BoundsCheck {
                len: Operand::Move(len),
                index: Operand::Copy(index),
            },
            span,
        )
    }
}
