//! `if`, `&&`/`||`, `loop`, `break`, `continue` and `return`.

use rsmir_core::error::Result;
use rsmir_core::mir::{
    BasicBlockId, Constant, Operand, Place, Rvalue, SwitchTargets, Symbol, TerminatorKind, Ty,
};
use rsmir_core::span::Span;
use rsmir_core::thir::{Expr, ExprKind, LogicalOp};

use super::scope::{BreakableTarget, ScopeKind};
use super::BodyBuilder;

impl<'a> BodyBuilder<'a> {
    pub(super) fn lower_if(
        &mut self,
        destination: &Place,
        cond: &Expr,
        then: &Expr,
        else_opt: Option<&Expr>,
        span: Span,
    ) -> Result<()> {
        if let ExprKind::Let { expr, pat } = &cond.kind {
            return self.lower_if_let(destination, expr, pat, then, else_opt, span);
        }

        let cond = self.as_operand(cond)?;
        let then_block = self.new_block();
        let else_block = self.new_block();
        self.terminate(
            TerminatorKind::SwitchInt {
                discr: cond,
                switch_ty: Ty::bool(),
                targets: SwitchTargets::static_if(0, else_block, then_block),
            },
            span,
        )?;

        self.current_block = then_block;
        self.lower_expr_into(destination, then)?;
        let then_end = self.current_block;

        self.current_block = else_block;
        match else_opt {
            Some(else_expr) => self.lower_expr_into(destination, else_expr)?,
            None => self.assign_unit(destination, span),
        }
        let else_end = self.current_block;

        self.join(&[then_end, else_end], span)
    }

    /// `lhs && rhs` evaluates `rhs` only when `lhs` is true, `lhs || rhs`
    /// only when it is false.
    pub(super) fn lower_logical_op(
        &mut self,
        destination: &Place,
        op: LogicalOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<()> {
        let lhs = self.as_operand(lhs)?;
        let rhs_block = self.new_block();
        let short_circuit = self.new_block();
        let (short_value, targets) = match op {
            LogicalOp::And => (false, SwitchTargets::static_if(0, short_circuit, rhs_block)),
            LogicalOp::Or => (true, SwitchTargets::static_if(0, rhs_block, short_circuit)),
        };
        self.terminate(
            TerminatorKind::SwitchInt {
                discr: lhs,
                switch_ty: Ty::bool(),
                targets,
            },
            span,
        )?;

        self.current_block = short_circuit;
        self.push_assign(
            destination.clone(),
            Rvalue::Use(Operand::constant(Constant::bool(short_value, span))),
            span,
        );

        self.current_block = rhs_block;
        self.lower_expr_into(destination, rhs)?;
        let rhs_end = self.current_block;

        self.join(&[short_circuit, rhs_end], span)
    }

    /// `loop { body }`. The exit block stays unreachable until a live
    /// `break` jumps to it, and a body that never finishes gets no edge
    /// back to the head.
    pub(super) fn lower_loop(
        &mut self,
        destination: &Place,
        body: &Expr,
        label: Option<&Symbol>,
        span: Span,
    ) -> Result<()> {
        let head = self.new_block();
        self.goto(head, span)?;
        self.current_block = head;

        let exit = self.new_dead_block();
        self.push_breakable_scope(
            ScopeKind::Loop,
            BreakableTarget {
                label: label.cloned(),
                break_block: exit,
                continue_block: Some(head),
                destination: destination.clone(),
            },
        );
        let loop_scope = self.scopes.innermost();
        let body_value = Place::from_local(self.new_temp(Ty::unit(), span));
        self.lower_expr_into(&body_value, body)?;

        // end of one iteration
        self.emit_exit_drops(loop_scope)?;
        self.jump(head, span)?;
        self.discard_scope(ScopeKind::Loop);

        self.current_block = exit;
        Ok(())
    }

    pub(super) fn lower_break(
        &mut self,
        label: Option<&Symbol>,
        value: Option<&Expr>,
        span: Span,
    ) -> Result<()> {
        let (scope, target) = self.scopes.find_break(label);
        match value {
            Some(value) => self.lower_expr_into(&target.destination, value)?,
            None => self.assign_unit(&target.destination, span),
        }
        self.emit_exit_drops(scope)?;
        self.jump(target.break_block, span)?;
        self.diverge();
        Ok(())
    }

    pub(super) fn lower_continue(&mut self, label: Option<&Symbol>, span: Span) -> Result<()> {
        let (scope, head) = self.scopes.find_continue(label);
        self.emit_exit_drops(scope)?;
        self.jump(head, span)?;
        self.diverge();
        Ok(())
    }

    /// Writes `_0`, leaves every scope and jumps to the return block.
    pub(super) fn lower_return(&mut self, value: Option<&Expr>, span: Span) -> Result<()> {
        let return_place = Place::return_place();
        match value {
            Some(value) => self.lower_expr_into(&return_place, value)?,
            None => self.assign_unit(&return_place, span),
        }
        self.emit_exit_drops(0)?;
        let return_block = self.return_block();
        self.jump(return_block, span)?;
        self.diverge();
        Ok(())
    }

    /// Ends the current block with a jump to `target`, which becomes live.
    /// On an unreachable path the block gets `unreachable` instead, so
    /// dead code adds no edges.
    pub(super) fn jump(&mut self, target: BasicBlockId, span: Span) -> Result<()> {
        if self.is_dead(self.current_block) {
            return self.terminate(TerminatorKind::Unreachable, span);
        }
        self.goto(target, span)?;
        self.mark_live(target);
        Ok(())
    }
}
