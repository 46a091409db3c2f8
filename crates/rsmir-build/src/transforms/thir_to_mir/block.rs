//! Blocks, statements and `let`.

use rsmir_core::error::{Error, Result};
use rsmir_core::mir::{
    LocalDecl, LocalId, LocalInfo, Mutability, Place, Rvalue, SourceInfo, StatementKind, Symbol,
    Ty, VarDebugInfo,
};
use rsmir_core::span::Span;
use rsmir_core::thir::{self, BindingMode, Expr, ExprKind, Pat, PatKind, Stmt, StmtKind};

use super::pattern::{self, PatBinding};
use super::scope::{BreakableTarget, DropKind, ScopeKind};
use super::BodyBuilder;

impl<'a> BodyBuilder<'a> {
    pub(super) fn lower_block_into(&mut self, destination: &Place, block: &thir::Block) -> Result<()> {
        match &block.label {
            Some(label) => self.lower_labeled_block(destination, label, block),
            None => self.lower_block_body(destination, block),
        }
    }

    /// `'label: { ... }`; `break 'label value` jumps to the block's exit.
    fn lower_labeled_block(
        &mut self,
        destination: &Place,
        label: &Symbol,
        block: &thir::Block,
    ) -> Result<()> {
        let exit = self.new_dead_block();
        self.push_breakable_scope(
            ScopeKind::LabeledBlock,
            BreakableTarget {
                label: Some(label.clone()),
                break_block: exit,
                continue_block: None,
                destination: destination.clone(),
            },
        );
        self.lower_block_body(destination, block)?;
        self.pop_scope(ScopeKind::LabeledBlock)?;
        self.jump(exit, block.span)?;
        self.current_block = exit;
        Ok(())
    }

    fn lower_block_body(&mut self, destination: &Place, block: &thir::Block) -> Result<()> {
        self.push_scope(ScopeKind::Block);
        let block_scope = self.scopes.innermost();
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        match &block.expr {
            Some(tail) => self.lower_tail_expr(destination, tail, block_scope)?,
            None if !self.place_ty(destination).is_never() => {
                self.assign_unit(destination, block.span)
            }
            None => {}
        }
        self.pop_scope(ScopeKind::Block)
    }

    /// Since edition 2024 tail temporaries die before the block's locals;
    /// earlier editions keep them alive until the enclosing scope ends.
    fn lower_tail_expr(&mut self, destination: &Place, tail: &Expr, block_scope: usize) -> Result<()> {
        if self.config.edition.tail_temporaries_drop_first() {
            self.push_scope(ScopeKind::Statement);
            self.lower_expr_into(destination, tail)?;
            return self.pop_scope(ScopeKind::Statement);
        }
        let owner = self.scopes.enclosing_tail_scope(block_scope);
        let previous = self.scopes.set_temp_scope_override(Some(owner));
        let result = self.lower_expr_into(destination, tail);
        self.scopes.set_temp_scope_override(previous);
        result
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.push_scope(ScopeKind::Statement);
        match &stmt.kind {
            StmtKind::Expr(expr) => self.lower_stmt_expr(expr)?,
            StmtKind::Let {
                pattern,
                initializer,
            } => self.lower_let(pattern, initializer.as_ref(), stmt.span)?,
        }
        self.pop_scope(ScopeKind::Statement)
    }

    /// Expression statement; its value, if any, is dropped at the end of
    /// the statement.
    fn lower_stmt_expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Assign { lhs, rhs } => self.lower_assign(lhs, rhs, expr.span),
            ExprKind::AssignOp { op, lhs, rhs } => self.lower_assign_op(*op, lhs, rhs, expr.span),
            ExprKind::Break { label, value } => {
                self.lower_break(label.as_ref(), value.as_deref(), expr.span)
            }
            ExprKind::Continue { label } => self.lower_continue(label.as_ref(), expr.span),
            ExprKind::Return { value } => self.lower_return(value.as_deref(), expr.span),
            _ => self.as_temp(expr, true).map(|_| ()),
        }
    }

    fn lower_let(&mut self, pattern: &Pat, initializer: Option<&Expr>, span: Span) -> Result<()> {
        let binding_scope = self.scopes.binding_scope();
        match &pattern.kind {
            PatKind::Binding {
                mutability,
                name,
                mode: BindingMode::ByValue,
                var,
                ty,
                subpattern: None,
            } => {
                let local =
                    self.declare_binding(*var, name, *mutability, ty.clone(), pattern.span, binding_scope);
                if let Some(init) = initializer {
                    self.lower_let_initializer(Place::from_local(local), init, binding_scope)?;
                }
                self.schedule_value_drop(binding_scope, local, span);
                Ok(())
            }
            // `let _ = value;` drops the value right away
            PatKind::Wild => match initializer {
                Some(init) if init.is_place_expr() => self.lower_place(init).map(|_| ()),
                Some(init) => self.as_temp(init, true).map(|_| ()),
                None => Ok(()),
            },
            _ => {
                let Some(init) = initializer else {
                    return Err(Error::unsupported(
                        "destructuring `let` without an initializer",
                        span,
                    ));
                };
                self.lower_destructuring_let(pattern, init, binding_scope, span)
            }
        }
    }

    /// `let x = &value;` keeps the borrowed temporary alive as long as `x`.
    fn lower_let_initializer(&mut self, place: Place, init: &Expr, binding_scope: usize) -> Result<()> {
        match &init.kind {
            ExprKind::Borrow { borrow_kind, arg } if !arg.is_place_expr() => {
                let temp = self.as_temp_in(arg, binding_scope, true)?;
                self.push_assign(place, Rvalue::Ref(*borrow_kind, Place::from_local(temp)), init.span);
                Ok(())
            }
            _ => self.lower_expr_into(&place, init),
        }
    }

    fn lower_destructuring_let(
        &mut self,
        pattern: &Pat,
        init: &Expr,
        binding_scope: usize,
        span: Span,
    ) -> Result<()> {
        let (place, temp) = if init.is_place_expr() {
            (self.lower_place(init)?, None)
        } else {
            let temp = self.as_temp_in(init, binding_scope, false)?;
            (Place::from_local(temp), Some(temp))
        };
        let plan = pattern::lower_pattern(pattern, place)?;
        if !plan.is_irrefutable() {
            return Err(Error::unsupported("refutable pattern in `let`", span));
        }
        // A temporary that loses no part of its value to the bindings is
        // still dropped as a whole.
        if let Some(temp) = temp {
            if !plan.bindings.iter().any(PatBinding::moves_out) {
                self.schedule_value_drop(binding_scope, temp, span);
            }
        }
        self.bind_pattern(&plan.bindings, binding_scope)
    }

    /// New user variable owned by `scope`, with its storage started.
    pub(super) fn declare_binding(
        &mut self,
        var: thir::LocalVarId,
        name: &Symbol,
        mutability: Mutability,
        ty: Ty,
        span: Span,
        scope: usize,
    ) -> LocalId {
        let local = self.push_local(
            LocalDecl::new(ty, span)
                .with_info(LocalInfo::User(name.clone()))
                .with_mutability(mutability),
        );
        self.var_map.insert(var, local);
        self.var_debug_info.push(VarDebugInfo {
            name: name.clone(),
            source_info: SourceInfo::new(span),
            place: Place::from_local(local),
        });
        self.push_statement(StatementKind::StorageLive(local), span);
        self.schedule_drop(scope, local, DropKind::Storage, span);
        local
    }

    /// Declares and initializes the variables of a matched pattern.
    pub(super) fn bind_pattern(&mut self, bindings: &[PatBinding], scope: usize) -> Result<()> {
        for binding in bindings {
            let local = self.declare_binding(
                binding.var,
                &binding.name,
                binding.mutability,
                binding.ty.clone(),
                binding.span,
                scope,
            );
            let rvalue = match binding.mode {
                BindingMode::ByValue => Rvalue::Use(Self::consume(binding.place.clone(), &binding.ty)),
                BindingMode::ByRef(kind) => Rvalue::Ref(kind, binding.place.clone()),
            };
            self.push_assign(Place::from_local(local), rvalue, binding.span);
            self.schedule_value_drop(scope, local, binding.span);
        }
        Ok(())
    }
}
