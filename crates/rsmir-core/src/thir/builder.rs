use std::sync::Arc;

use super::*;
use crate::types::Size;

/// Assembles typed trees by hand.
///
/// Allocates `ThirId`s and `LocalVarId`s and fills in result types the way
/// the type checker would for the simple cases. Front-ends and tests use it
/// to produce builder input without a full type checker.
#[derive(Debug, Default)]
pub struct ThirBuilder {
    next_thir_id: ThirId,
    next_var: LocalVarId,
    span: Span,
}

impl ThirBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Span attached to everything built from now on.
    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    fn next_id(&mut self) -> ThirId {
        let id = self.next_thir_id;
        self.next_thir_id += 1;
        id
    }

    pub fn fresh_var(&mut self) -> LocalVarId {
        let var = self.next_var;
        self.next_var += 1;
        var
    }

    pub fn expr(&mut self, kind: ExprKind, ty: Ty) -> Expr {
        Expr {
            thir_id: self.next_id(),
            kind,
            ty,
            span: self.span,
        }
    }

    pub fn pat(&mut self, kind: PatKind, ty: Ty) -> Pat {
        Pat {
            thir_id: self.next_id(),
            kind,
            ty,
            span: self.span,
        }
    }

    pub fn int(&mut self, value: u128, ty: Ty) -> Expr {
        self.expr(ExprKind::Literal(Lit::Int(value)), ty)
    }

    /// `i32` literal; negative values become a negated literal.
    pub fn i32(&mut self, value: i32) -> Expr {
        let magnitude = self.int(value.unsigned_abs() as u128, Ty::i32());
        if value < 0 {
            self.unary(UnOp::Neg, magnitude)
        } else {
            magnitude
        }
    }

    pub fn usize(&mut self, value: u64) -> Expr {
        self.int(value as u128, Ty::usize())
    }

    pub fn float(&mut self, value: f64, ty: Ty) -> Expr {
        self.expr(ExprKind::Literal(Lit::Float(value)), ty)
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Literal(Lit::Bool(value)), Ty::bool())
    }

    pub fn char(&mut self, value: char) -> Expr {
        self.expr(ExprKind::Literal(Lit::Char(value)), Ty::char())
    }

    pub fn str(&mut self, value: &str) -> Expr {
        self.expr(
            ExprKind::Literal(Lit::Str(value.to_string())),
            Ty::reference(Ty::str(), Mutability::Not),
        )
    }

    pub fn unit(&mut self) -> Expr {
        self.expr(ExprKind::Tuple { fields: Vec::new() }, Ty::unit())
    }

    pub fn var(&mut self, id: LocalVarId, ty: Ty) -> Expr {
        self.expr(ExprKind::VarRef { id }, ty)
    }

    pub fn path_const(&mut self, name: &str, ty: Ty) -> Expr {
        self.expr(ExprKind::Path(ItemRef::constant(name)), ty)
    }

    pub fn path_static(&mut self, name: &str, ty: Ty) -> Expr {
        self.expr(ExprKind::Path(ItemRef::static_item(name)), ty)
    }

    pub fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = if op.is_comparison() {
            Ty::bool()
        } else {
            lhs.ty.clone()
        };
        self.expr(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), ty)
    }

    pub fn unary(&mut self, op: UnOp, arg: Expr) -> Expr {
        let ty = arg.ty.clone();
        self.expr(ExprKind::Unary(op, Box::new(arg)), ty)
    }

    pub fn logical(&mut self, op: LogicalOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(
            ExprKind::LogicalOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Ty::bool(),
        )
    }

    pub fn cast(&mut self, arg: Expr, ty: Ty) -> Expr {
        self.expr(ExprKind::Cast(Box::new(arg)), ty)
    }

    pub fn call(&mut self, name: &str, args: Vec<Expr>, output: Ty) -> Expr {
        let fun = self.expr(ExprKind::Path(ItemRef::function(name)), Ty::fn_def(name));
        self.expr(
            ExprKind::Call {
                fun: Box::new(fun),
                args,
                from_hir_call: true,
            },
            output,
        )
    }

    pub fn borrow(&mut self, borrow_kind: BorrowKind, arg: Expr) -> Expr {
        let ty = Ty::reference(arg.ty.clone(), borrow_kind.mutability());
        self.expr(
            ExprKind::Borrow {
                borrow_kind,
                arg: Box::new(arg),
            },
            ty,
        )
    }

    pub fn deref(&mut self, arg: Expr) -> Expr {
        let ty = arg
            .ty
            .builtin_deref()
            .cloned()
            .unwrap_or_else(|| panic!("cannot dereference `{}`", arg.ty));
        self.expr(
            ExprKind::Deref {
                arg: Box::new(arg),
                overloaded: None,
            },
            ty,
        )
    }

    /// `*arg` through a user `Deref` impl producing `target`.
    pub fn overloaded_deref(&mut self, arg: Expr, deref_fn: &str, target: Ty) -> Expr {
        self.expr(
            ExprKind::Deref {
                arg: Box::new(arg),
                overloaded: Some(ItemRef::function(deref_fn)),
            },
            target,
        )
    }

    pub fn field(&mut self, base: Expr, field: FieldIdx) -> Expr {
        let ty = base
            .ty
            .field_ty(None, field)
            .cloned()
            .unwrap_or_else(|| panic!("`{}` has no field {}", base.ty, field));
        self.expr(
            ExprKind::Field {
                base: Box::new(base),
                field,
            },
            ty,
        )
    }

    pub fn index(&mut self, base: Expr, index: Expr) -> Expr {
        let ty = base
            .ty
            .builtin_index()
            .cloned()
            .unwrap_or_else(|| panic!("cannot index into `{}`", base.ty));
        self.expr(
            ExprKind::Index {
                base: Box::new(base),
                index: Box::new(index),
            },
            ty,
        )
    }

    pub fn tuple(&mut self, fields: Vec<Expr>) -> Expr {
        let ty = Ty::tuple(fields.iter().map(|field| field.ty.clone()).collect());
        self.expr(ExprKind::Tuple { fields }, ty)
    }

    pub fn array(&mut self, elem_ty: Ty, fields: Vec<Expr>) -> Expr {
        let ty = Ty::array(elem_ty, fields.len() as u64);
        self.expr(ExprKind::Array { fields }, ty)
    }

    pub fn repeat(&mut self, value: Expr, count: u64) -> Expr {
        let ty = Ty::array(value.ty.clone(), count);
        self.expr(
            ExprKind::Repeat {
                value: Box::new(value),
                count,
            },
            ty,
        )
    }

    /// Struct or enum-variant literal; `fields` are `(field index, value)`
    /// in source order.
    pub fn adt(
        &mut self,
        adt_def: Arc<AdtDef>,
        variant_index: VariantIdx,
        fields: Vec<(FieldIdx, Expr)>,
    ) -> Expr {
        let ty = Ty::adt(adt_def.clone());
        let fields = fields
            .into_iter()
            .map(|(field, expr)| FieldExpr { field, expr })
            .collect();
        self.expr(
            ExprKind::Adt(Box::new(AdtExpr {
                adt_def,
                variant_index,
                fields,
            })),
            ty,
        )
    }

    pub fn block(&mut self, stmts: Vec<Stmt>, tail: Option<Expr>) -> Expr {
        let ty = tail
            .as_ref()
            .map(|tail| tail.ty.clone())
            .unwrap_or_else(Ty::unit);
        self.block_with(None, stmts, tail, ty)
    }

    pub fn labeled_block(
        &mut self,
        label: &str,
        stmts: Vec<Stmt>,
        tail: Option<Expr>,
        ty: Ty,
    ) -> Expr {
        self.block_with(Some(Symbol::from(label)), stmts, tail, ty)
    }

    fn block_with(
        &mut self,
        label: Option<Symbol>,
        stmts: Vec<Stmt>,
        tail: Option<Expr>,
        ty: Ty,
    ) -> Expr {
        let block = Block {
            label,
            stmts,
            expr: tail.map(Box::new),
            span: self.span,
        };
        self.expr(ExprKind::Block(block), ty)
    }

    pub fn if_(&mut self, cond: Expr, then: Expr, else_opt: Option<Expr>) -> Expr {
        let ty = match &else_opt {
            Some(else_expr) if then.ty.is_never() => else_expr.ty.clone(),
            Some(_) => then.ty.clone(),
            None => Ty::unit(),
        };
        self.expr(
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                else_opt: else_opt.map(Box::new),
            },
            ty,
        )
    }

    /// `if let pat = scrutinee { then } else { else_opt }`
    pub fn if_let(
        &mut self,
        pat: Pat,
        scrutinee: Expr,
        then: Expr,
        else_opt: Option<Expr>,
    ) -> Expr {
        let cond = self.expr(
            ExprKind::Let {
                expr: Box::new(scrutinee),
                pat: Box::new(pat),
            },
            Ty::bool(),
        );
        self.if_(cond, then, else_opt)
    }

    pub fn match_(&mut self, scrutinee: Expr, arms: Vec<Arm>, ty: Ty) -> Expr {
        self.expr(
            ExprKind::Match {
                scrutinee: Box::new(scrutinee),
                arms,
            },
            ty,
        )
    }

    pub fn arm(&mut self, pattern: Pat, guard: Option<Expr>, body: Expr) -> Arm {
        Arm {
            pattern,
            guard,
            body,
            span: self.span,
        }
    }

    /// `loop { body }`; `ty` is the type of the `break` values, or `!`.
    pub fn loop_(&mut self, body: Expr, ty: Ty) -> Expr {
        self.expr(
            ExprKind::Loop {
                body: Box::new(body),
                label: None,
            },
            ty,
        )
    }

    pub fn labeled_loop(&mut self, label: &str, body: Expr, ty: Ty) -> Expr {
        self.expr(
            ExprKind::Loop {
                body: Box::new(body),
                label: Some(Symbol::from(label)),
            },
            ty,
        )
    }

    pub fn while_(&mut self, cond: Expr, body: Expr) -> Expr {
        self.expr(
            ExprKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
                label: None,
            },
            Ty::unit(),
        )
    }

    pub fn break_(&mut self, label: Option<&str>, value: Option<Expr>) -> Expr {
        self.expr(
            ExprKind::Break {
                label: label.map(Symbol::from),
                value: value.map(Box::new),
            },
            Ty::never(),
        )
    }

    pub fn continue_(&mut self, label: Option<&str>) -> Expr {
        self.expr(
            ExprKind::Continue {
                label: label.map(Symbol::from),
            },
            Ty::never(),
        )
    }

    pub fn return_(&mut self, value: Option<Expr>) -> Expr {
        self.expr(
            ExprKind::Return {
                value: value.map(Box::new),
            },
            Ty::never(),
        )
    }

    pub fn assign(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(
            ExprKind::Assign {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Ty::unit(),
        )
    }

    pub fn assign_op(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(
            ExprKind::AssignOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Ty::unit(),
        )
    }

    pub fn stmt(&mut self, expr: Expr) -> Stmt {
        Stmt {
            kind: StmtKind::Expr(expr),
            span: self.span,
        }
    }

    pub fn let_(&mut self, pattern: Pat, initializer: Option<Expr>) -> Stmt {
        Stmt {
            kind: StmtKind::Let {
                pattern,
                initializer,
            },
            span: self.span,
        }
    }

    pub fn wild(&mut self, ty: Ty) -> Pat {
        self.pat(PatKind::Wild, ty)
    }

    pub fn binding(&mut self, name: &str, ty: Ty) -> (Pat, LocalVarId) {
        self.binding_with(name, ty, Mutability::Not, BindingMode::ByValue)
    }

    pub fn binding_mut(&mut self, name: &str, ty: Ty) -> (Pat, LocalVarId) {
        self.binding_with(name, ty, Mutability::Mut, BindingMode::ByValue)
    }

    /// `ref name` / `ref mut name` matching a value of type `matched`.
    pub fn ref_binding(
        &mut self,
        name: &str,
        borrow_kind: BorrowKind,
        matched: Ty,
    ) -> (Pat, LocalVarId) {
        let var = self.fresh_var();
        let var_ty = Ty::reference(matched.clone(), borrow_kind.mutability());
        let pat = self.pat(
            PatKind::Binding {
                mutability: Mutability::Not,
                name: Symbol::from(name),
                mode: BindingMode::ByRef(borrow_kind),
                var,
                ty: var_ty,
                subpattern: None,
            },
            matched,
        );
        (pat, var)
    }

    fn binding_with(
        &mut self,
        name: &str,
        ty: Ty,
        mutability: Mutability,
        mode: BindingMode,
    ) -> (Pat, LocalVarId) {
        let var = self.fresh_var();
        let pat = self.pat(
            PatKind::Binding {
                mutability,
                name: Symbol::from(name),
                mode,
                var,
                ty: ty.clone(),
                subpattern: None,
            },
            ty,
        );
        (pat, var)
    }

    pub fn const_pat(&mut self, value: Scalar, ty: Ty) -> Pat {
        self.pat(PatKind::Constant { value }, ty)
    }

    pub fn bool_pat(&mut self, value: bool) -> Pat {
        self.const_pat(Scalar::from_bool(value), Ty::bool())
    }

    pub fn i32_pat(&mut self, value: i32) -> Pat {
        self.const_pat(Scalar::from_int(value as i128, Size::from_bytes(4)), Ty::i32())
    }

    pub fn tuple_pat(&mut self, pats: Vec<Pat>) -> Pat {
        let ty = Ty::tuple(pats.iter().map(|pat| pat.ty.clone()).collect());
        let subpatterns = pats
            .into_iter()
            .enumerate()
            .map(|(field, pattern)| FieldPat { field, pattern })
            .collect();
        self.pat(PatKind::Leaf { subpatterns }, ty)
    }

    pub fn variant_pat(
        &mut self,
        adt_def: Arc<AdtDef>,
        variant_index: VariantIdx,
        pats: Vec<Pat>,
    ) -> Pat {
        let ty = Ty::adt(adt_def.clone());
        let subpatterns = pats
            .into_iter()
            .enumerate()
            .map(|(field, pattern)| FieldPat { field, pattern })
            .collect();
        self.pat(
            PatKind::Variant {
                adt_def,
                variant_index,
                subpatterns,
            },
            ty,
        )
    }

    pub fn deref_pat(&mut self, subpattern: Pat, ty: Ty) -> Pat {
        self.pat(
            PatKind::Deref {
                subpattern: Box::new(subpattern),
            },
            ty,
        )
    }

    pub fn or_pat(&mut self, pats: Vec<Pat>, ty: Ty) -> Pat {
        self.pat(PatKind::Or { pats }, ty)
    }

    pub fn param(&mut self, name: &str, ty: Ty) -> (Param, LocalVarId) {
        let (pat, var) = self.binding(name, ty.clone());
        (self.param_with_pat(ty, Some(pat)), var)
    }

    pub fn param_with_pat(&mut self, ty: Ty, pat: Option<Pat>) -> Param {
        Param {
            ty,
            pat,
            self_kind: None,
            span: self.span,
        }
    }

    pub fn self_param(&mut self, self_kind: ImplicitSelfKind, ty: Ty) -> (Param, LocalVarId) {
        let (pat, var) = match self_kind {
            ImplicitSelfKind::Mut => self.binding_mut("self", ty.clone()),
            _ => self.binding("self", ty.clone()),
        };
        let param = Param {
            ty,
            pat: Some(pat),
            self_kind: Some(self_kind),
            span: self.span,
        };
        (param, var)
    }

    pub fn function_decl(&mut self, params: Vec<Param>, output: Ty, body: Expr) -> Function {
        Function {
            sig: FunctionSig {
                inputs: params.iter().map(|param| param.ty.clone()).collect(),
                output,
            },
            body: Body {
                params,
                value: body,
            },
        }
    }

    pub fn function(&mut self, name: &str, params: Vec<Param>, output: Ty, body: Expr) -> Item {
        let function = self.function_decl(params, output, body);
        self.item(name, ItemKind::Function(function))
    }

    pub fn const_item(&mut self, name: &str, ty: Ty, init: Expr) -> Item {
        self.item(name, ItemKind::Const(Const { ty, init }))
    }

    pub fn static_item(&mut self, name: &str, ty: Ty, mutability: Mutability, init: Expr) -> Item {
        self.item(
            name,
            ItemKind::Static(Static {
                ty,
                mutability,
                init,
            }),
        )
    }

    pub fn impl_block(&mut self, self_ty: Ty, items: Vec<ImplItem>) -> Item {
        let name = Symbol::new(self_ty.to_string());
        self.item(name.as_str(), ItemKind::Impl(Impl { self_ty, items }))
    }

    pub fn method(&mut self, name: &str, params: Vec<Param>, output: Ty, body: Expr) -> ImplItem {
        let function = self.function_decl(params, output, body);
        ImplItem {
            thir_id: self.next_id(),
            name: Symbol::from(name),
            kind: ImplItemKind::Method(function),
            span: self.span,
        }
    }

    fn item(&mut self, name: &str, kind: ItemKind) -> Item {
        Item {
            thir_id: self.next_id(),
            name: Symbol::from(name),
            kind,
            span: self.span,
        }
    }

    pub fn program(&self, items: Vec<Item>) -> Program {
        Program {
            items,
            next_thir_id: self.next_thir_id,
        }
    }
}
