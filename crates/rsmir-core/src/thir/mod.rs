//! Typed high-level tree: the input to MIR building.
//!
//! Every expression and pattern carries its resolved type. Names are
//! already resolved to `LocalVarId`s or `ItemRef`s, implicit dereferences
//! and default binding modes are explicit.

use std::sync::Arc;

pub mod builder;
pub mod ty;

pub use crate::ident::{Path, Symbol};
pub use crate::mir::{BinOp, BorrowKind, ImplicitSelfKind, Scalar, UnOp};
use crate::span::Span;
pub use builder::ThirBuilder;
pub use ty::{AdtDef, FieldIdx, Mutability, Ty, VariantIdx};

pub type ThirId = u32;
/// Identity of a user variable. Distinct from MIR locals.
pub type LocalVarId = u32;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
    pub next_thir_id: ThirId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub thir_id: ThirId,
    pub name: Symbol,
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Function(Function),
    Const(Const),
    Static(Static),
    Impl(Impl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub sig: FunctionSig,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub inputs: Vec<Ty>,
    pub output: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub params: Vec<Param>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Ty,
    /// `None` for parameters that are never named (`_: T` is a `Wild`).
    pub pat: Option<Pat>,
    pub self_kind: Option<ImplicitSelfKind>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Const {
    pub ty: Ty,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Static {
    pub ty: Ty,
    pub mutability: Mutability,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Impl {
    pub self_ty: Ty,
    pub items: Vec<ImplItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplItem {
    pub thir_id: ThirId,
    pub name: Symbol,
    pub kind: ImplItemKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImplItemKind {
    Method(Function),
    AssocConst(Const),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub thir_id: ThirId,
    pub kind: ExprKind,
    pub ty: Ty,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Lit),
    VarRef {
        id: LocalVarId,
    },
    Path(ItemRef),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    LogicalOp {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Numeric or pointer cast to `self.ty`.
    Cast(Box<Expr>),
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
        from_hir_call: bool,
    },
    Deref {
        arg: Box<Expr>,
        /// `Deref::deref` implementation for user-defined smart pointers.
        overloaded: Option<ItemRef>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        base: Box<Expr>,
        field: FieldIdx,
    },
    Borrow {
        borrow_kind: BorrowKind,
        arg: Box<Expr>,
    },
    Tuple {
        fields: Vec<Expr>,
    },
    Array {
        fields: Vec<Expr>,
    },
    Repeat {
        value: Box<Expr>,
        count: u64,
    },
    Adt(Box<AdtExpr>),
    Block(Block),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_opt: Option<Box<Expr>>,
    },
    /// `let PAT = EXPR`; only valid as an `if` condition.
    Let {
        expr: Box<Expr>,
        pat: Box<Pat>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<Arm>,
    },
    Loop {
        body: Box<Expr>,
        label: Option<Symbol>,
    },
    While {
        cond: Box<Expr>,
        body: Box<Expr>,
        label: Option<Symbol>,
    },
    Break {
        label: Option<Symbol>,
        value: Option<Box<Expr>>,
    },
    Continue {
        label: Option<Symbol>,
    },
    Return {
        value: Option<Box<Expr>>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    AssignOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Expressions that denote a memory location rather than a value.
    pub fn is_place_expr(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::VarRef { .. }
                | ExprKind::Field { .. }
                | ExprKind::Index { .. }
                | ExprKind::Deref { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Bool(bool),
    /// Unsigned magnitude; the sign comes from an enclosing negation.
    Int(u128),
    Float(f64),
    Char(char),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRef {
    pub name: Symbol,
    pub kind: ItemRefKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRefKind {
    Fn,
    Const,
    Static,
}

impl ItemRef {
    pub fn function(name: impl Into<Symbol>) -> Self {
        Self {
            name: name.into(),
            kind: ItemRefKind::Fn,
        }
    }

    pub fn constant(name: impl Into<Symbol>) -> Self {
        Self {
            name: name.into(),
            kind: ItemRefKind::Const,
        }
    }

    pub fn static_item(name: impl Into<Symbol>) -> Self {
        Self {
            name: name.into(),
            kind: ItemRefKind::Static,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdtExpr {
    pub adt_def: Arc<AdtDef>,
    pub variant_index: VariantIdx,
    /// In source order.
    pub fields: Vec<FieldExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub field: FieldIdx,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Labeled blocks can be the target of `break 'label value`.
    pub label: Option<Symbol>,
    pub stmts: Vec<Stmt>,
    pub expr: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Let {
        pattern: Pat,
        initializer: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arm {
    pub pattern: Pat,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pat {
    pub thir_id: ThirId,
    pub kind: PatKind,
    /// Type of the value being matched.
    pub ty: Ty,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatKind {
    Wild,
    /// `..` inside a tuple or struct pattern.
    Rest,
    Binding {
        mutability: Mutability,
        name: Symbol,
        mode: BindingMode,
        var: LocalVarId,
        /// Type of the bound variable (`&T` for by-reference bindings).
        ty: Ty,
        subpattern: Option<Box<Pat>>,
    },
    Variant {
        adt_def: Arc<AdtDef>,
        variant_index: VariantIdx,
        subpatterns: Vec<FieldPat>,
    },
    /// Tuples and structs.
    Leaf {
        subpatterns: Vec<FieldPat>,
    },
    Deref {
        subpattern: Box<Pat>,
    },
    Constant {
        value: Scalar,
    },
    Or {
        pats: Vec<Pat>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldPat {
    pub field: FieldIdx,
    pub pattern: Pat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    ByValue,
    ByRef(BorrowKind),
}
