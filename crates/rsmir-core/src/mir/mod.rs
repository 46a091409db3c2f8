//! Mid-level IR: one control-flow graph per function, const, or static.
//!
//! Every body owns its locals (`_0` is the return place, `_1.._n` are the
//! arguments) and a list of basic blocks. A finished body has exactly one
//! terminator per block; cleanup blocks only run while unwinding.

use std::collections::HashMap;
use std::sync::Arc;

use derive_more::Display;

pub mod pretty;
pub mod scalar;
pub mod ty;

pub use crate::ident::{Path, Symbol};
use crate::span::Span;
pub use scalar::{Scalar, ScalarError, ScalarInt};
pub use ty::{AdtDef, FieldIdx, Mutability, Ty, TyKind, VariantIdx};

pub type MirId = u32;
pub type LocalId = u32;
pub type BasicBlockId = u32;

/// `_0`.
pub const RETURN_PLACE: LocalId = 0;
pub const START_BLOCK: BasicBlockId = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
    pub bodies: HashMap<BodyId, Body>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            bodies: HashMap::new(),
        }
    }

    pub fn body_of(&self, name: &str) -> Option<&Body> {
        self.items
            .iter()
            .find(|item| item.name().as_str() == name)
            .and_then(|item| self.bodies.get(&item.body_id()))
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl BodyId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub mir_id: MirId,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Function(Function),
    Const(Const),
    Static(Static),
}

impl Item {
    pub fn name(&self) -> &Symbol {
        match &self.kind {
            ItemKind::Function(function) => &function.name,
            ItemKind::Const(konst) => &konst.name,
            ItemKind::Static(stat) => &stat.name,
        }
    }

    pub fn body_id(&self) -> BodyId {
        match &self.kind {
            ItemKind::Function(function) => function.body_id,
            ItemKind::Const(konst) => konst.body_id,
            ItemKind::Static(stat) => stat.body_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Symbol,
    pub path: Path,
    pub sig: FunctionSig,
    pub body_id: BodyId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub inputs: Vec<Ty>,
    pub output: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Const {
    pub name: Symbol,
    pub ty: Ty,
    pub body_id: BodyId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Static {
    pub name: Symbol,
    pub ty: Ty,
    pub mutability: Mutability,
    pub body_id: BodyId,
}

/// What a body computes; only used for the printed header.
#[derive(Debug, Clone, PartialEq)]
pub enum BodySource {
    Fn { path: Path },
    Const { name: Symbol },
    Static { name: Symbol, mutability: Mutability },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub source: BodySource,
    pub basic_blocks: Vec<BasicBlockData>,
    pub locals: Vec<LocalDecl>,
    pub arg_count: usize,
    pub var_debug_info: Vec<VarDebugInfo>,
    pub span: Span,
}

impl Body {
    pub fn new(
        source: BodySource,
        basic_blocks: Vec<BasicBlockData>,
        locals: Vec<LocalDecl>,
        arg_count: usize,
        var_debug_info: Vec<VarDebugInfo>,
        span: Span,
    ) -> Self {
        Self {
            source,
            basic_blocks,
            locals,
            arg_count,
            var_debug_info,
            span,
        }
    }

    pub fn return_ty(&self) -> &Ty {
        &self.locals[RETURN_PLACE as usize].ty
    }

    pub fn local_kind(&self, local: LocalId) -> LocalKind {
        let index = local as usize;
        if local == RETURN_PLACE {
            LocalKind::ReturnPointer
        } else if index <= self.arg_count {
            LocalKind::Arg
        } else if matches!(self.locals[index].local_info, LocalInfo::User(_)) {
            LocalKind::Var
        } else {
            LocalKind::Temp
        }
    }

    pub fn args_iter(&self) -> impl Iterator<Item = LocalId> {
        1..=self.arg_count as LocalId
    }

    pub fn block(&self, bb: BasicBlockId) -> &BasicBlockData {
        &self.basic_blocks[bb as usize]
    }

    pub fn local_decl(&self, local: LocalId) -> &LocalDecl {
        &self.locals[local as usize]
    }

    /// Local bound to the user variable `name`, if any.
    pub fn local_named(&self, name: &str) -> Option<LocalId> {
        self.var_debug_info
            .iter()
            .find(|info| info.name.as_str() == name)
            .and_then(|info| info.place.as_local())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Var,
    Temp,
    Arg,
    ReturnPointer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlockData {
    pub statements: Vec<Statement>,
    pub terminator: Option<Terminator>,
    pub is_cleanup: bool,
}

impl BasicBlockData {
    pub fn new(is_cleanup: bool) -> Self {
        Self {
            statements: Vec::new(),
            terminator: None,
            is_cleanup,
        }
    }

    pub fn terminator(&self) -> &Terminator {
        self.terminator
            .as_ref()
            .unwrap_or_else(|| panic!("basic block has no terminator"))
    }

    pub fn is_sealed(&self) -> bool {
        self.terminator.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub span: Span,
}

impl SourceInfo {
    pub fn new(span: Span) -> Self {
        Self { span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub source_info: SourceInfo,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Assign(Place, Rvalue),
    StorageLive(LocalId),
    StorageDead(LocalId),
    Nop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Terminator {
    pub source_info: SourceInfo,
    pub kind: TerminatorKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerminatorKind {
    Goto {
        target: BasicBlockId,
    },
    SwitchInt {
        discr: Operand,
        switch_ty: Ty,
        targets: SwitchTargets,
    },
    Resume,
    Return,
    Unreachable,
    Drop {
        place: Place,
        target: BasicBlockId,
        unwind: Option<BasicBlockId>,
    },
    Call {
        func: Operand,
        args: Vec<Operand>,
        destination: Place,
        /// `None` when the callee returns `!`.
        target: Option<BasicBlockId>,
        cleanup: Option<BasicBlockId>,
        from_hir_call: bool,
        fn_span: Span,
    },
    Assert {
        cond: Operand,
        expected: bool,
        msg: AssertMessage,
        target: BasicBlockId,
        cleanup: Option<BasicBlockId>,
    },
}

impl TerminatorKind {
    /// All successor edges, unwind edges included, in a fixed order.
    pub fn successors(&self) -> Vec<BasicBlockId> {
        match self {
            TerminatorKind::Goto { target } => vec![*target],
            TerminatorKind::SwitchInt { targets, .. } => targets.all_targets(),
            TerminatorKind::Resume | TerminatorKind::Return | TerminatorKind::Unreachable => {
                Vec::new()
            }
            TerminatorKind::Drop { target, unwind, .. } => {
                std::iter::once(*target).chain(*unwind).collect()
            }
            TerminatorKind::Call {
                target, cleanup, ..
            } => target.iter().chain(cleanup.iter()).copied().collect(),
            TerminatorKind::Assert {
                target, cleanup, ..
            } => std::iter::once(*target).chain(*cleanup).collect(),
        }
    }

    pub fn unwind(&self) -> Option<BasicBlockId> {
        match self {
            TerminatorKind::Drop { unwind, .. } => *unwind,
            TerminatorKind::Call { cleanup, .. } | TerminatorKind::Assert { cleanup, .. } => {
                *cleanup
            }
            _ => None,
        }
    }
}

/// Value-to-block table of a `switchInt`. Values are raw bits of the switch
/// type; anything not listed goes to `otherwise`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchTargets {
    pub values: Vec<u128>,
    pub targets: Vec<BasicBlockId>,
    pub otherwise: BasicBlockId,
}

impl SwitchTargets {
    pub fn new(arms: impl IntoIterator<Item = (u128, BasicBlockId)>, otherwise: BasicBlockId) -> Self {
        let (values, targets): (Vec<u128>, Vec<BasicBlockId>) = arms.into_iter().unzip();
        for (idx, value) in values.iter().enumerate() {
            assert!(
                !values[..idx].contains(value),
                "duplicate switch value {value}"
            );
        }
        Self {
            values,
            targets,
            otherwise,
        }
    }

    /// `value` goes to `then`, everything else to `else_`.
    pub fn static_if(value: u128, then: BasicBlockId, else_: BasicBlockId) -> Self {
        Self::new([(value, then)], else_)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u128, BasicBlockId)> + '_ {
        self.values.iter().copied().zip(self.targets.iter().copied())
    }

    pub fn target_for_value(&self, value: u128) -> BasicBlockId {
        self.iter()
            .find(|(candidate, _)| *candidate == value)
            .map(|(_, target)| target)
            .unwrap_or(self.otherwise)
    }

    pub fn all_targets(&self) -> Vec<BasicBlockId> {
        let mut targets = self.targets.clone();
        targets.push(self.otherwise);
        targets
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    Use(Operand),
    Repeat(Operand, u64),
    Ref(BorrowKind, Place),
    Len(Place),
    Cast(CastKind, Operand, Ty),
    BinaryOp(BinOp, Operand, Operand),
    /// Produces `(result, overflowed)`.
    CheckedBinaryOp(BinOp, Operand, Operand),
    UnaryOp(UnOp, Operand),
    Discriminant(Place),
    Aggregate(Box<AggregateKind>, Vec<Operand>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateKind {
    Array(Ty),
    Tuple,
    Adt(Arc<AdtDef>, VariantIdx),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Copy(Place),
    Move(Place),
    Constant(Box<Constant>),
}

impl Operand {
    pub fn constant(constant: Constant) -> Self {
        Operand::Constant(Box::new(constant))
    }

    pub fn place(&self) -> Option<&Place> {
        match self {
            Operand::Copy(place) | Operand::Move(place) => Some(place),
            Operand::Constant(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Operand::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    /// Same operand, but never consuming its place.
    pub fn to_copy(&self) -> Operand {
        match self {
            Operand::Move(place) => Operand::Copy(place.clone()),
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Place {
    pub local: LocalId,
    pub projection: Vec<PlaceElem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaceElem {
    Deref,
    Field(FieldIdx, Ty),
    Index(LocalId),
    /// Narrows an enum place to one variant; carries the variant name for
    /// printing.
    Downcast(Symbol, VariantIdx),
}

impl Place {
    pub fn from_local(local: LocalId) -> Self {
        Self {
            local,
            projection: Vec::new(),
        }
    }

    pub fn return_place() -> Self {
        Self::from_local(RETURN_PLACE)
    }

    pub fn as_local(&self) -> Option<LocalId> {
        self.projection.is_empty().then_some(self.local)
    }

    pub fn project_deeper(mut self, elem: PlaceElem) -> Self {
        self.projection.push(elem);
        self
    }

    pub fn field(self, field: FieldIdx, ty: Ty) -> Self {
        self.project_deeper(PlaceElem::Field(field, ty))
    }

    pub fn deref(self) -> Self {
        self.project_deeper(PlaceElem::Deref)
    }

    pub fn index(self, index: LocalId) -> Self {
        self.project_deeper(PlaceElem::Index(index))
    }

    pub fn downcast(self, name: Symbol, variant: VariantIdx) -> Self {
        self.project_deeper(PlaceElem::Downcast(name, variant))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub span: Span,
    pub ty: Ty,
    pub literal: ConstantKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantKind {
    Scalar(Scalar),
    /// Values of zero-sized types such as `()`.
    ZeroSized,
    Str(String),
    Fn(Symbol),
    /// Reference to a named const or static item.
    Named(Symbol),
}

impl Constant {
    pub fn new(literal: ConstantKind, ty: Ty, span: Span) -> Self {
        Self { span, ty, literal }
    }

    pub fn scalar(value: Scalar, ty: Ty, span: Span) -> Self {
        Self::new(ConstantKind::Scalar(value), ty, span)
    }

    pub fn bool(value: bool, span: Span) -> Self {
        Self::scalar(Scalar::from_bool(value), Ty::bool(), span)
    }

    pub fn unit(span: Span) -> Self {
        Self::new(ConstantKind::ZeroSized, Ty::unit(), span)
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self.literal {
            ConstantKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalDecl {
    pub mutability: Mutability,
    pub local_info: LocalInfo,
    pub internal: bool,
    pub ty: Ty,
    pub source_info: SourceInfo,
}

impl LocalDecl {
    pub fn new(ty: Ty, span: Span) -> Self {
        Self {
            mutability: Mutability::Mut,
            local_info: LocalInfo::Temp,
            internal: false,
            ty,
            source_info: SourceInfo::new(span),
        }
    }

    pub fn with_info(mut self, local_info: LocalInfo) -> Self {
        self.local_info = local_info;
        self
    }

    pub fn with_mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocalInfo {
    ReturnPlace,
    Arg,
    SelfArg(ImplicitSelfKind),
    User(Symbol),
    Temp,
}

/// How a method takes `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplicitSelfKind {
    /// `self`
    Imm,
    /// `mut self`
    Mut,
    /// `&self`
    ImmRef,
    /// `&mut self`
    MutRef,
    /// `self: Type`
    Explicit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDebugInfo {
    pub name: Symbol,
    pub source_info: SourceInfo,
    pub place: Place,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorrowKind {
    Shared,
    Mut,
}

impl BorrowKind {
    pub fn mutability(self) -> Mutability {
        match self {
            BorrowKind::Shared => Mutability::Not,
            BorrowKind::Mut => Mutability::Mut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    IntToInt,
    IntToFloat,
    FloatToInt,
    FloatToFloat,
    PtrToPtr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitXor,
    BitAnd,
    BitOr,
    Shl,
    Shr,
    Eq,
    Lt,
    Le,
    Ne,
    Ge,
    Gt,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Lt | BinOp::Le | BinOp::Ne | BinOp::Ge | BinOp::Gt
        )
    }

    /// Arithmetic that gets a `CheckedBinaryOp` under overflow checks.
    pub fn is_checkable(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Ne => "!=",
            BinOp::Ge => ">=",
            BinOp::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssertMessage {
    BoundsCheck { len: Operand, index: Operand },
    Overflow(BinOp, Operand, Operand),
    OverflowNeg(Operand),
    DivisionByZero(Operand),
    RemainderByZero(Operand),
}

impl AssertMessage {
    /// Format string shown at runtime; `{}` holes are filled by
    /// [`AssertMessage::operands`].
    pub fn description(&self) -> String {
        match self {
            AssertMessage::BoundsCheck { .. } => {
                "index out of bounds: the length is {} but the index is {}".to_string()
            }
            AssertMessage::Overflow(BinOp::Shl, ..) => {
                "attempt to shift left by `{}`, which would overflow".to_string()
            }
            AssertMessage::Overflow(BinOp::Shr, ..) => {
                "attempt to shift right by `{}`, which would overflow".to_string()
            }
            AssertMessage::Overflow(op, ..) => format!(
                "attempt to compute `{{}} {} {{}}`, which would overflow",
                op.symbol()
            ),
            AssertMessage::OverflowNeg(_) => "attempt to negate `{}`, which would overflow".to_string(),
            AssertMessage::DivisionByZero(_) => "attempt to divide `{}` by zero".to_string(),
            AssertMessage::RemainderByZero(_) => {
                "attempt to calculate the remainder of `{}` with a divisor of zero".to_string()
            }
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            AssertMessage::BoundsCheck { len, index } => vec![len, index],
            AssertMessage::Overflow(BinOp::Shl | BinOp::Shr, _, rhs) => vec![rhs],
            AssertMessage::Overflow(_, lhs, rhs) => vec![lhs, rhs],
            AssertMessage::OverflowNeg(op)
            | AssertMessage::DivisionByZero(op)
            | AssertMessage::RemainderByZero(op) => vec![op],
        }
    }
}
