// THIR→MIR lowering.
//
// `MirLowering` walks a typed program item by item; every function, const
// and static body is built by its own `BodyBuilder`, which owns the
// growing block and local arenas plus the scope stack. Expression
// lowering lives in `expr` and is split by concern:
// - block: blocks, statements and `let`
// - control_flow: `if`, loops, `break`/`continue`/`return`, `&&`/`||`
// - place: places and projections
// - matches: `match` and `if let`
// - pattern: pattern → tests + bindings
// - scope: scopes, drop scheduling and unwind chains
// - const_eval: numeric constant arithmetic

use std::collections::{HashMap, HashSet};

use rsmir_core::cancel::CancellationToken;
use rsmir_core::config::BuildConfig;
use rsmir_core::diagnostics::Diagnostic;
use rsmir_core::error::{Error, Result};
use rsmir_core::mir::{
    self, BasicBlockData, BasicBlockId, LocalDecl, LocalId, LocalInfo, Mutability, Path, Place,
    PlaceElem, Rvalue, SourceInfo, Statement, StatementKind, Symbol, Terminator, TerminatorKind,
    Ty, VarDebugInfo, START_BLOCK,
};
use rsmir_core::span::Span;
use rsmir_core::thir;
use rsmir_core::{bug, debug, info};

mod block;
mod const_eval;
mod control_flow;
mod expr;
mod matches;
mod pattern;
mod place;
mod scope;

use scope::{ScopeKind, Scopes};

/// THIR → MIR lowering pass.
///
/// Builds one MIR body per function, const and static of a typed
/// program. Items that hit an unsupported construct or a failing constant
/// evaluation abort the whole transform, unless error tolerance is on, in
/// which case they are skipped and reported through
/// [`MirLowering::take_diagnostics`].
#[derive(Debug)]
pub struct MirLowering {
    config: BuildConfig,
    cancel: CancellationToken,
    next_mir_id: mir::MirId,
    next_body_id: u32,
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl MirLowering {
    pub fn new() -> Self {
        Self::with_config(BuildConfig::default())
    }

    pub fn with_config(config: BuildConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::never(),
            next_mir_id: 0,
            next_body_id: 0,
            diagnostics: Vec::new(),
            has_errors: false,
        }
    }

    /// Polls `token` after every sealed block; a cancelled token turns
    /// the running build into `Error::Interrupted`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn set_error_tolerance(&mut self, enabled: bool) {
        self.config.tolerate_errors = enabled;
    }

    pub fn transform(&mut self, program: &thir::Program) -> Result<mir::Program> {
        self.lower_program(program)
    }

    pub fn take_diagnostics(&mut self) -> (Vec<Diagnostic>, bool) {
        let diagnostics = std::mem::take(&mut self.diagnostics);
        let has_errors = std::mem::replace(&mut self.has_errors, false);
        (diagnostics, has_errors)
    }

    fn lower_program(&mut self, program: &thir::Program) -> Result<mir::Program> {
        let mut mir_program = mir::Program::new();
        for item in &program.items {
            match &item.kind {
                thir::ItemKind::Function(function) => {
                    let path = Path::single(item.name.clone());
                    self.lower_function_item(&mut mir_program, &item.name, path, function, item.span)?;
                }
                thir::ItemKind::Const(konst) => {
                    self.lower_const_item(&mut mir_program, &item.name, konst, item.span)?;
                }
                thir::ItemKind::Static(stat) => {
                    let result = self.build_static(item.name.clone(), stat, item.span);
                    self.record(&mut mir_program, &item.name, result, |body_id| {
                        mir::ItemKind::Static(mir::Static {
                            name: item.name.clone(),
                            ty: stat.ty.clone(),
                            mutability: stat.mutability,
                            body_id,
                        })
                    })?;
                }
                thir::ItemKind::Impl(imp) => {
                    let self_path = Path::single(imp.self_ty.to_string());
                    for impl_item in &imp.items {
                        let path = self_path.join(impl_item.name.clone());
                        let name = Symbol::new(path.to_string());
                        match &impl_item.kind {
                            thir::ImplItemKind::Method(function) => {
                                self.lower_function_item(
                                    &mut mir_program,
                                    &name,
                                    path,
                                    function,
                                    impl_item.span,
                                )?;
                            }
                            thir::ImplItemKind::AssocConst(konst) => {
                                self.lower_const_item(&mut mir_program, &name, konst, impl_item.span)?;
                            }
                        }
                    }
                }
            }
        }
        info!(
            items = mir_program.items.len(),
            bodies = mir_program.bodies.len(),
            skipped = self.diagnostics.len(),
            "built MIR program"
        );
        Ok(mir_program)
    }

    fn lower_function_item(
        &mut self,
        program: &mut mir::Program,
        name: &Symbol,
        path: Path,
        function: &thir::Function,
        span: Span,
    ) -> Result<()> {
        let result = self.build_function(path.clone(), function, span);
        self.record(program, name, result, |body_id| {
            mir::ItemKind::Function(mir::Function {
                name: name.clone(),
                path,
                sig: mir::FunctionSig {
                    inputs: function.sig.inputs.clone(),
                    output: function.sig.output.clone(),
                },
                body_id,
            })
        })
    }

    fn lower_const_item(
        &mut self,
        program: &mut mir::Program,
        name: &Symbol,
        konst: &thir::Const,
        span: Span,
    ) -> Result<()> {
        let result = self.build_const(name.clone(), konst, span);
        self.record(program, name, result, |body_id| {
            mir::ItemKind::Const(mir::Const {
                name: name.clone(),
                ty: konst.ty.clone(),
                body_id,
            })
        })
    }

    /// Adds a built body to `program`, or turns a recoverable failure into
    /// a diagnostic when errors are tolerated.
    fn record(
        &mut self,
        program: &mut mir::Program,
        name: &Symbol,
        result: Result<mir::Body>,
        make_item: impl FnOnce(mir::BodyId) -> mir::ItemKind,
    ) -> Result<()> {
        match result {
            Ok(body) => {
                let body_id = mir::BodyId::new(self.next_body_id);
                self.next_body_id += 1;
                let mir_id = self.next_mir_id;
                self.next_mir_id += 1;
                program.bodies.insert(body_id, body);
                program.items.push(mir::Item {
                    mir_id,
                    kind: make_item(body_id),
                });
                Ok(())
            }
            Err(err) if self.config.tolerate_errors && err.is_recoverable() => {
                tracing::warn!(item = %name, code = err.code(), "skipping item: {}", err);
                self.diagnostics.push(Diagnostic::from_error(name, &err));
                self.has_errors = true;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub fn build_function(
        &self,
        path: Path,
        function: &thir::Function,
        span: Span,
    ) -> Result<mir::Body> {
        let builder = BodyBuilder::new(
            &self.config,
            &self.cancel,
            mir::BodySource::Fn { path },
            function.sig.output.clone(),
            false,
            span,
        );
        builder.lower_fn_body(&function.body)
    }

    pub fn build_const(
        &self,
        name: impl Into<Symbol>,
        konst: &thir::Const,
        span: Span,
    ) -> Result<mir::Body> {
        let builder = BodyBuilder::new(
            &self.config,
            &self.cancel,
            mir::BodySource::Const { name: name.into() },
            konst.ty.clone(),
            true,
            span,
        );
        builder.lower_initializer(&konst.init)
    }

    pub fn build_static(
        &self,
        name: impl Into<Symbol>,
        stat: &thir::Static,
        span: Span,
    ) -> Result<mir::Body> {
        let builder = BodyBuilder::new(
            &self.config,
            &self.cancel,
            mir::BodySource::Static {
                name: name.into(),
                mutability: stat.mutability,
            },
            stat.ty.clone(),
            true,
            span,
        );
        builder.lower_initializer(&stat.init)
    }
}

impl Default for MirLowering {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-body construction state.
///
/// Blocks and locals are only ever appended. `current_block` is the open
/// block new statements go to; a path that cannot be reached any more
/// (after `return`, `break`, a call returning `!`) continues in a block
/// recorded in `dead_blocks`, so joins can tell live edges from dead ones.
pub struct BodyBuilder<'a> {
    config: &'a BuildConfig,
    cancel: &'a CancellationToken,
    source: mir::BodySource,
    span: Span,
    /// Const and static initializers fold arithmetic at build time.
    const_context: bool,
    basic_blocks: Vec<BasicBlockData>,
    locals: Vec<LocalDecl>,
    arg_count: usize,
    var_debug_info: Vec<VarDebugInfo>,
    var_map: HashMap<thir::LocalVarId, LocalId>,
    /// Moving bindings of an arm whose guard is being lowered, read
    /// through a shared borrow of the matched place.
    guard_places: HashMap<thir::LocalVarId, Place>,
    scopes: Scopes,
    current_block: BasicBlockId,
    dead_blocks: HashSet<BasicBlockId>,
    return_block: Option<BasicBlockId>,
    resume_block: Option<BasicBlockId>,
}

impl<'a> BodyBuilder<'a> {
    fn new(
        config: &'a BuildConfig,
        cancel: &'a CancellationToken,
        source: mir::BodySource,
        return_ty: Ty,
        const_context: bool,
        span: Span,
    ) -> Self {
        let mut builder = Self {
            config,
            cancel,
            source,
            span,
            const_context,
            basic_blocks: Vec::new(),
            locals: Vec::new(),
            arg_count: 0,
            var_debug_info: Vec::new(),
            var_map: HashMap::new(),
            guard_places: HashMap::new(),
            scopes: Scopes::default(),
            current_block: START_BLOCK,
            dead_blocks: HashSet::new(),
            return_block: None,
            resume_block: None,
        };
        builder.push_local(LocalDecl::new(return_ty, span).with_info(LocalInfo::ReturnPlace));
        builder.push_block(false);
        builder
    }

    fn lower_fn_body(mut self, body: &thir::Body) -> Result<mir::Body> {
        debug!(source = ?self.source, "building MIR body");
        self.push_scope(ScopeKind::Fn);
        self.declare_params(&body.params)?;
        self.lower_expr_into(&Place::return_place(), &body.value)?;
        self.pop_scope(ScopeKind::Fn)?;
        self.finish()
    }

    fn lower_initializer(mut self, init: &thir::Expr) -> Result<mir::Body> {
        debug!(source = ?self.source, "building MIR body");
        self.push_scope(ScopeKind::Fn);
        self.lower_expr_into(&Place::return_place(), init)?;
        self.pop_scope(ScopeKind::Fn)?;
        self.finish()
    }

    /// Parameters become `_1.._n` in order; named ones are bound directly
    /// to their argument local, patterned ones are destructured from it.
    fn declare_params(&mut self, params: &[thir::Param]) -> Result<()> {
        for param in params {
            let info = match param.self_kind {
                Some(kind) => LocalInfo::SelfArg(kind),
                None => LocalInfo::Arg,
            };
            self.push_local(
                LocalDecl::new(param.ty.clone(), param.span)
                    .with_info(info)
                    .with_mutability(Mutability::Not),
            );
            self.arg_count += 1;
        }

        let fn_scope = self.scopes.innermost();
        for (index, param) in params.iter().enumerate() {
            let local = index as LocalId + 1;
            match &param.pat {
                Some(thir::Pat {
                    kind:
                        thir::PatKind::Binding {
                            mutability,
                            name,
                            mode: thir::BindingMode::ByValue,
                            var,
                            subpattern: None,
                            ..
                        },
                    span,
                    ..
                }) => {
                    self.locals[local as usize].mutability = *mutability;
                    self.var_map.insert(*var, local);
                    self.var_debug_info.push(VarDebugInfo {
                        name: name.clone(),
                        source_info: SourceInfo::new(*span),
                        place: Place::from_local(local),
                    });
                    self.schedule_value_drop(fn_scope, local, param.span);
                }
                Some(pattern) => {
                    let plan = pattern::lower_pattern(pattern, Place::from_local(local))?;
                    if !plan.is_irrefutable() {
                        return Err(Error::unsupported(
                            "refutable pattern in function parameter",
                            pattern.span,
                        ));
                    }
                    self.bind_pattern(&plan.bindings, fn_scope)?;
                }
                None => self.schedule_value_drop(fn_scope, local, param.span),
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<mir::Body> {
        let span = self.span;
        match self.return_block {
            Some(return_block) => self.goto(return_block, span)?,
            None => self.terminate(TerminatorKind::Return, span)?,
        }
        if let Some(open) = self.basic_blocks.iter().position(|block| !block.is_sealed()) {
            bug!("bb{} was left without a terminator", open);
        }
        debug!(
            source = ?self.source,
            blocks = self.basic_blocks.len(),
            locals = self.locals.len(),
            "built MIR body"
        );
        Ok(mir::Body::new(
            self.source,
            self.basic_blocks,
            self.locals,
            self.arg_count,
            self.var_debug_info,
            self.span,
        ))
    }

    fn push_block(&mut self, is_cleanup: bool) -> BasicBlockId {
        let bb = self.basic_blocks.len() as BasicBlockId;
        self.basic_blocks.push(BasicBlockData::new(is_cleanup));
        bb
    }

    /// Fresh block; unreachable when allocated from an unreachable path.
    fn new_block(&mut self) -> BasicBlockId {
        let bb = self.push_block(false);
        if self.is_dead(self.current_block) {
            self.dead_blocks.insert(bb);
        }
        bb
    }

    /// Fresh block that only becomes reachable once something jumps to it
    /// from a live path (see [`BodyBuilder::mark_live`]).
    fn new_dead_block(&mut self) -> BasicBlockId {
        let bb = self.push_block(false);
        self.dead_blocks.insert(bb);
        bb
    }

    fn new_cleanup_block(&mut self) -> BasicBlockId {
        self.push_block(true)
    }

    fn is_dead(&self, bb: BasicBlockId) -> bool {
        self.dead_blocks.contains(&bb)
    }

    fn mark_live(&mut self, bb: BasicBlockId) {
        self.dead_blocks.remove(&bb);
    }

    /// Continues in a fresh unreachable block.
    fn diverge(&mut self) {
        self.current_block = self.new_dead_block();
    }

    fn push_statement(&mut self, kind: StatementKind, span: Span) {
        let bb = self.current_block;
        let block = &mut self.basic_blocks[bb as usize];
        if block.is_sealed() {
            bug!("statement pushed into sealed block bb{}", bb);
        }
        block.statements.push(Statement {
            source_info: SourceInfo::new(span),
            kind,
        });
    }

    fn push_assign(&mut self, place: Place, rvalue: Rvalue, span: Span) {
        self.push_statement(StatementKind::Assign(place, rvalue), span);
    }

    /// Seals `bb` without polling cancellation; cleanup blocks are sealed
    /// while another terminator is being built.
    fn seal(&mut self, bb: BasicBlockId, kind: TerminatorKind, span: Span) {
        let block = &mut self.basic_blocks[bb as usize];
        if block.is_sealed() {
            bug!("bb{} terminated twice", bb);
        }
        block.terminator = Some(Terminator {
            source_info: SourceInfo::new(span),
            kind,
        });
    }

    fn terminate_block(&mut self, bb: BasicBlockId, kind: TerminatorKind, span: Span) -> Result<()> {
        self.seal(bb, kind, span);
        if self.cancel.is_cancelled() {
            debug!(block = bb, "MIR build cancelled");
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    fn terminate(&mut self, kind: TerminatorKind, span: Span) -> Result<()> {
        self.terminate_block(self.current_block, kind, span)
    }

    fn goto(&mut self, target: BasicBlockId, span: Span) -> Result<()> {
        self.terminate(TerminatorKind::Goto { target }, span)
    }

    /// Ends every path in `ends` at a common continuation. Dead ends get
    /// `unreachable`; no continuation is allocated when all of them are
    /// dead, the builder then continues in a dead block.
    fn join(&mut self, ends: &[BasicBlockId], span: Span) -> Result<()> {
        if ends.iter().all(|bb| self.is_dead(*bb)) {
            for bb in ends {
                self.terminate_block(*bb, TerminatorKind::Unreachable, span)?;
            }
            self.diverge();
            return Ok(());
        }
        let join = self.push_block(false);
        for bb in ends {
            let kind = if self.is_dead(*bb) {
                TerminatorKind::Unreachable
            } else {
                TerminatorKind::Goto { target: join }
            };
            self.terminate_block(*bb, kind, span)?;
        }
        self.current_block = join;
        Ok(())
    }

    /// The single block ending in `return`.
    fn return_block(&mut self) -> BasicBlockId {
        match self.return_block {
            Some(bb) => bb,
            None => {
                let bb = self.push_block(false);
                self.seal(bb, TerminatorKind::Return, self.span);
                self.return_block = Some(bb);
                bb
            }
        }
    }

    /// The single cleanup block ending in `resume`.
    fn resume_block(&mut self) -> BasicBlockId {
        match self.resume_block {
            Some(bb) => bb,
            None => {
                let bb = self.new_cleanup_block();
                self.seal(bb, TerminatorKind::Resume, self.span);
                self.resume_block = Some(bb);
                bb
            }
        }
    }

    fn push_local(&mut self, decl: LocalDecl) -> LocalId {
        let local = self.locals.len() as LocalId;
        self.locals.push(decl);
        local
    }

    /// Compiler temporary.
    fn new_temp(&mut self, ty: Ty, span: Span) -> LocalId {
        self.push_local(LocalDecl::new(ty, span).internal())
    }

    fn local_ty(&self, local: LocalId) -> &Ty {
        &self.locals[local as usize].ty
    }

    fn place_ty(&self, place: &Place) -> Ty {
        let mut ty = self.local_ty(place.local).clone();
        for elem in &place.projection {
            ty = match elem {
                PlaceElem::Deref => match ty.builtin_deref() {
                    Some(pointee) => pointee.clone(),
                    None => bug!("dereference of non-pointer type `{}`", ty),
                },
                PlaceElem::Field(_, field_ty) => field_ty.clone(),
                PlaceElem::Index(_) => match ty.builtin_index() {
                    Some(elem_ty) => elem_ty.clone(),
                    None => bug!("index into non-array type `{}`", ty),
                },
                PlaceElem::Downcast(..) => ty,
            };
        }
        ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn builder<'a>(config: &'a BuildConfig, cancel: &'a CancellationToken) -> BodyBuilder<'a> {
        BodyBuilder::new(
            config,
            cancel,
            mir::BodySource::Fn {
                path: Path::single("f"),
            },
            Ty::unit(),
            false,
            Span::DUMMY,
        )
    }

    #[test]
    fn blocks_allocated_on_dead_paths_are_dead() {
        let (config, cancel) = (BuildConfig::default(), CancellationToken::never());
        let mut builder = builder(&config, &cancel);
        let live = builder.new_block();
        builder.diverge();
        let dead = builder.new_block();
        assert!(!builder.is_dead(live));
        assert!(builder.is_dead(dead));
    }

    #[test]
    fn join_of_dead_ends_allocates_nothing() {
        let (config, cancel) = (BuildConfig::default(), CancellationToken::never());
        let mut builder = builder(&config, &cancel);
        let a = builder.new_dead_block();
        let b = builder.new_dead_block();
        let before = builder.basic_blocks.len();

        builder.join(&[a, b], Span::DUMMY).unwrap();

        // only the fresh dead continuation
        assert_eq!(builder.basic_blocks.len(), before + 1);
        assert!(builder.is_dead(builder.current_block));
        assert_eq!(
            builder.basic_blocks[a as usize].terminator().kind,
            TerminatorKind::Unreachable
        );
    }

    #[test]
    #[should_panic(expected = "statement pushed into sealed block bb0")]
    fn writing_into_a_sealed_block_is_a_bug() {
        let (config, cancel) = (BuildConfig::default(), CancellationToken::never());
        let mut builder = builder(&config, &cancel);
        builder.goto(0, Span::DUMMY).unwrap();
        builder.push_statement(StatementKind::Nop, Span::DUMMY);
    }

    #[test]
    fn place_types_follow_projections() {
        let (config, cancel) = (BuildConfig::default(), CancellationToken::never());
        let mut builder = builder(&config, &cancel);
        let pair = Ty::tuple(vec![Ty::i32(), Ty::array(Ty::bool(), 3)]);
        let local = builder.new_temp(Ty::reference(pair, Mutability::Not), Span::DUMMY);
        let index = builder.new_temp(Ty::usize(), Span::DUMMY);
        let place = Place::from_local(local)
            .deref()
            .field(1, Ty::array(Ty::bool(), 3))
            .index(index);
        assert_eq!(builder.place_ty(&place), Ty::bool());
    }
}
