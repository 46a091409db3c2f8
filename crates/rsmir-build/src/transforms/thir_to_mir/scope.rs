//! Scope & drop stack.
//!
//! Every lexical region of a body (the function itself, blocks,
//! statements, match arms, loops, labeled blocks) pushes a frame that
//! records what must happen when control leaves it: `StorageDead` for
//! every local that got storage, and a `Drop` terminator for every value
//! that needs drop glue. Frames are popped strictly LIFO.
//!
//! Leaving any number of frames at once (`break`, `continue`, `return`)
//! replays the same exit sequence frame by frame, innermost first.
//!
//! Unwinding is modeled with cleanup chains: a terminator that can
//! unwind gets a cleanup edge into a chain that drops every value
//! scheduled so far, innermost first, and ends in the body's single
//! `resume` block. Chains are cached on the drop entry they start from
//! so that all calls inside one region share one chain.

use rsmir_core::error::Result;
use rsmir_core::mir::{
    BasicBlockId, LocalId, Operand, Place, StatementKind, Symbol, TerminatorKind,
};
use rsmir_core::span::Span;
use rsmir_core::{bug, trace};

use super::BodyBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DropKind {
    /// Run drop glue, then the storage goes too.
    Value,
    /// Only end the storage.
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ScopeKind {
    Fn,
    Block,
    /// One per statement; owns the statement's temporaries.
    Statement,
    Arm,
    Loop,
    LabeledBlock,
}

impl ScopeKind {
    fn is_breakable(self) -> bool {
        matches!(self, ScopeKind::Loop | ScopeKind::LabeledBlock)
    }
}

#[derive(Debug, Clone)]
struct DropData {
    local: LocalId,
    kind: DropKind,
    span: Span,
    /// Head of the cleanup chain that runs this drop and everything
    /// scheduled before it.
    cached_unwind: Option<BasicBlockId>,
}

/// Where `break` and `continue` go for a loop or labeled block.
#[derive(Debug, Clone)]
pub(super) struct BreakableTarget {
    pub label: Option<Symbol>,
    pub break_block: BasicBlockId,
    /// `None` for labeled blocks.
    pub continue_block: Option<BasicBlockId>,
    /// Receives `break` values.
    pub destination: Place,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    drops: Vec<DropData>,
    breakable: Option<BreakableTarget>,
    saved_temp_scope: Option<usize>,
}

#[derive(Debug, Default)]
pub(super) struct Scopes {
    scopes: Vec<Scope>,
    /// Scope that receives new temporaries instead of the innermost one.
    temp_scope_override: Option<usize>,
}

impl Scopes {
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push(&mut self, kind: ScopeKind, breakable: Option<BreakableTarget>) {
        if kind.is_breakable() != breakable.is_some() {
            bug!("{:?} scope pushed with mismatched break targets", kind);
        }
        // An override only covers the expression it was set for, never
        // nested scopes inside it.
        let saved_temp_scope = self.temp_scope_override.take();
        self.scopes.push(Scope {
            kind,
            drops: Vec::new(),
            breakable,
            saved_temp_scope,
        });
    }

    fn expect_innermost(&self, kind: ScopeKind) -> usize {
        match self.scopes.last() {
            Some(scope) if scope.kind == kind => self.scopes.len() - 1,
            Some(scope) => bug!(
                "popped {:?} scope but the innermost scope is {:?}",
                kind,
                scope.kind
            ),
            None => bug!("popped {:?} scope with an empty scope stack", kind),
        }
    }

    fn pop(&mut self, kind: ScopeKind) {
        self.expect_innermost(kind);
        if let Some(scope) = self.scopes.pop() {
            self.temp_scope_override = scope.saved_temp_scope;
        }
    }

    pub fn innermost(&self) -> usize {
        match self.scopes.len() {
            0 => bug!("no scope is open"),
            len => len - 1,
        }
    }

    /// Scope new temporaries are dropped in.
    pub fn temp_scope(&self) -> usize {
        self.temp_scope_override.unwrap_or_else(|| self.innermost())
    }

    /// Redirects temporaries to `target`; returns the previous override so
    /// callers can restore it.
    pub fn set_temp_scope_override(&mut self, target: Option<usize>) -> Option<usize> {
        std::mem::replace(&mut self.temp_scope_override, target)
    }

    /// Innermost scope that can own `let` bindings (any scope but a
    /// statement's temporary scope).
    pub fn binding_scope(&self) -> usize {
        match self
            .scopes
            .iter()
            .rposition(|scope| scope.kind != ScopeKind::Statement)
        {
            Some(index) => index,
            None => bug!("no scope can own bindings"),
        }
    }

    /// Scope that owns the temporaries of the tail expression of the
    /// block at `block_scope` in editions before 2024: the scope around
    /// the block, unless that is a loop body.
    pub fn enclosing_tail_scope(&self, block_scope: usize) -> usize {
        match block_scope.checked_sub(1) {
            Some(parent) if self.scopes[parent].kind != ScopeKind::Loop => parent,
            _ => block_scope,
        }
    }

    fn schedule(&mut self, index: usize, local: LocalId, kind: DropKind, span: Span) {
        let Some(scope) = self.scopes.get_mut(index) else {
            bug!("drop of _{} scheduled in missing scope {}", local, index)
        };
        scope.drops.push(DropData {
            local,
            kind,
            span,
            cached_unwind: None,
        });
        if kind == DropKind::Value {
            // Chains cached in inner scopes were built without this drop.
            for scope in &mut self.scopes[index + 1..] {
                for drop in &mut scope.drops {
                    drop.cached_unwind = None;
                }
            }
        }
    }

    /// Forgets the value drop of `local`; its value was moved out whole.
    fn unschedule_value_drop(&mut self, local: LocalId) -> bool {
        for index in (0..self.scopes.len()).rev() {
            let drops = &mut self.scopes[index].drops;
            let Some(position) = drops
                .iter()
                .position(|drop| drop.local == local && drop.kind == DropKind::Value)
            else {
                continue;
            };
            drops.remove(position);
            for scope in &mut self.scopes[index..] {
                for drop in &mut scope.drops {
                    drop.cached_unwind = None;
                }
            }
            return true;
        }
        false
    }

    /// Innermost breakable scope matching `label`; an unlabeled `break`
    /// only targets loops.
    pub fn find_break(&self, label: Option<&Symbol>) -> (usize, BreakableTarget) {
        for (index, scope) in self.scopes.iter().enumerate().rev() {
            let Some(target) = &scope.breakable else {
                continue;
            };
            let matches = match label {
                Some(label) => target.label.as_ref() == Some(label),
                None => target.continue_block.is_some(),
            };
            if matches {
                return (index, target.clone());
            }
        }
        match label {
            Some(label) => bug!("`break '{}` outside of a matching loop or block", label),
            None => bug!("`break` outside of a loop"),
        }
    }

    pub fn find_continue(&self, label: Option<&Symbol>) -> (usize, BasicBlockId) {
        for (index, scope) in self.scopes.iter().enumerate().rev() {
            let Some(target) = &scope.breakable else {
                continue;
            };
            if label.is_some() && target.label.as_ref() != label {
                continue;
            }
            match target.continue_block {
                Some(continue_block) => return (index, continue_block),
                None if label.is_some() => bug!("`continue` targets a labeled block"),
                None => {}
            }
        }
        bug!("`continue` outside of a loop")
    }
}

impl<'a> BodyBuilder<'a> {
    pub(super) fn push_scope(&mut self, kind: ScopeKind) {
        trace!(depth = self.scopes.depth(), "push {:?} scope", kind);
        self.scopes.push(kind, None);
    }

    pub(super) fn push_breakable_scope(&mut self, kind: ScopeKind, target: BreakableTarget) {
        trace!(
            depth = self.scopes.depth(),
            break_block = target.break_block,
            "push {:?} scope",
            kind
        );
        self.scopes.push(kind, Some(target));
    }

    /// Runs the exit sequence of the innermost scope on the current path
    /// and pops it. Panics if the innermost scope is not a `kind` scope.
    pub(super) fn pop_scope(&mut self, kind: ScopeKind) -> Result<()> {
        let index = self.scopes.expect_innermost(kind);
        self.emit_exit_drops(index)?;
        self.scopes.pop(kind);
        trace!(depth = self.scopes.depth(), "pop {:?} scope", kind);
        Ok(())
    }

    /// Pops the innermost scope without emitting anything. Only for paths
    /// that already ran the exit sequence.
    pub(super) fn discard_scope(&mut self, kind: ScopeKind) {
        self.scopes.pop(kind);
    }

    pub(super) fn schedule_drop(&mut self, scope: usize, local: LocalId, kind: DropKind, span: Span) {
        trace!(scope, local, "schedule {:?} drop", kind);
        self.scopes.schedule(scope, local, kind, span);
    }

    /// Value drop of `local` in `scope` if its type has drop glue.
    pub(super) fn schedule_value_drop(&mut self, scope: usize, local: LocalId, span: Span) {
        if self.local_ty(local).needs_drop() {
            self.schedule_drop(scope, local, DropKind::Value, span);
        }
    }

    /// Temporaries moved into a call, aggregate or assignment are no
    /// longer dropped by their scope.
    pub(super) fn record_operands_moved(&mut self, operands: &[Operand]) {
        for operand in operands {
            let Operand::Move(place) = operand else {
                continue;
            };
            let Some(local) = place.as_local() else {
                continue;
            };
            if self.locals[local as usize].internal && self.scopes.unschedule_value_drop(local) {
                trace!(local, "value moved, drop unscheduled");
            }
        }
    }

    /// Emits the exit sequences of every scope from the innermost one down
    /// to `target_depth` (inclusive), innermost first, on the current
    /// path. The scopes stay on the stack.
    pub(super) fn emit_exit_drops(&mut self, target_depth: usize) -> Result<()> {
        for scope_index in (target_depth..self.scopes.depth()).rev() {
            for drop_index in (0..self.scopes.scopes[scope_index].drops.len()).rev() {
                let drop = self.scopes.scopes[scope_index].drops[drop_index].clone();
                match drop.kind {
                    DropKind::Storage => {
                        self.push_statement(StatementKind::StorageDead(drop.local), drop.span)
                    }
                    DropKind::Value => {
                        let unwind = self.unwind_chain(scope_index, drop_index);
                        let target = self.new_block();
                        self.terminate(
                            TerminatorKind::Drop {
                                place: Place::from_local(drop.local),
                                target,
                                unwind,
                            },
                            drop.span,
                        )?;
                        self.current_block = target;
                    }
                }
            }
        }
        Ok(())
    }

    /// Cleanup edge for a terminator emitted at the current point: drops
    /// everything scheduled so far.
    pub(super) fn diverge_cleanup(&mut self) -> Option<BasicBlockId> {
        match self.scopes.depth() {
            0 => None,
            depth => {
                let innermost = depth - 1;
                let len = self.scopes.scopes[innermost].drops.len();
                self.unwind_chain(innermost, len)
            }
        }
    }

    /// Head of the cleanup chain dropping every value scheduled strictly
    /// before entry `drop_limit` of scope `scope_limit`. `None` when no
    /// such value exists.
    fn unwind_chain(&mut self, scope_limit: usize, drop_limit: usize) -> Option<BasicBlockId> {
        let mut head = None;
        for scope_index in 0..=scope_limit {
            let end = if scope_index == scope_limit {
                drop_limit
            } else {
                self.scopes.scopes[scope_index].drops.len()
            };
            for drop_index in 0..end {
                let drop = &self.scopes.scopes[scope_index].drops[drop_index];
                if drop.kind != DropKind::Value {
                    continue;
                }
                if let Some(cached) = drop.cached_unwind {
                    head = Some(cached);
                    continue;
                }
                let (local, span) = (drop.local, drop.span);
                let target = match head {
                    Some(head) => head,
                    None => self.resume_block(),
                };
                let block = self.new_cleanup_block();
                self.seal(
                    block,
                    TerminatorKind::Drop {
                        place: Place::from_local(local),
                        target,
                        unwind: None,
                    },
                    span,
                );
                self.scopes.scopes[scope_index].drops[drop_index].cached_unwind = Some(block);
                head = Some(block);
            }
        }
        head
    }
}
