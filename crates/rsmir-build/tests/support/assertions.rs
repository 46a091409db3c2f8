#![allow(dead_code)]
use std::collections::HashSet;

use rsmir_core::mir::{
    BasicBlockId, Body, ConstantKind, LocalId, Operand, Terminator, TerminatorKind, START_BLOCK,
};

/// Every block is terminated and every edge stays inside the body.
pub fn assert_well_formed(body: &Body) {
    let len = body.basic_blocks.len() as BasicBlockId;
    for (bb, block) in body.basic_blocks.iter().enumerate() {
        let terminator = block
            .terminator
            .as_ref()
            .unwrap_or_else(|| panic!("bb{bb} has no terminator"));
        for target in terminator.kind.successors() {
            assert!(target < len, "bb{bb} jumps to missing bb{target}");
        }
        if let Some(unwind) = terminator.kind.unwind() {
            assert!(
                body.block(unwind).is_cleanup,
                "bb{bb} unwinds into non-cleanup bb{unwind}"
            );
        }
    }
}

pub fn predecessors(body: &Body, target: BasicBlockId) -> Vec<BasicBlockId> {
    body.basic_blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| block.terminator().kind.successors().contains(&target))
        .map(|(bb, _)| bb as BasicBlockId)
        .collect()
}

/// Terminators met when following the non-unwinding edge from the start
/// block, up to the first branch or exit.
pub fn straight_line_terminators(body: &Body) -> Vec<&Terminator> {
    let mut seen = Vec::new();
    let mut visited = HashSet::new();
    let mut bb = START_BLOCK;
    while visited.insert(bb) {
        let terminator = body.block(bb).terminator();
        seen.push(terminator);
        let next = match &terminator.kind {
            TerminatorKind::Goto { target }
            | TerminatorKind::Drop { target, .. }
            | TerminatorKind::Assert { target, .. } => Some(*target),
            TerminatorKind::Call { target, .. } => *target,
            _ => None,
        };
        match next {
            Some(next) => bb = next,
            None => break,
        }
    }
    seen
}

/// Locals dropped on the normal path, in order.
pub fn normal_path_drops(body: &Body) -> Vec<LocalId> {
    straight_line_terminators(body)
        .into_iter()
        .filter_map(|terminator| match &terminator.kind {
            TerminatorKind::Drop { place, .. } => place.as_local(),
            _ => None,
        })
        .collect()
}

/// Names of the functions called on the normal path, in order.
pub fn normal_path_calls(body: &Body) -> Vec<String> {
    straight_line_terminators(body)
        .into_iter()
        .filter_map(|terminator| match &terminator.kind {
            TerminatorKind::Call { func, .. } => callee_name(func),
            _ => None,
        })
        .collect()
}

pub fn callee_name(func: &Operand) -> Option<String> {
    match func.as_constant().map(|constant| &constant.literal) {
        Some(ConstantKind::Fn(name)) => Some(name.to_string()),
        _ => None,
    }
}

pub fn local(body: &Body, name: &str) -> LocalId {
    body.local_named(name)
        .unwrap_or_else(|| panic!("no local for variable `{name}`"))
}

pub fn count_terminators(body: &Body, pred: impl Fn(&TerminatorKind) -> bool) -> usize {
    body.basic_blocks
        .iter()
        .filter(|block| pred(&block.terminator().kind))
        .count()
}
