use std::sync::Arc;

use pretty_assertions::assert_eq;
use rsmir_build::MirLowering;
use rsmir_core::cancel::CancellationSource;
use rsmir_core::config::{BuildConfig, Edition};
use rsmir_core::error::{ConstEvalError, Error};
use rsmir_core::mir::{
    self, pretty::body_to_string, pretty::program_to_string, AggregateKind, AssertMessage, BinOp,
    BorrowKind, ConstantKind, ImplicitSelfKind, LocalInfo, LocalKind, Operand, PlaceElem, Rvalue,
    StatementKind, TerminatorKind,
};
use rsmir_core::span::Span;
use rsmir_core::thir::{Program, ThirBuilder};
use rsmir_core::types::{AdtDef, AdtFlags, FieldDef, Mutability, Ty};

mod support;

use support::assertions::{
    assert_well_formed, count_terminators, local, normal_path_calls, normal_path_drops,
    predecessors,
};
use support::thir::{body, guard_ty, lower, lower_err, lower_with, option_def};

fn guard_call(thir: &mut ThirBuilder) -> rsmir_core::thir::Expr {
    thir.call("make_guard", Vec::new(), guard_ty())
}

#[test]
fn drops_locals_in_reverse_declaration_order() {
    let mut thir = ThirBuilder::new();
    let mut stmts = Vec::new();
    for name in ["a", "b", "c"] {
        let (pat, _) = thir.binding(name, guard_ty());
        let init = guard_call(&mut thir);
        stmts.push(thir.let_(pat, Some(init)));
    }
    let block = thir.block(stmts, None);
    let item = thir.function("f", Vec::new(), Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let f = body(&program, "f");
    assert_well_formed(f);
    assert_eq!(
        normal_path_drops(f),
        vec![local(f, "c"), local(f, "b"), local(f, "a")]
    );
    assert_eq!(
        count_terminators(f, |kind| matches!(kind, TerminatorKind::Resume)),
        1
    );
}

#[test]
fn calls_after_a_live_value_unwind_through_its_drop() {
    let mut thir = ThirBuilder::new();
    let (pat, _) = thir.binding("g", guard_ty());
    let init = guard_call(&mut thir);
    let let_g = thir.let_(pat, Some(init));
    let tick = thir.call("tick", Vec::new(), Ty::unit());
    let tick = thir.stmt(tick);
    let block = thir.block(vec![let_g, tick], None);
    let item = thir.function("f", Vec::new(), Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let f = body(&program, "f");
    let g = local(f, "g");
    let cleanups: Vec<_> = f
        .basic_blocks
        .iter()
        .filter_map(|block| match &block.terminator().kind {
            TerminatorKind::Call {
                func, cleanup, ..
            } => Some((support::assertions::callee_name(func), *cleanup)),
            _ => None,
        })
        .collect();
    assert_eq!(cleanups.len(), 2);
    // nothing to clean up before `g` exists
    assert_eq!(cleanups[0], (Some("make_guard".to_string()), None));
    let (_, Some(cleanup)) = &cleanups[1] else {
        panic!("`tick` has no unwind edge: {cleanups:?}");
    };
    let cleanup_block = f.block(*cleanup);
    assert!(cleanup_block.is_cleanup);
    match &cleanup_block.terminator().kind {
        TerminatorKind::Drop { place, target, .. } => {
            assert_eq!(place.as_local(), Some(g));
            assert_eq!(f.block(*target).terminator().kind, TerminatorKind::Resume);
        }
        other => panic!("expected cleanup drop, found {other:?}"),
    }
}

#[test]
fn evaluates_call_arguments_left_to_right() {
    let mut thir = ThirBuilder::new();
    let g = thir.call("g", Vec::new(), Ty::i32());
    let h = thir.call("h", Vec::new(), Ty::i32());
    let f = thir.call("f", vec![g, h], Ty::i32());
    let block = thir.block(Vec::new(), Some(f));
    let item = thir.function("caller", Vec::new(), Ty::i32(), block);
    let program = lower(&thir.program(vec![item]));

    let caller = body(&program, "caller");
    assert_well_formed(caller);
    assert_eq!(normal_path_calls(caller), vec!["g", "h", "f"]);
}

#[test]
fn binary_operands_are_evaluated_left_to_right() {
    let mut thir = ThirBuilder::new();
    let f = thir.call("f", Vec::new(), Ty::i32());
    let g = thir.call("g", Vec::new(), Ty::i32());
    let sum = thir.binary(BinOp::Add, f, g);
    let item = thir.function("sum", Vec::new(), Ty::i32(), sum);
    let program = lower(&thir.program(vec![item]));

    let sum = body(&program, "sum");
    assert_well_formed(sum);
    assert_eq!(normal_path_calls(sum), vec!["f", "g"]);
}

#[test]
fn const_initializers_fold_to_a_single_constant() {
    let mut thir = ThirBuilder::new();
    let one = thir.i32(1);
    let two = thir.i32(2);
    let three = thir.i32(3);
    let product = thir.binary(BinOp::Mul, two, three);
    let sum = thir.binary(BinOp::Add, one, product);
    let item = thir.const_item("SEVEN", Ty::i32(), sum);
    let program = lower(&thir.program(vec![item]));

    let seven = body(&program, "SEVEN");
    assert_eq!(seven.basic_blocks.len(), 1);
    let text = body_to_string(seven);
    assert!(text.contains("const SEVEN: i32 = {"), "{text}");
    assert!(text.contains("_0 = const 7_i32;"), "{text}");
}

#[test]
fn negative_literals_fold_outside_const_contexts() {
    let mut thir = ThirBuilder::new();
    let value = thir.i32(-5);
    let item = thir.function("neg", Vec::new(), Ty::i32(), value);
    let program = lower(&thir.program(vec![item]));

    let text = body_to_string(body(&program, "neg"));
    assert!(text.contains("_0 = const -5_i32;"), "{text}");
}

#[test]
fn if_else_switches_on_bool_and_joins_once() {
    let mut thir = ThirBuilder::new();
    let (param, c) = thir.param("c", Ty::bool());
    let cond = thir.var(c, Ty::bool());
    let one = thir.i32(1);
    let two = thir.i32(2);
    let if_expr = thir.if_(cond, one, Some(two));
    let block = thir.block(Vec::new(), Some(if_expr));
    let item = thir.function("pick", vec![param], Ty::i32(), block);
    let program = lower(&thir.program(vec![item]));

    let pick = body(&program, "pick");
    assert_well_formed(pick);
    let switch = pick.block(0).terminator();
    let TerminatorKind::SwitchInt {
        discr, switch_ty, ..
    } = &switch.kind
    else {
        panic!("expected switchInt, found {:?}", switch.kind);
    };
    assert_eq!(switch_ty, &Ty::bool());
    assert!(matches!(discr, Operand::Copy(place) if place.as_local() == Some(1)));

    let arms = switch.kind.successors();
    assert_eq!(arms.len(), 2);
    let joins: Vec<_> = arms
        .iter()
        .map(|bb| match pick.block(*bb).terminator().kind {
            TerminatorKind::Goto { target } => target,
            ref other => panic!("arm bb{bb} ends in {other:?}"),
        })
        .collect();
    assert_eq!(joins[0], joins[1]);
    assert_eq!(predecessors(pick, joins[0]).len(), 2);
}

#[test]
fn loop_with_immediate_break_has_no_back_edge() {
    let mut thir = ThirBuilder::new();
    let brk = thir.break_(None, None);
    let brk = thir.stmt(brk);
    let loop_body = thir.block(vec![brk], None);
    let lp = thir.loop_(loop_body, Ty::unit());
    let lp = thir.stmt(lp);
    let block = thir.block(vec![lp], None);
    let item = thir.function("main", Vec::new(), Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let main = body(&program, "main");
    assert_well_formed(main);
    let TerminatorKind::Goto { target: head } = main.block(0).terminator().kind else {
        panic!("entry block should jump to the loop head");
    };
    assert_eq!(predecessors(main, head), vec![0]);
    assert!(count_terminators(main, |kind| matches!(kind, TerminatorKind::Unreachable)) >= 1);
    assert_eq!(
        count_terminators(main, |kind| matches!(kind, TerminatorKind::Return)),
        1
    );
}

#[test]
fn break_drops_every_scope_it_leaves() {
    let mut thir = ThirBuilder::new();
    let (a_pat, _) = thir.binding("a", guard_ty());
    let init_a = guard_call(&mut thir);
    let let_a = thir.let_(a_pat, Some(init_a));
    let (b_pat, _) = thir.binding("b", guard_ty());
    let init_b = guard_call(&mut thir);
    let let_b = thir.let_(b_pat, Some(init_b));
    let brk = thir.break_(None, None);
    let brk = thir.stmt(brk);
    let inner = thir.block(vec![let_b, brk], None);
    let inner = thir.stmt(inner);
    let loop_body = thir.block(vec![let_a, inner], None);
    let lp = thir.loop_(loop_body, Ty::unit());
    let lp = thir.stmt(lp);
    let block = thir.block(vec![lp], None);
    let item = thir.function("leave", Vec::new(), Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let leave = body(&program, "leave");
    assert_well_formed(leave);
    let a = local(leave, "a");
    let b = local(leave, "b");
    assert_eq!(normal_path_calls(leave), vec!["make_guard", "make_guard"]);
    assert_eq!(normal_path_drops(leave), vec![b, a]);
}

#[test]
fn continue_jumps_back_to_the_loop_head() {
    let mut thir = ThirBuilder::new();
    let (param, c) = thir.param("c", Ty::bool());
    let cond = thir.var(c, Ty::bool());
    let cont = thir.continue_(Some("outer"));
    let cont = thir.stmt(cont);
    let then = thir.block(vec![cont], None);
    let if_expr = thir.if_(cond, then, None);
    let if_stmt = thir.stmt(if_expr);
    let brk = thir.break_(Some("outer"), None);
    let brk = thir.stmt(brk);
    let loop_body = thir.block(vec![if_stmt, brk], None);
    let lp = thir.labeled_loop("outer", loop_body, Ty::unit());
    let block = thir.block(Vec::new(), Some(lp));
    let item = thir.function("spin", vec![param], Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let spin = body(&program, "spin");
    assert_well_formed(spin);
    let TerminatorKind::Goto { target: head } = spin.block(0).terminator().kind else {
        panic!("entry block should jump to the loop head");
    };
    // entry plus the `continue`
    assert_eq!(predecessors(spin, head).len(), 2);
}

#[test]
fn labeled_block_breaks_carry_values() {
    let mut thir = ThirBuilder::new();
    let (param, c) = thir.param("c", Ty::bool());
    let cond = thir.var(c, Ty::bool());
    let one = thir.i32(1);
    let brk = thir.break_(Some("a"), Some(one));
    let brk = thir.stmt(brk);
    let then = thir.block(vec![brk], None);
    let if_expr = thir.if_(cond, then, None);
    let if_stmt = thir.stmt(if_expr);
    let two = thir.i32(2);
    let labeled = thir.labeled_block("a", vec![if_stmt], Some(two), Ty::i32());
    let (v_pat, v) = thir.binding("v", Ty::i32());
    let let_v = thir.let_(v_pat, Some(labeled));
    let tail = thir.var(v, Ty::i32());
    let block = thir.block(vec![let_v], Some(tail));
    let item = thir.function("pick", vec![param], Ty::i32(), block);
    let program = lower(&thir.program(vec![item]));

    let pick = body(&program, "pick");
    assert_well_formed(pick);
    let v = local(pick, "v");
    let writers: Vec<_> = pick
        .basic_blocks
        .iter()
        .filter(|block| {
            block.statements.iter().any(|stmt| {
                matches!(&stmt.kind, StatementKind::Assign(place, Rvalue::Use(Operand::Constant(_)))
                    if place.as_local() == Some(v))
            })
        })
        .collect();
    assert_eq!(writers.len(), 2);
    let exits: Vec<_> = writers
        .iter()
        .map(|block| block.terminator().kind.clone())
        .collect();
    assert!(matches!(exits[0], TerminatorKind::Goto { .. }));
    assert_eq!(exits[0], exits[1]);
}

#[test]
fn return_runs_pending_drops() {
    let mut thir = ThirBuilder::new();
    let (param, c) = thir.param("c", Ty::bool());
    let (g_pat, _) = thir.binding("g", guard_ty());
    let init = guard_call(&mut thir);
    let let_g = thir.let_(g_pat, Some(init));
    let cond = thir.var(c, Ty::bool());
    let one = thir.i32(1);
    let ret = thir.return_(Some(one));
    let ret = thir.stmt(ret);
    let then = thir.block(vec![ret], None);
    let if_expr = thir.if_(cond, then, None);
    let if_stmt = thir.stmt(if_expr);
    let two = thir.i32(2);
    let block = thir.block(vec![let_g, if_stmt], Some(two));
    let item = thir.function("early", vec![param], Ty::i32(), block);
    let program = lower(&thir.program(vec![item]));

    let early = body(&program, "early");
    assert_well_formed(early);
    let g = local(early, "g");
    let normal_drops_of_g = early
        .basic_blocks
        .iter()
        .filter(|block| !block.is_cleanup)
        .filter(|block| {
            matches!(&block.terminator().kind, TerminatorKind::Drop { place, .. }
                if place.as_local() == Some(g))
        })
        .count();
    assert_eq!(normal_drops_of_g, 2);
    assert_eq!(
        count_terminators(early, |kind| matches!(kind, TerminatorKind::Return)),
        1
    );
}

#[test]
fn reassignment_drops_the_old_value_first() {
    let mut thir = ThirBuilder::new();
    let (g_pat, g) = thir.binding_mut("g", guard_ty());
    let init = guard_call(&mut thir);
    let let_g = thir.let_(g_pat, Some(init));
    let lhs = thir.var(g, guard_ty());
    let rhs = guard_call(&mut thir);
    let assign = thir.assign(lhs, rhs);
    let assign = thir.stmt(assign);
    let block = thir.block(vec![let_g, assign], None);
    let item = thir.function("swap", Vec::new(), Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let swap = body(&program, "swap");
    assert_well_formed(swap);
    let g = local(swap, "g");
    assert_eq!(normal_path_drops(swap), vec![g, g]);
}

#[test]
fn moved_aggregate_operands_are_not_dropped_again() {
    let mut thir = ThirBuilder::new();
    let first = guard_call(&mut thir);
    let second = guard_call(&mut thir);
    let pair = thir.tuple(vec![first, second]);
    let (p_pat, _) = thir.binding("p", pair.ty.clone());
    let let_p = thir.let_(p_pat, Some(pair));
    let block = thir.block(vec![let_p], None);
    let item = thir.function("pair", Vec::new(), Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let pair = body(&program, "pair");
    assert_well_formed(pair);
    assert_eq!(normal_path_drops(pair), vec![local(pair, "p")]);
}

#[test]
fn struct_literals_store_fields_in_declaration_order() {
    let point = Arc::new(AdtDef::new_struct(
        7,
        "Point",
        vec![FieldDef::new("x", Ty::i32()), FieldDef::new("y", Ty::i32())],
        AdtFlags {
            is_copy: true,
            has_dtor: false,
        },
    ));
    let mut thir = ThirBuilder::new();
    let y = thir.i32(2);
    let x = thir.i32(1);
    let literal = thir.adt(point.clone(), 0, vec![(1, y), (0, x)]);
    let item = thir.function("origin", Vec::new(), Ty::adt(point), literal);
    let program = lower(&thir.program(vec![item]));

    let text = body_to_string(body(&program, "origin"));
    assert!(
        text.contains("_0 = Point { x: const 1_i32, y: const 2_i32 };"),
        "{text}"
    );
}

#[test]
fn while_loops_are_unsupported() {
    let mut thir = ThirBuilder::new();
    let cond = thir.bool(true);
    let while_body = thir.block(Vec::new(), None);
    let while_expr = thir.while_(cond, while_body);
    let stmt = thir.stmt(while_expr);
    let block = thir.block(vec![stmt], None);
    let item = thir.function("spin", Vec::new(), Ty::unit(), block);

    match lower_err(&thir.program(vec![item])) {
        Error::Unsupported { construct, .. } => assert!(construct.contains("while")),
        other => panic!("expected unsupported construct, found {other:?}"),
    }
}

#[test]
fn overloaded_deref_is_unsupported() {
    let mut thir = ThirBuilder::new();
    let (param, p) = thir.param("p", guard_ty());
    let arg = thir.var(p, guard_ty());
    let deref = thir.overloaded_deref(arg, "Guard::deref", Ty::i32());
    let item = thir.function("read", vec![param], Ty::i32(), deref);

    match lower_err(&thir.program(vec![item])) {
        Error::Unsupported { construct, .. } => {
            assert_eq!(construct, "overloaded dereference")
        }
        other => panic!("expected unsupported construct, found {other:?}"),
    }
}

#[test]
fn const_division_by_zero_is_reported() {
    let mut thir = ThirBuilder::new();
    let one = thir.i32(1);
    let zero = thir.i32(0);
    let div = thir.binary(BinOp::Div, one, zero);
    let item = thir.const_item("BAD", Ty::i32(), div);

    match lower_err(&thir.program(vec![item])) {
        Error::ConstEval { error, .. } => assert_eq!(error, ConstEvalError::DivisionByZero),
        other => panic!("expected const evaluation failure, found {other:?}"),
    }
}

#[test]
fn const_overflow_is_reported() {
    let mut thir = ThirBuilder::new();
    let max = thir.int(255, Ty::u8());
    let one = thir.int(1, Ty::u8());
    let sum = thir.binary(BinOp::Add, max, one);
    let item = thir.static_item("WRAP", Ty::u8(), Mutability::Not, sum);

    match lower_err(&thir.program(vec![item])) {
        Error::ConstEval { error, .. } => {
            assert_eq!(error, ConstEvalError::Overflow { op: BinOp::Add })
        }
        other => panic!("expected const evaluation failure, found {other:?}"),
    }
}

fn add_params(thir: &mut ThirBuilder) -> Program {
    let (x_param, x) = thir.param("x", Ty::i32());
    let (y_param, y) = thir.param("y", Ty::i32());
    let lhs = thir.var(x, Ty::i32());
    let rhs = thir.var(y, Ty::i32());
    let sum = thir.binary(BinOp::Add, lhs, rhs);
    let item = thir.function("add", vec![x_param, y_param], Ty::i32(), sum);
    thir.program(vec![item])
}

#[test]
fn checked_addition_asserts_no_overflow() {
    let mut thir = ThirBuilder::new();
    let program = lower(&add_params(&mut thir));

    let add = body(&program, "add");
    assert_well_formed(add);
    assert!(add.block(0).statements.iter().any(|stmt| matches!(
        &stmt.kind,
        StatementKind::Assign(_, Rvalue::CheckedBinaryOp(BinOp::Add, _, _))
    )));
    match &add.block(0).terminator().kind {
        TerminatorKind::Assert {
            cond: Operand::Move(flag),
            expected: false,
            msg: AssertMessage::Overflow(BinOp::Add, _, _),
            ..
        } => assert_eq!(flag.projection, vec![PlaceElem::Field(1, Ty::bool())]),
        other => panic!("expected overflow assert, found {other:?}"),
    }
}

#[test]
fn unchecked_addition_without_overflow_checks() {
    let mut thir = ThirBuilder::new();
    let config = BuildConfig::default().with_overflow_checks(false);
    let program = lower_with(config, &add_params(&mut thir));

    let add = body(&program, "add");
    assert_eq!(add.basic_blocks.len(), 1);
    let text = body_to_string(add);
    assert!(text.contains("_0 = Add(copy _1, copy _2);"), "{text}");
}

#[test]
fn division_always_checks_the_divisor() {
    let mut thir = ThirBuilder::new();
    let (x_param, x) = thir.param("x", Ty::i32());
    let (y_param, y) = thir.param("y", Ty::i32());
    let lhs = thir.var(x, Ty::i32());
    let rhs = thir.var(y, Ty::i32());
    let quotient = thir.binary(BinOp::Div, lhs, rhs);
    let item = thir.function("div", vec![x_param, y_param], Ty::i32(), quotient);
    let config = BuildConfig::default().with_overflow_checks(false);
    let program = lower_with(config, &thir.program(vec![item]));

    let div = body(&program, "div");
    assert_well_formed(div);
    let messages: Vec<_> = div
        .basic_blocks
        .iter()
        .filter_map(|block| match &block.terminator().kind {
            TerminatorKind::Assert { msg, .. } => Some(msg.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[0], AssertMessage::DivisionByZero(_)));
    assert!(matches!(messages[1], AssertMessage::Overflow(BinOp::Div, _, _)));
}

#[test]
fn indexing_emits_bounds_check_before_access() {
    let mut thir = ThirBuilder::new();
    let array_ty = Ty::array(Ty::i32(), 3);
    let (a_param, a) = thir.param("a", array_ty.clone());
    let (i_param, i) = thir.param("i", Ty::usize());
    let base = thir.var(a, array_ty);
    let index = thir.var(i, Ty::usize());
    let element = thir.index(base, index);
    let item = thir.function("get", vec![a_param, i_param], Ty::i32(), element);
    let program = lower(&thir.program(vec![item]));

    let get = body(&program, "get");
    assert_well_formed(get);
    assert!(get
        .block(0)
        .statements
        .iter()
        .any(|stmt| matches!(&stmt.kind, StatementKind::Assign(_, Rvalue::Len(place)) if place.as_local() == Some(1))));
    let TerminatorKind::Assert {
        expected: true,
        msg: AssertMessage::BoundsCheck { .. },
        target,
        ..
    } = get.block(0).terminator().kind
    else {
        panic!("expected bounds check, found {:?}", get.block(0).terminator().kind);
    };
    let read = &get.block(target).statements[0];
    match &read.kind {
        StatementKind::Assign(dest, Rvalue::Use(Operand::Copy(place))) => {
            assert_eq!(dest.as_local(), Some(0));
            assert!(matches!(place.projection.as_slice(), [PlaceElem::Index(_)]));
        }
        other => panic!("expected element read, found {other:?}"),
    }
}

fn tail_temporary_program(thir: &mut ThirBuilder) -> Program {
    let (s_pat, _) = thir.binding("s", guard_ty());
    let init = guard_call(thir);
    let let_s = thir.let_(s_pat, Some(init));
    let temp = guard_call(thir);
    let borrowed = thir.borrow(BorrowKind::Shared, temp);
    let tail = thir.call("peek", vec![borrowed], Ty::i32());
    let block = thir.block(vec![let_s], Some(tail));
    let item = thir.function("tail", Vec::new(), Ty::i32(), block);
    thir.program(vec![item])
}

#[test]
fn tail_temporaries_outlive_locals_before_2024() {
    let mut thir = ThirBuilder::new();
    let config = BuildConfig::default().with_edition(Edition::E2021);
    let program = lower_with(config, &tail_temporary_program(&mut thir));

    let tail = body(&program, "tail");
    assert_well_formed(tail);
    let drops = normal_path_drops(tail);
    assert_eq!(drops.len(), 2);
    assert_eq!(drops[0], local(tail, "s"));
}

#[test]
fn tail_temporaries_drop_first_in_2024() {
    let mut thir = ThirBuilder::new();
    let config = BuildConfig::default().with_edition(Edition::E2024);
    let program = lower_with(config, &tail_temporary_program(&mut thir));

    let tail = body(&program, "tail");
    assert_well_formed(tail);
    let drops = normal_path_drops(tail);
    assert_eq!(drops.len(), 2);
    assert_eq!(drops[1], local(tail, "s"));
}

#[test]
fn borrowed_let_initializers_live_as_long_as_the_binding() {
    let mut thir = ThirBuilder::new();
    let temp = guard_call(&mut thir);
    let borrowed = thir.borrow(BorrowKind::Shared, temp);
    let (r_pat, _) = thir.binding("r", borrowed.ty.clone());
    let let_r = thir.let_(r_pat, Some(borrowed));
    let tick = thir.call("tick", Vec::new(), Ty::unit());
    let tick = thir.stmt(tick);
    let block = thir.block(vec![let_r, tick], None);
    let item = thir.function("extend", Vec::new(), Ty::unit(), block);
    let program = lower(&thir.program(vec![item]));

    let extend = body(&program, "extend");
    assert_well_formed(extend);
    // the guard is still alive while `tick` runs
    assert_eq!(normal_path_calls(extend), vec!["make_guard", "tick"]);
    let terminators = support::assertions::straight_line_terminators(extend);
    let tick_at = terminators
        .iter()
        .position(|t| matches!(&t.kind, TerminatorKind::Call { .. }) && t.kind.unwind().is_some())
        .expect("`tick` unwinds through the guard");
    let drop_at = terminators
        .iter()
        .position(|t| matches!(t.kind, TerminatorKind::Drop { .. }))
        .expect("guard is dropped");
    assert!(tick_at < drop_at);
}

#[test]
fn matches_switch_on_enum_discriminants() {
    let option = option_def(Ty::i32());
    let option_ty = Ty::adt(option.clone());
    let mut thir = ThirBuilder::new();
    let (param, o) = thir.param("o", option_ty.clone());
    let scrutinee = thir.var(o, option_ty);
    let (x_pat, x) = thir.binding("x", Ty::i32());
    let some_pat = thir.variant_pat(option.clone(), 1, vec![x_pat]);
    let x_value = thir.var(x, Ty::i32());
    let some_arm = thir.arm(some_pat, None, x_value);
    let none_pat = thir.variant_pat(option.clone(), 0, Vec::new());
    let zero = thir.i32(0);
    let none_arm = thir.arm(none_pat, None, zero);
    let match_expr = thir.match_(scrutinee, vec![some_arm, none_arm], Ty::i32());
    let item = thir.function("unwrap_or_zero", vec![param], Ty::i32(), match_expr);
    let program = lower(&thir.program(vec![item]));

    let f = body(&program, "unwrap_or_zero");
    assert_well_formed(f);
    let switches: Vec<_> = f
        .basic_blocks
        .iter()
        .filter_map(|block| match &block.terminator().kind {
            TerminatorKind::SwitchInt {
                switch_ty, targets, ..
            } => Some((switch_ty.clone(), targets.iter().map(|(value, _)| value).collect::<Vec<_>>())),
            _ => None,
        })
        .collect();
    let discr_ty = option.discriminant_ty();
    assert_eq!(
        switches,
        vec![(discr_ty.clone(), vec![1]), (discr_ty, vec![0])]
    );
    let text = body_to_string(f);
    assert!(text.contains("discriminant(_1)"), "{text}");
    assert!(text.contains("((_1 as Some).0: i32)"), "{text}");
    assert!(f.local_named("x").is_some());
}

#[test]
fn failed_guards_fall_through_to_the_next_arm() {
    let mut thir = ThirBuilder::new();
    let (param, v) = thir.param("v", Ty::i32());
    let scrutinee = thir.var(v, Ty::i32());
    let (n_pat, n) = thir.binding("n", Ty::i32());
    let n_value = thir.var(n, Ty::i32());
    let zero = thir.i32(0);
    let guard = thir.binary(BinOp::Gt, n_value, zero);
    let one = thir.i32(1);
    let positive = thir.arm(n_pat, Some(guard), one);
    let wild = thir.wild(Ty::i32());
    let other = thir.i32(0);
    let rest = thir.arm(wild, None, other);
    let match_expr = thir.match_(scrutinee, vec![positive, rest], Ty::i32());
    let item = thir.function("sign", vec![param], Ty::i32(), match_expr);
    let program = lower(&thir.program(vec![item]));

    let sign = body(&program, "sign");
    assert_well_formed(sign);
    assert_eq!(
        count_terminators(sign, |kind| matches!(kind, TerminatorKind::SwitchInt { .. })),
        1
    );
    let text = body_to_string(sign);
    assert!(text.contains("_0 = const 1_i32;"), "{text}");
    assert!(text.contains("_0 = const 0_i32;"), "{text}");
}

#[test]
fn guarded_arms_move_the_scrutinee_only_after_the_guard() {
    let mut thir = ThirBuilder::new();
    let (param, g) = thir.param("g", guard_ty());
    let scrutinee = thir.var(g, guard_ty());
    let (x_pat, x) = thir.binding("x", guard_ty());
    let x_value = thir.var(x, guard_ty());
    let id = thir.field(x_value, 0);
    let guard = thir.call("check", vec![id], Ty::bool());
    let one = thir.i32(1);
    let first = thir.arm(x_pat, Some(guard), one);
    let (y_pat, _) = thir.binding("y", guard_ty());
    let two = thir.i32(2);
    let second = thir.arm(y_pat, None, two);
    let match_expr = thir.match_(scrutinee, vec![first, second], Ty::i32());
    let item = thir.function("pick", vec![param], Ty::i32(), match_expr);
    let program = lower(&thir.program(vec![item]));

    let pick = body(&program, "pick");
    assert_well_formed(pick);
    let x = local(pick, "x");
    let y = local(pick, "y");

    // the guard reads `x` through a borrow, nothing is moved before it
    assert_eq!(normal_path_calls(pick), vec!["check"]);
    let entry = &pick.block(0).statements;
    assert!(entry.iter().any(|stmt| matches!(&stmt.kind,
        StatementKind::Assign(_, Rvalue::Ref(BorrowKind::Shared, place)) if place.as_local() == Some(1))));
    let text = body_to_string(pick);
    assert!(text.contains("check(copy ((*_"), "{text}");

    let mut moves_of_g: Vec<_> = pick
        .basic_blocks
        .iter()
        .flat_map(|block| block.statements.iter())
        .filter_map(|stmt| match &stmt.kind {
            StatementKind::Assign(dest, Rvalue::Use(Operand::Move(src))) if src.as_local() == Some(1) => {
                dest.as_local()
            }
            _ => None,
        })
        .collect();
    moves_of_g.sort();
    assert_eq!(moves_of_g, vec![x, y]);

    let drops_of = |target| {
        count_terminators(pick, |kind| {
            matches!(kind, TerminatorKind::Drop { place, .. } if place.as_local() == Some(target))
        })
    };
    assert_eq!(drops_of(x), 1);
    assert_eq!(drops_of(y), 1);
}

#[test]
fn methods_get_self_arguments_and_qualified_paths() {
    let counter = Arc::new(AdtDef::new_struct(
        3,
        "Counter",
        vec![FieldDef::new("count", Ty::i32())],
        AdtFlags {
            is_copy: true,
            has_dtor: false,
        },
    ));
    let counter_ty = Ty::adt(counter);
    let self_ty = Ty::reference(counter_ty.clone(), Mutability::Not);
    let mut thir = ThirBuilder::new();
    let (self_param, this) = thir.self_param(ImplicitSelfKind::ImmRef, self_ty.clone());
    let this = thir.var(this, self_ty);
    let target = thir.deref(this);
    let count = thir.field(target, 0);
    let get = thir.method("get", vec![self_param], Ty::i32(), count);
    let item = thir.impl_block(counter_ty, vec![get]);
    let program = lower(&thir.program(vec![item]));

    let mir::ItemKind::Function(function) = &program.items[0].kind else {
        panic!("expected a function item");
    };
    assert_eq!(function.path.to_string(), "Counter::get");
    let get = body(&program, "Counter::get");
    assert_eq!(get.arg_count, 1);
    assert_eq!(
        get.local_decl(1).local_info,
        LocalInfo::SelfArg(ImplicitSelfKind::ImmRef)
    );
    assert_eq!(get.local_kind(0), LocalKind::ReturnPointer);
    assert_eq!(get.local_kind(1), LocalKind::Arg);
    let text = body_to_string(get);
    assert!(text.contains("fn Counter::get(_1: &Counter) -> i32 {"), "{text}");
    assert!(text.contains("_0 = copy ((*_1).0: i32);"), "{text}");
}

#[test]
fn error_tolerance_skips_failing_items() {
    let mut thir = ThirBuilder::new();
    let while_span = Span::new(0, 12, 40);
    thir.set_span(while_span);
    let cond = thir.bool(true);
    let while_body = thir.block(Vec::new(), None);
    let while_expr = thir.while_(cond, while_body);
    thir.set_span(Span::DUMMY);
    let broken = thir.function("broken", Vec::new(), Ty::unit(), while_expr);
    let value = thir.i32(3);
    let fine = thir.function("fine", Vec::new(), Ty::i32(), value);
    let program = thir.program(vec![broken, fine]);

    let mut lowering = MirLowering::with_config(BuildConfig::default().with_error_tolerance(true));
    let mir_program = lowering
        .transform(&program)
        .expect("tolerant lowering should succeed");
    let (diagnostics, has_errors) = lowering.take_diagnostics();

    assert!(has_errors);
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("`broken`"));
    assert_eq!(diagnostics[0].span, Some(while_span));
    assert_eq!(mir_program.items.len(), 1);
    assert!(mir_program.body_of("fine").is_some());
    assert!(mir_program.body_of("broken").is_none());
}

#[test]
fn cancellation_interrupts_the_build() {
    let mut thir = ThirBuilder::new();
    let program = add_params(&mut thir);
    let source = CancellationSource::new();
    source.cancel();

    let mut lowering = MirLowering::new().with_cancellation(source.token());
    lowering.set_error_tolerance(true);
    let err = lowering
        .transform(&program)
        .expect_err("cancelled build must fail");
    assert!(matches!(err, Error::Interrupted));
}

#[test]
fn lowering_is_deterministic_across_threads() {
    let mut thir = ThirBuilder::new();
    let program = tail_temporary_program(&mut thir);
    let expected = program_to_string(&lower(&program));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let program = program.clone();
            std::thread::spawn(move || {
                let mir_program = MirLowering::new()
                    .transform(&program)
                    .expect("lowering should succeed");
                program_to_string(&mir_program)
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("lowering thread panicked"), expected);
    }
}

#[test]
#[should_panic(expected = "`break` outside of a loop")]
fn break_outside_a_loop_is_a_builder_bug() {
    let mut thir = ThirBuilder::new();
    let brk = thir.break_(None, None);
    let brk = thir.stmt(brk);
    let block = thir.block(vec![brk], None);
    let item = thir.function("lost", Vec::new(), Ty::unit(), block);
    let _ = MirLowering::new().transform(&thir.program(vec![item]));
}

#[test]
fn string_literals_become_str_constants() {
    let mut thir = ThirBuilder::new();
    let text = thir.str("hi\n");
    let ty = text.ty.clone();
    let item = thir.function("greeting", Vec::new(), ty, text);
    let program = lower(&thir.program(vec![item]));

    let greeting = body(&program, "greeting");
    match &greeting.block(0).statements[0].kind {
        StatementKind::Assign(_, Rvalue::Use(Operand::Constant(constant))) => {
            assert_eq!(constant.literal, ConstantKind::Str("hi\n".to_string()))
        }
        other => panic!("expected string constant, found {other:?}"),
    }
}

#[test]
fn array_literals_build_array_aggregates() {
    let mut thir = ThirBuilder::new();
    let one = thir.i32(1);
    let two = thir.i32(2);
    let array = thir.array(Ty::i32(), vec![one, two]);
    let ty = array.ty.clone();
    let item = thir.function("pair", Vec::new(), ty, array);
    let program = lower(&thir.program(vec![item]));

    match &body(&program, "pair").block(0).statements[0].kind {
        StatementKind::Assign(_, Rvalue::Aggregate(kind, operands)) => {
            assert_eq!(**kind, AggregateKind::Array(Ty::i32()));
            assert_eq!(operands.len(), 2);
        }
        other => panic!("expected array aggregate, found {other:?}"),
    }
}
