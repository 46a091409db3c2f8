use pretty_assertions::assert_eq;
use rsmir_core::mir::pretty::{body_to_string, program_to_string};
use rsmir_core::mir::BinOp;
use rsmir_core::thir::ThirBuilder;
use rsmir_core::types::Ty;

mod support;

use support::thir::{body, lower};

#[test]
fn prints_a_constant_function() {
    let mut thir = ThirBuilder::new();
    let value = thir.i32(42);
    let item = thir.function("answer", Vec::new(), Ty::i32(), value);
    let program = lower(&thir.program(vec![item]));

    let expected = "\
fn answer() -> i32 {
    let mut _0: i32;

    bb0: {
        _0 = const 42_i32;
        return;
    }
}
";
    assert_eq!(body_to_string(body(&program, "answer")), expected);
}

#[test]
fn prints_checked_arithmetic() {
    let mut thir = ThirBuilder::new();
    let (x_param, x) = thir.param("x", Ty::i32());
    let (y_param, y) = thir.param("y", Ty::i32());
    let lhs = thir.var(x, Ty::i32());
    let rhs = thir.var(y, Ty::i32());
    let sum = thir.binary(BinOp::Add, lhs, rhs);
    let item = thir.function("add", vec![x_param, y_param], Ty::i32(), sum);
    let program = lower(&thir.program(vec![item]));

    let expected = "\
fn add(_1: i32, _2: i32) -> i32 {
    debug x => _1;
    debug y => _2;
    let mut _0: i32;
    let mut _3: (i32, bool);

    bb0: {
        _3 = AddWithOverflow(copy _1, copy _2);
        assert(!move (_3.1: bool), \"attempt to compute `{} + {}`, which would overflow\", copy _1, copy _2) -> [success: bb1];
    }

    bb1: {
        _0 = move (_3.0: i32);
        return;
    }
}
";
    assert_eq!(body_to_string(body(&program, "add")), expected);
}

#[test]
fn program_dump_separates_bodies() {
    let mut thir = ThirBuilder::new();
    let one = thir.i32(1);
    let first = thir.function("one", Vec::new(), Ty::i32(), one);
    let two = thir.i32(2);
    let second = thir.const_item("TWO", Ty::i32(), two);
    let program = lower(&thir.program(vec![first, second]));

    let text = program_to_string(&program);
    let one_at = text.find("fn one() -> i32 {").expect("`one` is printed");
    let two_at = text.find("const TWO: i32 = {").expect("`TWO` is printed");
    assert!(one_at < two_at);
    assert!(text.contains("}\n\nconst TWO"), "{text}");
}
