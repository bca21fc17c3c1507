//! Instruction-level tests for the bytecode compiler.

use crate::{
    compiler::{CompilerOptions, compile_class},
    constant_pool::{PoolEntry, Width},
    parser,
    test_utils::init_test_logging,
    vm::{CompiledMethod, ComparisonOp, Instruction},
};
use pretty_assertions::assert_eq;

use Instruction::*;

/// Compiles `source` and returns the method called `name`.
fn compile_method(source: &str, name: &str) -> CompiledMethod {
    let classes = parser::parse(source).unwrap();
    let options = CompilerOptions {
        parallel: false,
        ..CompilerOptions::default()
    };
    let class = compile_class(&classes[0], &options).unwrap();
    match class.methods.into_iter().find(|m| match m {
        Ok(m) => m.name == name,
        Err(e) => e.method == name,
    }) {
        Some(Ok(method)) => method,
        Some(Err(err)) => panic!("{} failed to compile: {}", name, err),
        None => panic!("no method {}", name),
    }
}

fn byte(value: i32) -> PoolEntry {
    PoolEntry {
        value,
        width: Width::Byte,
    }
}

const ARITHMETIC: &str = "
class ArithmeticMethods {
    int x = 69;
    int y = 420;
    int bigInt = 131072;

    int addX(int a) { return x + a; }
    int addY(int a) { return y + a; }

    int complexMath(int a, int b) {
        a = y * (a + b) / x;
        b = a + (-b);
        a = x + b * a;
        return x * a + bigInt;
    }
}";

const FIB: &str = "
class Fib {
    int rec(int n) {
        if (n < 2) {
            return n;
        } else {
            return rec(n - 1) + rec(n - 2);
        }
    }

    int iter(int n) {
        if (n < 2) {
            return n;
        }
        int x = 0;
        int y = 1;
        int i = 1;
        int next = 0;
        while (i < n) {
            next = y + x;
            x = y;
            y = next;
            i = i + 1;
        }
        return y;
    }
}";

#[test]
fn test_field_in_byte_range() {
    let method = compile_method(ARITHMETIC, "addX");
    assert_eq!(method.instructions, vec![LoadConstByte(0), LoadLocal(0), Add, Return]);
    assert_eq!(method.constants, vec![byte(69)]);
    assert_eq!(method.param_count, 1);
    assert_eq!(method.max_stack, 2);
    assert_eq!(method.max_locals, 1);
}

#[test]
fn test_field_in_short_range() {
    let method = compile_method(ARITHMETIC, "addY");
    assert_eq!(method.instructions, vec![LoadConstShort(0), LoadLocal(0), Add, Return]);
    assert_eq!(
        method.constants,
        vec![PoolEntry {
            value: 420,
            width: Width::Short
        }]
    );
}

#[test]
fn test_complex_math() {
    init_test_logging();
    let method = compile_method(ARITHMETIC, "complexMath");

    #[rustfmt::skip]
    let expected = vec![
        // a = y * (a + b) / x;
        LoadConstShort(0), LoadLocal(0), LoadLocal(1), Add, Mul, LoadConstByte(1), Div, StoreLocal(0),
        // b = a + (-b);
        LoadLocal(0), LoadLocal(1), Neg, Add, StoreLocal(1),
        // a = x + b * a;
        LoadConstByte(1), LoadLocal(1), LoadLocal(0), Mul, Add, StoreLocal(0),
        // return x * a + bigInt;
        LoadConstByte(1), LoadLocal(0), Mul, LoadConstInt(2), Add, Return,
    ];
    assert_eq!(method.instructions, expected);
    assert_eq!(
        method.constants.iter().map(|e| e.width).collect::<Vec<_>>(),
        vec![Width::Short, Width::Byte, Width::Int]
    );
    assert_eq!(method.max_stack, 3);
    assert_eq!(method.max_locals, 2);
}

#[test]
fn test_recursive_fib() {
    let method = compile_method(FIB, "rec");

    #[rustfmt::skip]
    let expected = vec![
        LoadLocal(0), LoadConstByte(0), IntCmp(ComparisonOp::Lt), JumpIfFalse(3),
        LoadLocal(0), Return,
        // No jump over the else: the then-branch returns.
        LoadLocal(0), LoadConstByte(1), Sub, Call(0),
        LoadLocal(0), LoadConstByte(0), Sub, Call(0),
        Add, Return,
    ];
    assert_eq!(method.instructions, expected);
    assert_eq!(method.constants, vec![byte(2), byte(1)]);
    assert_eq!(method.max_stack, 3);
    assert_eq!(method.max_locals, 1);
}

#[test]
fn test_iterative_fib() {
    let method = compile_method(FIB, "iter");

    #[rustfmt::skip]
    let expected = vec![
        LoadLocal(0), LoadConstByte(0), IntCmp(ComparisonOp::Lt), JumpIfFalse(3),
        LoadLocal(0), Return,
        LoadConstByte(1), StoreLocal(1),
        LoadConstByte(2), StoreLocal(2),
        LoadConstByte(2), StoreLocal(3),
        LoadConstByte(1), StoreLocal(4),
        // while (i < n)
        LoadLocal(3), LoadLocal(0), IntCmp(ComparisonOp::Lt), JumpIfFalse(14),
        LoadLocal(2), LoadLocal(1), Add, StoreLocal(4),
        LoadLocal(2), StoreLocal(1),
        LoadLocal(4), StoreLocal(2),
        LoadLocal(3), LoadConstByte(2), Add, StoreLocal(3),
        Jump(-16),
        LoadLocal(2), Return,
    ];
    assert_eq!(method.instructions, expected);
    assert_eq!(method.branch_targets(), vec![(3, 6), (17, 31), (30, 14)]);
    assert_eq!(method.constants, vec![byte(2), byte(0), byte(1)]);
    assert_eq!(method.max_stack, 2);
    assert_eq!(method.max_locals, 5);
}

#[test]
fn test_if_without_else() {
    let method = compile_method("class A { int f(int a) { if (a) a = 0; return a; } }", "f");
    assert_eq!(
        method.instructions,
        vec![
            LoadLocal(0),
            JumpIfFalse(3),
            LoadConstByte(0),
            StoreLocal(0),
            LoadLocal(0),
            Return
        ]
    );
}

#[test]
fn test_if_else_falls_through() {
    let method = compile_method(
        "class A { int f(int a) { if (a) a = 1; else a = 2; return a; } }",
        "f",
    );
    #[rustfmt::skip]
    let expected = vec![
        LoadLocal(0), JumpIfFalse(4),
        LoadConstByte(0), StoreLocal(0), Jump(3),
        LoadConstByte(1), StoreLocal(0),
        LoadLocal(0), Return,
    ];
    assert_eq!(method.instructions, expected);
    assert_eq!(method.branch_targets(), vec![(1, 5), (4, 7)]);
}

#[test]
fn test_or_condition_short_circuits() {
    let method = compile_method(
        "class A { int f(int a) { if (a < 0 || a > 10) return 1; return 0; } }",
        "f",
    );
    #[rustfmt::skip]
    let expected = vec![
        LoadLocal(0), LoadConstByte(0), IntCmp(ComparisonOp::Lt), JumpIfTrue(5),
        LoadLocal(0), LoadConstByte(1), IntCmp(ComparisonOp::Gt), JumpIfFalse(3),
        LoadConstByte(2), Return,
        LoadConstByte(0), Return,
    ];
    assert_eq!(method.instructions, expected);
}

#[test]
fn test_and_as_value() {
    let method = compile_method(
        "class A { int f(int a, int b) { return a > 0 && b > 0; } }",
        "f",
    );
    #[rustfmt::skip]
    let expected = vec![
        LoadLocal(0), LoadConstByte(0), IntCmp(ComparisonOp::Gt), JumpIfFalse(7),
        LoadLocal(1), LoadConstByte(0), IntCmp(ComparisonOp::Gt), JumpIfFalse(3),
        LoadConstByte(1), Jump(2),
        LoadConstByte(0),
        Return,
    ];
    assert_eq!(method.instructions, expected);
    assert_eq!(method.max_stack, 2);
}

#[test]
fn test_not_condition_flips_branch() {
    let method = compile_method(
        "class A { int f(int a) { while (!(a >= 10)) a = a + 1; return a; } }",
        "f",
    );
    #[rustfmt::skip]
    let expected = vec![
        LoadLocal(0), LoadConstByte(0), IntCmp(ComparisonOp::Ge), JumpIfTrue(6),
        LoadLocal(0), LoadConstByte(1), Add, StoreLocal(0),
        Jump(-8),
        LoadLocal(0), Return,
    ];
    assert_eq!(method.instructions, expected);
}

#[test]
fn test_chained_assignment_keeps_value() {
    let method = compile_method(
        "class A { int f(int a) { int b = 0; b = a = 5; return b; } }",
        "f",
    );
    #[rustfmt::skip]
    let expected = vec![
        LoadConstByte(0), StoreLocal(1),
        LoadConstByte(1), Dup, StoreLocal(0), StoreLocal(1),
        LoadLocal(1), Return,
    ];
    assert_eq!(method.instructions, expected);
    assert_eq!(method.max_stack, 2);
}

#[test]
fn test_call_statement_pops_result() {
    let method = compile_method(
        "class A { int g() { return 1; } int f() { g(); return 0; } }",
        "f",
    );
    assert_eq!(method.instructions, vec![Call(0), Pop, LoadConstByte(0), Return]);
    assert_eq!(method.max_stack, 1);
}

#[test]
fn test_call_arguments_left_to_right() {
    let method = compile_method(
        "class A { int g(int a, int b) { return a - b; } int f(int x) { return this.g(x, 7); } }",
        "f",
    );
    assert_eq!(
        method.instructions,
        vec![LoadLocal(0), LoadConstByte(0), Call(0), Return]
    );
    assert_eq!(method.max_stack, 2);
}

#[test]
fn test_sibling_blocks_reuse_slots() {
    let method = compile_method(
        "class A { int f() { { int a = 1; } { int b = 2; return b; } } }",
        "f",
    );
    #[rustfmt::skip]
    let expected = vec![
        LoadConstByte(0), StoreLocal(0),
        LoadConstByte(1), StoreLocal(0),
        LoadLocal(0), Return,
    ];
    assert_eq!(method.instructions, expected);
    assert_eq!(method.max_locals, 1);
}

#[test]
fn test_uninitialized_local_stores_zero() {
    let method = compile_method("class A { int f() { int a; return a; } }", "f");
    assert_eq!(
        method.instructions,
        vec![LoadConstByte(0), StoreLocal(0), LoadLocal(0), Return]
    );
    assert_eq!(method.constants, vec![byte(0)]);
}

#[test]
fn test_code_after_return_is_kept() {
    let method = compile_method("class A { int f() { return 1; return 2; } }", "f");
    assert_eq!(
        method.instructions,
        vec![LoadConstByte(0), Return, LoadConstByte(1), Return]
    );
}

#[test]
fn test_right_nested_stack_depth() {
    let method = compile_method("class A { int f() { return 1 + (2 + (3 + 4)); } }", "f");
    assert_eq!(method.max_stack, 4);
    assert_eq!(method.constants.len(), 4);
}

#[test]
fn test_duplicate_literals_share_entry() {
    let method = compile_method(
        "class A { int f(int a) { return a * 1000 + 1000 - 70000 + 70000; } }",
        "f",
    );
    assert_eq!(
        method.constants,
        vec![
            PoolEntry {
                value: 1000,
                width: Width::Short
            },
            PoolEntry {
                value: 70000,
                width: Width::Int
            },
        ]
    );
    #[rustfmt::skip]
    let expected = vec![
        LoadLocal(0), LoadConstShort(0), Mul, LoadConstShort(0), Add,
        LoadConstInt(1), Sub, LoadConstInt(1), Add, Return,
    ];
    assert_eq!(method.instructions, expected);
}

#[test]
fn test_negative_literal_widths() {
    let method = compile_method(
        "class A { int f() { return -128 + -129 + -32768 + -32769; } }",
        "f",
    );
    assert_eq!(
        method.constants.iter().map(|e| e.width).collect::<Vec<_>>(),
        vec![Width::Byte, Width::Short, Width::Short, Width::Int]
    );
}

#[test]
fn test_field_access_skips_locals() {
    let method = compile_method(
        "class A { int v = 3; int f(int v) { return this.v + v; } }",
        "f",
    );
    assert_eq!(method.instructions, vec![LoadConstByte(0), LoadLocal(0), Add, Return]);
    assert_eq!(method.constants, vec![byte(3)]);
}

#[test]
fn test_field_without_initializer_is_zero() {
    let method = compile_method("class A { int z; int f() { return z; } }", "f");
    assert_eq!(method.instructions, vec![LoadConstByte(0), Return]);
    assert_eq!(method.constants, vec![byte(0)]);
}

#[test]
fn test_many_constants_use_wide_indices() {
    let terms: Vec<String> = (0..300).map(|i| (1000 + i).to_string()).collect();
    let source = format!("class A {{ int f() {{ return {}; }} }}", terms.join(" + "));
    let method = compile_method(&source, "f");

    assert_eq!(method.constants.len(), 300);
    assert_eq!(method.instructions[0], LoadConstShort(0));
    assert_eq!(method.instructions[method.instructions.len() - 2], Add);
    assert!(method.instructions.contains(&LoadConstShort(299)));
    assert_eq!(method.max_stack, 2);
}
