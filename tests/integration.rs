// ABOUTME: Whole-program integration tests running source through the full pipeline

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use lox::error::Reporter;
use lox::interpreter::Interpreter;

/// A `Write` sink backed by a shared buffer, so a test can hand the interpreter ownership of
/// a `Box<dyn Write>` (which must be `'static`) while still holding on to a handle it can
/// read back from afterward.
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `source` end to end and returns what it printed, panicking if any phase reports an
/// error (tests that expect an error use `run_expect_static_error`/`run_expect_runtime_error`
/// instead).
fn run_ok(source: &str) -> String {
    let mut reporter = Reporter::new();
    let mut id_gen = lox::ast::NodeIdGen::new();
    let (program, locals) =
        lox::compile(source, &mut reporter, &mut id_gen).expect("expected compilation to succeed");
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_stdout(locals, Box::new(SharedBuffer(Rc::clone(&buffer))));
    interpreter.interpret(&program).expect("expected the program to run without a runtime error");
    let bytes = buffer.borrow().clone();
    String::from_utf8(bytes).unwrap()
}

fn run_expect_static_error(source: &str) {
    let mut reporter = Reporter::new();
    let mut id_gen = lox::ast::NodeIdGen::new();
    assert!(
        lox::compile(source, &mut reporter, &mut id_gen).is_none(),
        "expected a static error for: {source}"
    );
    assert!(reporter.had_error());
}

fn run_expect_runtime_error(source: &str) -> String {
    let mut reporter = Reporter::new();
    let mut id_gen = lox::ast::NodeIdGen::new();
    let (program, locals) =
        lox::compile(source, &mut reporter, &mut id_gen).expect("expected compilation to succeed");
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_stdout(locals, Box::new(SharedBuffer(Rc::clone(&buffer))));
    let err = interpreter.interpret(&program).expect_err("expected a runtime error");
    reporter.runtime_error(&err);
    assert!(reporter.had_runtime_error());
    let bytes = buffer.borrow().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn lexical_closure_counter() {
    let source = r#"
        fun makeCounter() {
            var i = 0;
            fun count() {
                i = i + 1;
                print i;
            }
            return count;
        }
        var c = makeCounter();
        c();
        c();
        c();
    "#;
    assert_eq!(run_ok(source), "1\n2\n3\n");
}

#[test]
fn block_shadowing() {
    let source = r#"
        var a = "global";
        {
            var a = "outer";
            {
                var a = "inner";
                print a;
            }
            print a;
        }
        print a;
    "#;
    assert_eq!(run_ok(source), "inner\nouter\nglobal\n");
}

#[test]
fn for_with_continue_runs_increment() {
    let source = "for (var i = 0; i < 5; i = i + 1) { if (i == 2) continue; print i; }";
    assert_eq!(run_ok(source), "0\n1\n3\n4\n");
}

#[test]
fn short_circuit_or_skips_evaluation() {
    assert_eq!(run_ok(r#"print nil or "hi";"#), "hi\n");
}

#[test]
fn short_circuit_and_skips_division_by_zero() {
    assert_eq!(run_ok("print false and (1/0);"), "false\n");
}

#[test]
fn unresolved_local_is_a_static_error() {
    run_expect_static_error("{ var a = a; }");
}

#[test]
fn two_closures_over_the_same_frame_see_reassignment() {
    let source = r#"
        fun makeShared() {
            var value = 1;
            fun read() { print value; }
            fun write(v) { value = v; }
            write(9);
            read();
        }
        makeShared();
    "#;
    assert_eq!(run_ok(source), "9\n");
}

#[test]
fn ternary_selects_one_branch_only() {
    assert_eq!(run_ok("print true ? 1 : 1/0;"), "1\n");
}

#[test]
fn bitwise_operators_truncate_integral_operands() {
    assert_eq!(run_ok("print 6 & 3;"), "2\n");
    assert_eq!(run_ok("print 1 << 4;"), "16\n");
}

#[test]
fn division_by_zero_reports_runtime_error() {
    let out = run_expect_runtime_error("print 1 / 0;");
    assert_eq!(out, "");
}

#[test]
fn repl_lines_share_one_node_id_generator() {
    // A closure declared on one line must keep resolving correctly after later lines are
    // compiled with their own, independently-numbered ASTs — the interpreter's `locals`
    // map is shared across lines, so node ids must never collide between them.
    let mut id_gen = lox::ast::NodeIdGen::new();
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::with_stdout(HashMap::new(), Box::new(SharedBuffer(Rc::clone(&buffer))));

    let lines = [
        r#"fun make() { var i = 0; fun inc() { i = i + 1; print i; } return inc; }"#,
        "var c = make();",
        "var a = 1;",
        "var b = 2;",
        "var d = 3;",
        "c();",
        "c();",
    ];
    for line in lines {
        let mut reporter = Reporter::new();
        let code = lox::run_line(line, &mut reporter, &mut interpreter, &mut id_gen);
        assert_eq!(code, lox::EXIT_SUCCESS, "line failed: {line}");
    }

    let out = String::from_utf8(buffer.borrow().clone()).unwrap();
    assert_eq!(out, "1\n2\n");
}

#[test]
fn break_exits_innermost_loop_only() {
    let source = r#"
        for (var i = 0; i < 3; i = i + 1) {
            for (var j = 0; j < 3; j = j + 1) {
                if (j == 1) break;
                print j;
            }
            print i;
        }
    "#;
    assert_eq!(run_ok(source), "0\n0\n0\n1\n0\n2\n");
}
