// ABOUTME: Library module exposing internal components for testing

pub mod ast;
pub mod callable;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod value;

use std::collections::HashMap;

use ast::{NodeId, Stmt};
use error::Reporter;
use interpreter::Interpreter;

/// Exit codes per the CLI contract: 0 success, 65 static error, 70 runtime error.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_STATIC_ERROR: i32 = 65;
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Lexes, parses, and resolves `source`, reporting diagnostics as it goes. A later phase
/// never runs once an earlier one reports an error ("had-error suppresses the next phase").
///
/// `id_gen` is caller-owned rather than created fresh here: a REPL keeps one growing
/// generator across every line so node ids stay globally unique, even though each line is
/// compiled independently. Reusing ids across lines would let an older line's stored
/// resolver distance (kept alive by a closure captured into a global) collide with a newer
/// line's, silently corrupting `Interpreter::locals`.
pub fn compile(
    source: &str,
    reporter: &mut Reporter,
    id_gen: &mut ast::NodeIdGen,
) -> Option<(Vec<Stmt>, HashMap<NodeId, usize>)> {
    let (tokens, lex_errors) = lexer::scan(source);
    for err in &lex_errors {
        reporter.lex_error(err);
    }

    let (program, parse_errors) = parser::Parser::new(tokens, id_gen).parse();
    for err in &parse_errors {
        reporter.parse_error(err);
    }

    if reporter.had_error() {
        return None;
    }

    let (locals, resolve_errors) = resolver::Resolver::new().resolve(&program);
    for err in &resolve_errors {
        reporter.resolve_error(err);
    }

    if reporter.had_error() {
        return None;
    }

    Some((program, locals))
}

/// Runs a standalone program: compiles it and evaluates it with a fresh interpreter. Used
/// for script mode, where there is no later line to share state with.
pub fn run(source: &str, reporter: &mut Reporter) -> i32 {
    let mut id_gen = ast::NodeIdGen::new();
    let Some((program, locals)) = compile(source, reporter, &mut id_gen) else {
        return EXIT_STATIC_ERROR;
    };
    let mut interpreter = Interpreter::new(locals);
    match interpreter.interpret(&program) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            reporter.runtime_error(&err);
            EXIT_RUNTIME_ERROR
        }
    }
}

/// Runs one REPL line against a persistent interpreter: state (globals, declared functions)
/// is retained across lines, but a line that fails to compile aborts only that line.
///
/// `id_gen` must be the same generator across every call for a given REPL session (see
/// `compile`'s doc comment) — the caller owns it so it survives from one line to the next.
pub fn run_line(
    source: &str,
    reporter: &mut Reporter,
    interpreter: &mut Interpreter,
    id_gen: &mut ast::NodeIdGen,
) -> i32 {
    let Some((program, locals)) = compile(source, reporter, id_gen) else {
        return EXIT_STATIC_ERROR;
    };
    interpreter.extend_locals(locals);
    match interpreter.interpret(&program) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            reporter.runtime_error(&err);
            EXIT_RUNTIME_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_capturing_exit(source: &str) -> (i32, bool, bool) {
        let mut reporter = Reporter::new();
        let code = run(source, &mut reporter);
        (code, reporter.had_error(), reporter.had_runtime_error())
    }

    #[test]
    fn successful_program_exits_zero() {
        let (code, had_error, had_runtime_error) = run_capturing_exit("print 1 + 1;");
        assert_eq!(code, EXIT_SUCCESS);
        assert!(!had_error);
        assert!(!had_runtime_error);
    }

    #[test]
    fn resolve_error_exits_65() {
        let (code, had_error, _) = run_capturing_exit("{ var a = a; }");
        assert_eq!(code, EXIT_STATIC_ERROR);
        assert!(had_error);
    }

    #[test]
    fn runtime_error_exits_70() {
        let (code, _, had_runtime_error) = run_capturing_exit("print 1 / 0;");
        assert_eq!(code, EXIT_RUNTIME_ERROR);
        assert!(had_runtime_error);
    }
}
