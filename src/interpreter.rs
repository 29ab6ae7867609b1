// ABOUTME: Tree-walking evaluator driven by the resolver's side table

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Expr, ExprKind, NodeId, Stmt};
use crate::callable::{clock, Callable, LoxFunction};
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::token::TokenKind;
use crate::value::Value;

/// What a statement's execution produced besides its side effects. Propagated explicitly
/// rather than via unwinding so a single `Result`-returning match arm can both run a
/// statement and decide whether to keep going.
#[derive(Debug)]
pub enum Signal {
    None,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<NodeId, usize>,
    stdout: Box<dyn Write>,
}

impl Interpreter {
    pub fn new(locals: HashMap<NodeId, usize>) -> Self {
        Self::with_stdout(locals, Box::new(io::stdout()))
    }

    /// Same as `new`, but `print` writes to `stdout` instead of the process's real stdout —
    /// lets tests assert on the exact output of a program (spec.md §8's concrete scenarios).
    pub fn with_stdout(locals: HashMap<NodeId, usize>, stdout: Box<dyn Write>) -> Self {
        let globals = Environment::new_global();
        globals.define("clock", Value::Callable(Rc::new(clock())));
        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals,
            stdout,
        }
    }

    /// Merges in resolution distances from another compilation unit. Used by the REPL,
    /// where each line is lexed/parsed/resolved independently but evaluated against the
    /// same persistent interpreter so earlier declarations stay visible.
    pub fn extend_locals(&mut self, locals: HashMap<NodeId, usize>) {
        self.locals.extend(locals);
    }

    pub fn interpret(&mut self, program: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in program {
            self.execute(stmt)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Signal::None)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let _ = writeln!(self.stdout, "{value}");
                Ok(Signal::None)
            }
            Stmt::Var(name, initializer) => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(Signal::None)
            }
            Stmt::Block(stmts) => {
                let frame = Environment::with_parent(&self.environment);
                self.execute_block(stmts, frame)
            }
            Stmt::If(cond, then_branch, else_branch) => {
                if self.evaluate(cond)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::None)
                }
            }
            Stmt::While(cond, body) => {
                while self.evaluate(cond)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::None => {}
                        signal @ Signal::Return(_) => return Ok(signal),
                    }
                }
                Ok(Signal::None)
            }
            Stmt::For {
                init,
                cond,
                incr,
                body,
            } => self.execute_for(init, cond, incr, body),
            Stmt::Function(decl) => {
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment));
                self.environment
                    .define(&decl.name.lexeme, Value::Callable(Rc::new(function)));
                Ok(Signal::None)
            }
            Stmt::Return(_, value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }
            Stmt::Break(_) => Ok(Signal::Break),
            Stmt::Continue(_) => Ok(Signal::Continue),
        }
    }

    fn execute_for(
        &mut self,
        init: &Option<Box<Stmt>>,
        cond: &Option<Expr>,
        incr: &Option<Expr>,
        body: &Stmt,
    ) -> Result<Signal, RuntimeError> {
        let previous = Rc::clone(&self.environment);
        self.environment = Environment::with_parent(&previous);

        let result = (|| -> Result<Signal, RuntimeError> {
            if let Some(init) = init {
                self.execute(init)?;
            }
            loop {
                let keep_going = match cond {
                    Some(cond) => self.evaluate(cond)?.is_truthy(),
                    None => true,
                };
                if !keep_going {
                    break;
                }
                match self.execute(body)? {
                    Signal::Break => break,
                    signal @ Signal::Return(_) => return Ok(signal),
                    Signal::Continue | Signal::None => {}
                }
                if let Some(incr) = incr {
                    self.evaluate(incr)?;
                }
            }
            Ok(Signal::None)
        })();

        self.environment = previous;
        result
    }

    /// Runs `stmts` inside `frame`, restoring the caller's environment on every exit path —
    /// including an error or a propagating signal.
    pub fn execute_block(&mut self, stmts: &[Stmt], frame: Rc<Environment>) -> Result<Signal, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, frame);

        let mut result = Ok(Signal::None);
        for stmt in stmts {
            match self.execute(stmt) {
                Ok(Signal::None) => continue,
                Ok(signal) => {
                    result = Ok(signal);
                    break;
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(Value::from_literal(literal)),
            ExprKind::Grouping(inner) => self.evaluate(inner),
            ExprKind::Variable(name) => self.lookup_variable(expr.id, &name.lexeme, name.line),
            ExprKind::Assign(name, value_expr) => {
                let value = self.evaluate(value_expr)?;
                match self.locals.get(&expr.id) {
                    Some(&distance) => {
                        self.environment
                            .assign_at(distance, &name.lexeme, value.clone(), name.line)?;
                    }
                    None => self.globals.assign(&name.lexeme, value.clone(), name.line)?,
                }
                Ok(value)
            }
            ExprKind::Unary(op, right) => self.eval_unary(op.kind, self.evaluate(right)?, op.line),
            ExprKind::Binary(left, op, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.eval_binary(op.kind, left, right, op.line)
            }
            ExprKind::Logical(left, op, right) => {
                let left_value = self.evaluate(left)?;
                match op.kind {
                    TokenKind::Or if left_value.is_truthy() => Ok(left_value),
                    TokenKind::Or => self.evaluate(right),
                    TokenKind::And if !left_value.is_truthy() => Ok(left_value),
                    TokenKind::And => self.evaluate(right),
                    _ => unreachable!("logical expression must carry `and`/`or`"),
                }
            }
            ExprKind::Ternary(cond, then_e, else_e) => {
                if self.evaluate(cond)?.is_truthy() {
                    self.evaluate(then_e)
                } else {
                    self.evaluate(else_e)
                }
            }
            ExprKind::Call(callee, paren, args) => {
                let callee_value = self.evaluate(callee)?;
                let Value::Callable(callable) = callee_value else {
                    return Err(RuntimeError::NotCallable { line: paren.line });
                };
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate(arg)?);
                }
                self.call(callable, arg_values, paren.line)
            }
        }
    }

    fn lookup_variable(&self, id: NodeId, name: &str, line: usize) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => self.environment.get_at(distance, name, line),
            None => self.globals.get(name, line),
        }
    }

    fn call(&mut self, callable: Rc<dyn Callable>, args: Vec<Value>, line: usize) -> Result<Value, RuntimeError> {
        if args.len() != callable.arity() {
            return Err(RuntimeError::ArityMismatch {
                expected: callable.arity(),
                actual: args.len(),
                line,
            });
        }
        callable.call(self, args)
    }

    fn eval_unary(&self, op: TokenKind, right: Value, line: usize) -> Result<Value, RuntimeError> {
        match op {
            TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
            TokenKind::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::MustBeNumber { line }),
            },
            _ => unreachable!("unary expression must carry `!`/`-`"),
        }
    }

    fn eval_binary(&self, op: TokenKind, left: Value, right: Value, line: usize) -> Result<Value, RuntimeError> {
        match op {
            TokenKind::Plus => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(RuntimeError::MustBeNumbersOrStrings { line }),
            },
            TokenKind::Minus => numeric(left, right, line, |a, b| a - b),
            TokenKind::Star => numeric(left, right, line, |a, b| a * b),
            TokenKind::Slash => {
                let (a, b) = as_numbers(left, right, line)?;
                if b == 0.0 {
                    return Err(RuntimeError::DivisionByZero { line });
                }
                Ok(Value::Number(a / b))
            }
            TokenKind::StarStar => numeric(left, right, line, |a, b| a.powf(b)),
            TokenKind::Less => comparison(left, right, line, |a, b| a < b),
            TokenKind::LessEqual => comparison(left, right, line, |a, b| a <= b),
            TokenKind::Greater => comparison(left, right, line, |a, b| a > b),
            TokenKind::GreaterEqual => comparison(left, right, line, |a, b| a >= b),
            TokenKind::Amper => bitwise(left, right, line, |a, b| a & b),
            TokenKind::Bar => bitwise(left, right, line, |a, b| a | b),
            TokenKind::Caret => bitwise(left, right, line, |a, b| a ^ b),
            TokenKind::LessLess => bitwise(left, right, line, |a, b| a << b),
            TokenKind::GreaterGreater => bitwise(left, right, line, |a, b| a >> b),
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            _ => unreachable!("binary expression must carry a binary operator token"),
        }
    }
}

fn as_numbers(left: Value, right: Value, line: usize) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(RuntimeError::MustBeNumbers { line }),
    }
}

fn numeric(left: Value, right: Value, line: usize, f: impl Fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    let (a, b) = as_numbers(left, right, line)?;
    Ok(Value::Number(f(a, b)))
}

fn comparison(left: Value, right: Value, line: usize, f: impl Fn(f64, f64) -> bool) -> Result<Value, RuntimeError> {
    let (a, b) = as_numbers(left, right, line)?;
    Ok(Value::Bool(f(a, b)))
}

/// Bitwise operators truncate through `i64`; a fractional operand is a runtime error rather
/// than silently losing precision (spec.md §9's resolution of the int-vs-float ambiguity).
fn bitwise(left: Value, right: Value, line: usize, f: impl Fn(i64, i64) -> i64) -> Result<Value, RuntimeError> {
    let (a, b) = as_numbers(left, right, line)?;
    if a.fract() != 0.0 || b.fract() != 0.0 {
        return Err(RuntimeError::MustBeIntegral { line });
    }
    Ok(Value::Number(f(a as i64, b as i64) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    fn run(source: &str) -> Result<(), RuntimeError> {
        let (tokens, lex_errors) = scan(source);
        assert!(lex_errors.is_empty(), "{lex_errors:?}");
        let mut id_gen = crate::ast::NodeIdGen::new();
        let (program, parse_errors) = Parser::new(tokens, &mut id_gen).parse();
        assert!(parse_errors.is_empty(), "{parse_errors:?}");
        let mut resolver = Resolver::new();
        let (locals, resolve_errors) = resolver.resolve(&program);
        assert!(resolve_errors.is_empty(), "{resolve_errors:?}");
        Interpreter::new(locals).interpret(&program)
    }

    #[test]
    fn arithmetic_precedence() {
        assert!(run("print 1 + 2 * 3;").is_ok());
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        let err = run("print 1 / 0;").unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
    }

    #[test]
    fn bitwise_requires_integral_operands() {
        let err = run("print 1.5 & 2;").unwrap_err();
        assert!(matches!(err, RuntimeError::MustBeIntegral { .. }));
    }

    #[test]
    fn calling_non_callable_is_runtime_error() {
        let err = run("var x = 1; x();").unwrap_err();
        assert!(matches!(err, RuntimeError::NotCallable { .. }));
    }

    #[test]
    fn arity_mismatch_is_runtime_error() {
        let err = run("fun f(a) { return a; } f(1, 2);").unwrap_err();
        assert!(matches!(err, RuntimeError::ArityMismatch { .. }));
    }

    #[test]
    fn not_callable_is_checked_before_arguments_are_evaluated() {
        let err = run("var x = 1; x(1/0);").unwrap_err();
        assert!(matches!(err, RuntimeError::NotCallable { .. }));
    }
}
