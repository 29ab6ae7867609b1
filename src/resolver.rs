// ABOUTME: Static pass computing variable resolution distances and scope diagnostics

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, NodeId, Stmt};
use crate::error::ResolveError;
use crate::token::Token;

#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
}

#[derive(Clone, Copy, PartialEq)]
enum LoopType {
    None,
    For,
    While,
}

/// Scope entries are `false` between *declared* and *defined* — used to forbid reading a
/// local name from within its own initializer.
type Scope = HashMap<String, bool>;

pub struct Resolver {
    scopes: Vec<Scope>,
    current_function: FunctionType,
    current_loop: LoopType,
    locals: HashMap<NodeId, usize>,
    errors: Vec<ResolveError>,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_loop: LoopType::None,
            locals: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn resolve(mut self, program: &[Stmt]) -> (HashMap<NodeId, usize>, Vec<ResolveError>) {
        self.resolve_stmts(program);
        (self.locals, self.errors)
    }

    fn resolve_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Var(name, initializer) => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::Block(stmts) => {
                self.begin_scope();
                self.resolve_stmts(stmts);
                self.end_scope();
            }
            Stmt::If(cond, then_branch, else_branch) => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While(cond, body) => {
                self.resolve_expr(cond);
                let enclosing_loop = self.current_loop;
                self.current_loop = LoopType::While;
                self.resolve_stmt(body);
                self.current_loop = enclosing_loop;
            }
            Stmt::For {
                init,
                cond,
                incr,
                body,
            } => {
                self.begin_scope();
                if let Some(init) = init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = cond {
                    self.resolve_expr(cond);
                }
                if let Some(incr) = incr {
                    self.resolve_expr(incr);
                }
                let enclosing_loop = self.current_loop;
                self.current_loop = LoopType::For;
                self.resolve_stmt(body);
                self.current_loop = enclosing_loop;
                self.end_scope();
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(&decl.params, &decl.body, FunctionType::Function);
            }
            Stmt::Return(keyword, value) => {
                if self.current_function == FunctionType::None {
                    self.errors.push(ResolveError::ReturnOutsideFunction { line: keyword.line });
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            Stmt::Break(keyword) => {
                if self.current_loop == LoopType::None {
                    self.errors.push(ResolveError::LoopControlOutsideLoop {
                        keyword: "break",
                        line: keyword.line,
                    });
                }
            }
            Stmt::Continue(keyword) => {
                if self.current_loop == LoopType::None {
                    self.errors.push(ResolveError::LoopControlOutsideLoop {
                        keyword: "continue",
                        line: keyword.line,
                    });
                }
            }
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Variable(name) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.errors.push(ResolveError::SelfReferentialInitializer { line: name.line });
                    }
                }
                self.resolve_local(expr.id, &name.lexeme);
            }
            ExprKind::Assign(name, value) => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, &name.lexeme);
            }
            ExprKind::Unary(_, right) => self.resolve_expr(right),
            ExprKind::Binary(left, _, right) | ExprKind::Logical(left, _, right) => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Grouping(inner) => self.resolve_expr(inner),
            ExprKind::Call(callee, _, args) => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Ternary(cond, then_e, else_e) => {
                self.resolve_expr(cond);
                self.resolve_expr(then_e);
                self.resolve_expr(else_e);
            }
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &str) {
        let depth = self.scopes.len();
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                self.locals.insert(id, depth - 1 - i);
                return;
            }
        }
        // Not found in any scope: resolves against globals at runtime.
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(ResolveError::DuplicateDeclaration { line: name.line });
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeIdGen;
    use crate::lexer::scan;
    use crate::parser::Parser;

    fn resolve(source: &str) -> Vec<ResolveError> {
        let (tokens, _) = scan(source);
        let mut id_gen = NodeIdGen::new();
        let (program, parse_errors) = Parser::new(tokens, &mut id_gen).parse();
        assert!(parse_errors.is_empty(), "{parse_errors:?}");
        let (_, errors) = Resolver::new().resolve(&program);
        errors
    }

    #[test]
    fn self_referential_initializer_errors() {
        let errors = resolve("{ var a = a; }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ResolveError::SelfReferentialInitializer { .. }));
    }

    #[test]
    fn duplicate_local_declaration_errors() {
        let errors = resolve("{ var a = 1; var a = 2; }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ResolveError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn shadowing_across_scopes_is_allowed() {
        let errors = resolve("var a = 1; { var a = 2; }");
        assert!(errors.is_empty());
    }

    #[test]
    fn return_outside_function_errors() {
        let errors = resolve("return 1;");
        assert!(matches!(errors[0], ResolveError::ReturnOutsideFunction { .. }));
    }

    #[test]
    fn break_outside_loop_errors() {
        let errors = resolve("break;");
        assert!(matches!(
            errors[0],
            ResolveError::LoopControlOutsideLoop { keyword: "break", .. }
        ));
    }

    #[test]
    fn continue_inside_for_is_allowed() {
        let errors = resolve("for (var i = 0; i < 1; i = i + 1) { continue; }");
        assert!(errors.is_empty());
    }

    #[test]
    fn resolves_distance_for_nested_closures() {
        let (tokens, _) = scan("fun f() { var x = 1; fun g() { return x; } return g; }");
        let mut id_gen = NodeIdGen::new();
        let (program, _) = Parser::new(tokens, &mut id_gen).parse();
        let (locals, errors) = Resolver::new().resolve(&program);
        assert!(errors.is_empty());
        assert!(locals.values().any(|&d| d == 1));
    }
}
