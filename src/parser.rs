// ABOUTME: Recursive-descent parser turning tokens into statements with panic-mode recovery

use std::rc::Rc;

use crate::ast::{Expr, ExprKind, FunctionDecl, LiteralValue, NodeIdGen, Stmt};
use crate::error::ParseError;
use crate::token::{Literal, Token, TokenKind};

const MAX_PARAMS: usize = 255;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    id_gen: &'a mut NodeIdGen,
    errors: Vec<ParseError>,
}

type ExprResult = Result<Expr, ParseError>;
type StmtResult = Result<Stmt, ParseError>;

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, id_gen: &'a mut NodeIdGen) -> Self {
        Parser {
            tokens,
            current: 0,
            id_gen,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        (statements, self.errors)
    }

    // --- token stream primitives ---

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(ParseError::Expected {
                message: message.to_string(),
                line: self.peek().line,
            })
        }
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn next_id(&mut self) -> u64 {
        self.id_gen.next()
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        let id = self.next_id();
        Expr::new(id, kind)
    }

    // --- declarations ---

    fn declaration(&mut self) -> StmtResult {
        if self.match_any(&[TokenKind::Fun]) {
            self.fun_decl()
        } else if self.match_any(&[TokenKind::Var]) {
            self.var_decl()
        } else {
            self.statement()
        }
    }

    fn fun_decl(&mut self) -> StmtResult {
        let name = self.consume(TokenKind::Identifier, "Expect function name.")?;
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    self.errors.push(ParseError::TooMany {
                        kind: "parameters",
                        line: self.peek().line,
                    });
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_any(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        let body = self.block()?;
        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn var_decl(&mut self) -> StmtResult {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.match_any(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var(name, initializer))
    }

    // --- statements ---

    fn statement(&mut self) -> StmtResult {
        if self.match_any(&[TokenKind::Print]) {
            self.print_stmt()
        } else if self.match_any(&[TokenKind::If]) {
            self.if_stmt()
        } else if self.match_any(&[TokenKind::While]) {
            self.while_stmt()
        } else if self.match_any(&[TokenKind::For]) {
            self.for_stmt()
        } else if self.match_any(&[TokenKind::Return]) {
            self.return_stmt()
        } else if self.match_any(&[TokenKind::Break]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.")?;
            Ok(Stmt::Break(keyword))
        } else if self.match_any(&[TokenKind::Continue]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.")?;
            Ok(Stmt::Continue(keyword))
        } else if self.match_any(&[TokenKind::LeftBrace]) {
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expr_stmt()
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn print_stmt(&mut self) -> StmtResult {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn expr_stmt(&mut self) -> StmtResult {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(value))
    }

    fn if_stmt(&mut self) -> StmtResult {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_any(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If(cond, then_branch, else_branch))
    }

    fn while_stmt(&mut self) -> StmtResult {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While(cond, body))
    }

    fn for_stmt(&mut self) -> StmtResult {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let init = if self.match_any(&[TokenKind::Semicolon]) {
            None
        } else if self.match_any(&[TokenKind::Var]) {
            Some(Box::new(self.var_decl()?))
        } else {
            Some(Box::new(self.expr_stmt()?))
        };

        let cond = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let incr = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let body = Box::new(self.statement()?);
        Ok(Stmt::For { init, cond, incr, body })
    }

    fn return_stmt(&mut self) -> StmtResult {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return(keyword, value))
    }

    // --- expressions, lowest to highest precedence ---

    fn expression(&mut self) -> ExprResult {
        self.assignment()
    }

    fn assignment(&mut self) -> ExprResult {
        let expr = self.ternary()?;

        if self.match_any(&[TokenKind::Equal]) {
            let equals_line = self.previous().line;
            let value = self.assignment()?;
            return match expr.kind {
                ExprKind::Variable(name) => Ok(self.expr(ExprKind::Assign(name, Box::new(value)))),
                _ => {
                    // Reported, not raised: an invalid target doesn't invalidate the
                    // surrounding statement, so parsing falls through with `expr` unchanged.
                    self.errors.push(ParseError::InvalidAssignmentTarget { line: equals_line });
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn ternary(&mut self) -> ExprResult {
        let cond = self.logic_or()?;
        if self.match_any(&[TokenKind::Question]) {
            let then_e = self.logic_or()?;
            self.consume(TokenKind::Colon, "Expect ':' in ternary expression.")?;
            let else_e = self.ternary()?;
            return Ok(self.expr(ExprKind::Ternary(Box::new(cond), Box::new(then_e), Box::new(else_e))));
        }
        Ok(cond)
    }

    fn logic_or(&mut self) -> ExprResult {
        let mut expr = self.logic_and()?;
        while self.match_any(&[TokenKind::Or]) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = self.expr(ExprKind::Logical(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> ExprResult {
        let mut expr = self.equality()?;
        while self.match_any(&[TokenKind::And]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = self.expr(ExprKind::Logical(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ExprResult {
        self.binary_level(Self::comparison, &[TokenKind::BangEqual, TokenKind::EqualEqual])
    }

    fn comparison(&mut self) -> ExprResult {
        self.binary_level(
            Self::bitor,
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
        )
    }

    fn bitor(&mut self) -> ExprResult {
        self.binary_level(Self::bitxor, &[TokenKind::Bar])
    }

    fn bitxor(&mut self) -> ExprResult {
        self.binary_level(Self::bitand, &[TokenKind::Caret])
    }

    fn bitand(&mut self) -> ExprResult {
        self.binary_level(Self::shift, &[TokenKind::Amper])
    }

    fn shift(&mut self) -> ExprResult {
        self.binary_level(Self::term, &[TokenKind::LessLess, TokenKind::GreaterGreater])
    }

    fn term(&mut self) -> ExprResult {
        self.binary_level(Self::factor, &[TokenKind::Plus, TokenKind::Minus])
    }

    fn factor(&mut self) -> ExprResult {
        self.binary_level(Self::exp, &[TokenKind::Star, TokenKind::Slash])
    }

    /// Shared left-associative `left (op left)*` shape used by every binary precedence tier.
    fn binary_level(
        &mut self,
        mut operand: impl FnMut(&mut Self) -> ExprResult,
        kinds: &[TokenKind],
    ) -> ExprResult {
        let mut expr = operand(self)?;
        while self.match_any(kinds) {
            let op = self.previous().clone();
            let right = operand(self)?;
            expr = self.expr(ExprKind::Binary(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    /// Right-associative via recursion on the right operand.
    fn exp(&mut self) -> ExprResult {
        let left = self.unary()?;
        if self.match_any(&[TokenKind::StarStar]) {
            let op = self.previous().clone();
            let right = self.exp()?;
            return Ok(self.expr(ExprKind::Binary(Box::new(left), op, Box::new(right))));
        }
        Ok(left)
    }

    fn unary(&mut self) -> ExprResult {
        if self.match_any(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.expr(ExprKind::Unary(op, Box::new(right))));
        }
        self.call()
    }

    fn call(&mut self) -> ExprResult {
        let mut expr = self.primary()?;
        loop {
            if self.match_any(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ExprResult {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_PARAMS {
                    self.errors.push(ParseError::TooMany {
                        kind: "arguments",
                        line: self.peek().line,
                    });
                }
                args.push(self.expression()?);
                if !self.match_any(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(self.expr(ExprKind::Call(Box::new(callee), paren, args)))
    }

    fn primary(&mut self) -> ExprResult {
        if self.match_any(&[TokenKind::False]) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if self.match_any(&[TokenKind::True]) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if self.match_any(&[TokenKind::Nil]) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Nil)));
        }
        if self.match_any(&[TokenKind::Number]) {
            let literal = match &self.previous().literal {
                Some(Literal::Number(n)) => *n,
                _ => unreachable!("NUMBER token always carries a Literal::Number"),
            };
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Number(literal))));
        }
        if self.match_any(&[TokenKind::String]) {
            let literal = match &self.previous().literal {
                Some(Literal::String(s)) => s.clone(),
                _ => unreachable!("STRING token always carries a Literal::String"),
            };
            return Ok(self.expr(ExprKind::Literal(LiteralValue::String(literal))));
        }
        if self.match_any(&[TokenKind::Identifier]) {
            let name = self.previous().clone();
            return Ok(self.expr(ExprKind::Variable(name)));
        }
        if self.match_any(&[TokenKind::LeftParen]) {
            let inner = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(self.expr(ExprKind::Grouping(Box::new(inner))));
        }

        Err(ParseError::Expected {
            message: "Expect expression.".to_string(),
            line: self.peek().line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<ParseError>) {
        let (tokens, lex_errors) = scan(source);
        assert!(lex_errors.is_empty());
        let mut id_gen = NodeIdGen::new();
        Parser::new(tokens, &mut id_gen).parse()
    }

    #[test]
    fn parses_arithmetic_with_precedence() {
        let (stmts, errors) = parse("print 1 + 2 * 3;");
        assert!(errors.is_empty());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn parses_ternary_right_associative() {
        let (stmts, errors) = parse("print true ? 1 : false ? 2 : 3;");
        assert!(errors.is_empty());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn invalid_assignment_target_does_not_abort_parsing() {
        // Reported, not raised: the malformed statement and the one after it both survive.
        let (stmts, errors) = parse("1 = 2; print 3;");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::InvalidAssignmentTarget { .. }));
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn synchronize_recovers_after_missing_semicolon() {
        let (stmts, errors) = parse("var x = 1 var y = 2; print y;");
        assert_eq!(errors.len(), 1);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn for_statement_parses_as_dedicated_node() {
        let (stmts, errors) = parse("for (var i = 0; i < 5; i = i + 1) print i;");
        assert!(errors.is_empty());
        assert!(matches!(stmts[0], Stmt::For { .. }));
    }

    #[test]
    fn function_declaration_with_params() {
        let (stmts, errors) = parse("fun add(a, b) { return a + b; }");
        assert!(errors.is_empty());
        assert!(matches!(stmts[0], Stmt::Function(_)));
    }

    #[test]
    fn too_many_parameters_reports_error() {
        let params: Vec<String> = (0..300).map(|i| format!("p{i}")).collect();
        let source = format!("fun f({}) {{ }}", params.join(", "));
        let (_, errors) = parse(&source);
        assert!(errors.iter().any(|e| matches!(e, ParseError::TooMany { kind: "parameters", .. })));
    }
}
