// ABOUTME: Lexer turning source text into a token stream terminated by EOF

use crate::error::LexError;
use crate::token::{keyword_kind, Literal, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    chars: Vec<char>,
    start: usize,
    current: usize,
    line: usize,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            chars: source.chars().collect(),
            start: 0,
            current: 0,
            line: 1,
            errors: Vec::new(),
        }
    }

    /// Scans the whole source, returning the tokens even if errors were found along the
    /// way (lexing continues past an error so the user sees everything wrong at once).
    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        while !self.at_end() {
            self.start = self.current;
            if let Some(token) = self.scan_token() {
                tokens.push(token);
            }
        }
        tokens.push(Token::new(TokenKind::Eof, "", None, self.line));
        (tokens, self.errors)
    }

    fn at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> char {
        if self.at_end() {
            '\0'
        } else {
            self.chars[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.chars.len() {
            '\0'
        } else {
            self.chars[self.current + 1]
        }
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.at_end() || self.chars[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), None, self.line)
    }

    fn make_literal(&self, kind: TokenKind, literal: Literal) -> Token {
        Token::new(kind, self.lexeme(), Some(literal), self.line)
    }

    fn scan_token(&mut self) -> Option<Token> {
        let c = self.advance();
        match c {
            '(' => Some(self.make(TokenKind::LeftParen)),
            ')' => Some(self.make(TokenKind::RightParen)),
            '{' => Some(self.make(TokenKind::LeftBrace)),
            '}' => Some(self.make(TokenKind::RightBrace)),
            ',' => Some(self.make(TokenKind::Comma)),
            '.' => Some(self.make(TokenKind::Dot)),
            '-' => Some(self.make(TokenKind::Minus)),
            '+' => Some(self.make(TokenKind::Plus)),
            ';' => Some(self.make(TokenKind::Semicolon)),
            '&' => Some(self.make(TokenKind::Amper)),
            '|' => Some(self.make(TokenKind::Bar)),
            '^' => Some(self.make(TokenKind::Caret)),
            '?' => Some(self.make(TokenKind::Question)),
            ':' => Some(self.make(TokenKind::Colon)),
            '*' => {
                let kind = if self.matches('*') {
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                };
                Some(self.make(kind))
            }
            '!' => {
                let kind = if self.matches('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                Some(self.make(kind))
            }
            '=' => {
                let kind = if self.matches('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                Some(self.make(kind))
            }
            '<' => {
                let kind = if self.matches('=') {
                    TokenKind::LessEqual
                } else if self.matches('<') {
                    TokenKind::LessLess
                } else {
                    TokenKind::Less
                };
                Some(self.make(kind))
            }
            '>' => {
                let kind = if self.matches('=') {
                    TokenKind::GreaterEqual
                } else if self.matches('>') {
                    TokenKind::GreaterGreater
                } else {
                    TokenKind::Greater
                };
                Some(self.make(kind))
            }
            '/' => {
                if self.matches('/') {
                    while self.peek() != '\n' && !self.at_end() {
                        self.advance();
                    }
                    None
                } else if self.matches('*') {
                    self.block_comment();
                    None
                } else {
                    Some(self.make(TokenKind::Slash))
                }
            }
            ' ' | '\r' | '\t' => None,
            '\n' => {
                self.line += 1;
                None
            }
            '"' => self.string(),
            c if c.is_ascii_digit() => Some(self.number()),
            c if c.is_ascii_alphabetic() || c == '_' => Some(self.identifier()),
            c => {
                self.errors.push(LexError::UnexpectedCharacter {
                    character: c,
                    line: self.line,
                });
                None
            }
        }
    }

    /// Nestable block comment: a running depth counter suffices because only the
    /// all-zero boundary matters, not the shape of the nesting.
    fn block_comment(&mut self) {
        let mut depth = 1usize;
        while depth > 0 {
            if self.at_end() {
                self.errors.push(LexError::UnterminatedBlockComment { line: self.line });
                return;
            }
            let c = self.advance();
            match c {
                '\n' => self.line += 1,
                '/' if self.peek() == '*' => {
                    self.advance();
                    depth += 1;
                }
                '*' if self.peek() == '/' => {
                    self.advance();
                    depth -= 1;
                }
                _ => {}
            }
        }
    }

    fn string(&mut self) -> Option<Token> {
        while self.peek() != '"' && !self.at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.at_end() {
            self.errors.push(LexError::UnterminatedString { line: self.line });
            return None;
        }

        self.advance(); // closing quote
        let value: String = self.chars[self.start + 1..self.current - 1].iter().collect();
        Some(self.make_literal(TokenKind::String, Literal::String(value)))
    }

    fn number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text = self.lexeme();
        let value: f64 = text.parse().expect("lexer only admits well-formed digit runs");
        self.make_literal(TokenKind::Number, Literal::Number(value))
    }

    fn identifier(&mut self) -> Token {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }
        let text = self.lexeme();
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
        self.make(kind)
    }
}

/// Convenience wrapper mirroring the rest of the pipeline's `(result, diagnostics)` shape.
pub fn scan(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let _ = source.as_bytes(); // source must be valid UTF-8; non-ASCII is fine inside strings
    Lexer::new(source).scan_tokens()
}
