// ABOUTME: Error types for each pipeline phase and the shared diagnostic reporter

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("Unexpected character: '{character}'")]
    UnexpectedCharacter { character: char, line: usize },

    #[error("Unterminated string")]
    UnterminatedString { line: usize },

    #[error("Unterminated block comment")]
    UnterminatedBlockComment { line: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { line, .. } => *line,
            LexError::UnterminatedString { line } => *line,
            LexError::UnterminatedBlockComment { line } => *line,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{message}")]
    Expected { message: String, line: usize },

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget { line: usize },

    #[error("Can't have more than 255 {kind}")]
    TooMany { kind: &'static str, line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Expected { line, .. } => *line,
            ParseError::InvalidAssignmentTarget { line } => *line,
            ParseError::TooMany { line, .. } => *line,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Can't read local variable in its own initializer")]
    SelfReferentialInitializer { line: usize },

    #[error("Already a variable with this name in this scope")]
    DuplicateDeclaration { line: usize },

    #[error("Can't return from top-level code")]
    ReturnOutsideFunction { line: usize },

    #[error("Can't use '{keyword}' outside of a loop")]
    LoopControlOutsideLoop { keyword: &'static str, line: usize },
}

impl ResolveError {
    pub fn line(&self) -> usize {
        match self {
            ResolveError::SelfReferentialInitializer { line } => *line,
            ResolveError::DuplicateDeclaration { line } => *line,
            ResolveError::ReturnOutsideFunction { line } => *line,
            ResolveError::LoopControlOutsideLoop { line, .. } => *line,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Operand must be a number")]
    MustBeNumber { line: usize },

    #[error("Operands must be two numbers or two strings")]
    MustBeNumbersOrStrings { line: usize },

    #[error("Operands must be numbers")]
    MustBeNumbers { line: usize },

    #[error("Operands must have no fractional part")]
    MustBeIntegral { line: usize },

    #[error("Division by zero")]
    DivisionByZero { line: usize },

    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String, line: usize },

    #[error("Can only call functions and classes")]
    NotCallable { line: usize },

    #[error("Expected {expected} arguments but got {actual}")]
    ArityMismatch {
        expected: usize,
        actual: usize,
        line: usize,
    },

    /// Escaped `return`/`break`/`continue` that the resolver failed to catch statically.
    /// Unreachable in practice: the resolver rejects these before the evaluator ever runs.
    #[error("{keyword} used outside of its enclosing construct")]
    UnboundControlFlow { keyword: &'static str, line: usize },
}

impl RuntimeError {
    pub fn line(&self) -> usize {
        match self {
            RuntimeError::MustBeNumber { line }
            | RuntimeError::MustBeNumbersOrStrings { line }
            | RuntimeError::MustBeNumbers { line }
            | RuntimeError::MustBeIntegral { line }
            | RuntimeError::DivisionByZero { line }
            | RuntimeError::NotCallable { line }
            | RuntimeError::ArityMismatch { line, .. }
            | RuntimeError::UnboundControlFlow { line, .. } => *line,
            RuntimeError::UndefinedVariable { line, .. } => *line,
        }
    }
}

/// Diagnostic sink threaded explicitly through every phase (construction-time injection,
/// not a process-wide singleton). Tracks the two flags that gate phase transitions and the
/// script-mode exit code.
#[derive(Debug, Default)]
pub struct Reporter {
    had_error: bool,
    had_runtime_error: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Reporter::default()
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }

    fn report(&mut self, line: usize, where_: &str, message: &str) {
        eprintln!("[line {line}] Error{where_}: {message}");
        self.had_error = true;
    }

    pub fn lex_error(&mut self, err: &LexError) {
        self.report(err.line(), "", &err.to_string());
    }

    pub fn parse_error(&mut self, err: &ParseError) {
        self.report(err.line(), "", &err.to_string());
    }

    pub fn resolve_error(&mut self, err: &ResolveError) {
        self.report(err.line(), "", &err.to_string());
    }

    pub fn runtime_error(&mut self, err: &RuntimeError) {
        eprintln!("[line {}] {}", err.line(), err);
        self.had_runtime_error = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_tracks_static_errors() {
        let mut reporter = Reporter::new();
        assert!(!reporter.had_error());
        reporter.parse_error(&ParseError::InvalidAssignmentTarget { line: 3 });
        assert!(reporter.had_error());
        assert!(!reporter.had_runtime_error());
    }

    #[test]
    fn reporter_tracks_runtime_errors_independently() {
        let mut reporter = Reporter::new();
        reporter.runtime_error(&RuntimeError::DivisionByZero { line: 1 });
        assert!(reporter.had_runtime_error());
        assert!(!reporter.had_error());
    }

    #[test]
    fn reset_clears_both_flags() {
        let mut reporter = Reporter::new();
        reporter.parse_error(&ParseError::InvalidAssignmentTarget { line: 1 });
        reporter.runtime_error(&RuntimeError::DivisionByZero { line: 1 });
        reporter.reset();
        assert!(!reporter.had_error());
        assert!(!reporter.had_runtime_error());
    }
}
