// ABOUTME: Error taxonomy for every AMEL pipeline stage (lexer, parser,
// ABOUTME: optimizer, evaluator, sandbox, and the query compilers)

use thiserror::Error;

/// A single error kind from the taxonomy in spec §7. Every variant carries
/// enough context to render a useful diagnostic without a source map lookup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    #[error("unterminated string or comment")]
    UnterminatedString,

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    #[error("invalid numeric literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("invalid JSONPath '{0}'")]
    InvalidJsonPath(String),

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("{function}: expected {expected} argument(s), got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("{function}: expected {expected}, got {actual} at argument {position}")]
    TypeMismatch {
        function: String,
        expected: String,
        actual: String,
        position: usize,
    },

    #[error("invalid operator '{0}' for operand type(s)")]
    InvalidOperator(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} out of bounds (length {length})")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("evaluation timed out")]
    Timeout,

    #[error("sandbox violation: {0}")]
    SandboxViolation(String),

    #[error("{function} panicked: {message}")]
    FunctionPanic { function: String, message: String },

    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("compiler does not support this construct: {0}")]
    Unsupported(String),
}

/// A position in source text. 1-based, as specified for `Token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// The crate-wide error type: a kind plus an optional source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub position: Option<Position>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(p) => write!(f, "{} at {}:{}", self.kind, p.line, p.column),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    pub fn at(kind: ErrorKind, position: Position) -> Self {
        Self {
            kind,
            position: Some(position),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    pub fn type_mismatch(
        function: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        position: usize,
    ) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            function: function.into(),
            expected: expected.into(),
            actual: actual.into(),
            position,
        })
    }

    pub fn argument_count(
        function: impl Into<String>,
        expected: impl Into<String>,
        actual: usize,
    ) -> Self {
        Self::new(ErrorKind::ArgumentCount {
            function: function.into(),
            expected: expected.into(),
            actual,
        })
    }

    pub fn runtime(function: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FunctionPanic {
            function: function.to_string(),
            message: message.into(),
        })
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ===== Arity constant strings, mirroring the teacher's allocation-free
// ===== error-path constants in error.rs =====
pub const ARITY_ONE: &str = "1";
pub const ARITY_TWO: &str = "2";
pub const ARITY_THREE: &str = "3";
pub const ARITY_AT_LEAST_ONE: &str = "at least 1";
pub const ARITY_ONE_OR_TWO: &str = "1-2";
pub const ARITY_TWO_OR_THREE: &str = "2-3";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position_when_present() {
        let err = Error::at(ErrorKind::DivisionByZero, Position::new(3, 7));
        assert_eq!(err.to_string(), "division by zero at 3:7");
    }

    #[test]
    fn display_omits_position_when_absent() {
        let err = Error::new(ErrorKind::DivisionByZero);
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn with_position_does_not_override_existing() {
        let err = Error::at(ErrorKind::Timeout, Position::new(1, 1))
            .with_position(Position::new(9, 9));
        assert_eq!(err.position, Some(Position::new(1, 1)));
    }
}
