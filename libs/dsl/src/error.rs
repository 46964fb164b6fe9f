//! Error types for the rule DSL engine.
//!
//! Every variant maps to a stable machine code (see [`Error::code`]); the
//! codes, not the Rust type names, are the contract with callers.

use crate::ast::SourceLocation;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Rule compilation and evaluation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Lexical error at line {line}, column {column}: {message}")]
    Lexical {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("Naming violation: {message}")]
    Naming {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Wrong number of arguments for {function}: expected {expected}, got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("Undefined constant: {0}")]
    UndefinedConstant(String),

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unparseable date: {0}")]
    DateFormat(String),

    #[error("Invalid regular expression: {0}")]
    Regex(String),

    #[error("Evaluation timed out")]
    Timeout,

    #[error("Evaluation cancelled")]
    Cancelled,

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Expression too complex (max nesting depth {0})")]
    TooComplex(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Error::Parse {
            message: message.into(),
            location,
        }
    }

    /// Stable machine code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Lexical { .. } => "LEX_001",
            Error::Parse { .. } => "PARSE_001",
            Error::Naming { .. } => "NAME_001",
            Error::Type(_) => "TYPE_001",
            Error::Arity { .. } => "ARITY_001",
            Error::UndefinedConstant(_) => "UNDEFINED_CONSTANT",
            Error::MissingInput(_) => "MISSING_INPUT",
            Error::DivisionByZero => "DIVISION_BY_ZERO",
            Error::DateFormat(_) => "DATE_FORMAT",
            Error::Regex(_) => "REGEX",
            Error::Timeout => "TIMEOUT",
            Error::Cancelled => "CANCELLED",
            Error::UnknownFunction(_) => "UNKNOWN_FUNCTION",
            Error::TooComplex(_) => "TOO_COMPLEX",
            Error::Internal(_) => "INTERNAL",
        }
    }

    /// Source location, when one was recorded.
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Error::Lexical { line, column, .. } => Some(SourceLocation {
                line: *line,
                column: *column,
                length: 1,
            }),
            Error::Parse { location, .. } | Error::Naming { location, .. } => *location,
            _ => None,
        }
    }
}
