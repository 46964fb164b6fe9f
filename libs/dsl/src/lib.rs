//! Rule DSL engine: compilation and evaluation pipeline.
//!
//! Business rules are written in a YAML-embedded DSL with three surface
//! forms (structured `conditions:`, simplified `when:` strings, and a
//! multi-rule `rules:` list) that all parse to one typed AST. The pipeline:
//!
//! ```text
//! YAML text
//!      |
//!   Parser (+ Lexer for inline strings) -> AST
//!      |
//! Validators (naming, shape, dependencies, cycles, logic, practices)
//!      |
//! Constant Resolver -> external constant store
//!      |
//! Evaluator -> computed variables -> output projection
//! ```
//!
//! Numerics use `rust_decimal` throughout; naming conventions are
//! semantically meaningful (camelCase inputs, UPPER_SNAKE constants,
//! snake_case computed variables) and are enforced at parse time.

pub mod ast;
pub mod constants;
pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod transport;
pub mod validate;
pub mod value;

// Re-export main types
pub use ast::{Action, Condition, Expression, NameKind, RuleBody, RuleSet, SourceLocation};
pub use constants::{Constant, ConstantStore, ConstantValueType, MemoryConstantStore};
pub use context::EvaluationContext;
pub use engine::{BatchOptions, BatchOutcome, BatchRequest, Compiled, Engine, DSL_VERSION};
pub use error::{Error, Result};
pub use eval::{evaluate_rule_set, EvalOptions, EvaluateResponse, Evaluator};
pub use parser::{parse_document, DiagnosticSeverity, ParseDiagnostic, ParseOutcome};
pub use transport::{HttpMethod, HttpTransport, TransportError, TransportResponse};
pub use validate::{validate, Severity, ValidationIssue, ValidationReport};
pub use value::{Temporal, Value};
