//! Rule document parsing.
//!
//! Two entry points share one AST: [`parse_document`] consumes the YAML tree
//! (structured `conditions:` form, simplified `when:` form, and the
//! multi-rule `rules:` form), delegating every inline expression string to
//! [`ExpressionParser`].
//!
//! Parse failures are collected as [`ParseDiagnostic`]s rather than aborting
//! at the first problem, so a document with several bad entries surfaces all
//! of them in one pass. Validators run only when no fatal diagnostic is
//! present.

mod document;
pub mod expression;

pub use document::parse_document;
pub use expression::{ExpressionParser, MAX_RECURSION_DEPTH};

use crate::ast::{RuleSet, SourceLocation};
use crate::error::Error;

/// Cap on collected diagnostics per parse pass.
pub const MAX_DIAGNOSTICS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A single parse finding.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    pub severity: DiagnosticSeverity,
    pub code: String,
    pub message: String,
    /// Position within the inline expression string that failed, when the
    /// failure came from an inline parse. YAML-structural findings carry no
    /// location.
    pub location: Option<SourceLocation>,
    pub hint: Option<String>,
}

impl ParseDiagnostic {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code: code.to_string(),
            message: message.into(),
            location: None,
            hint: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            code: code.to_string(),
            message: message.into(),
            location: None,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Wrap an expression-level error, labelling the document entry it came
    /// from (`when[2]`, `then[0]`, ...).
    pub fn from_error(context: &str, error: &Error) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code: error.code().to_string(),
            message: format!("{}: {}", context, error),
            location: error.location(),
            hint: None,
        }
    }
}

/// Result of parsing a rule document: diagnostics plus the (possibly
/// partial) AST. The AST is absent only when the YAML itself is malformed.
#[derive(Debug)]
pub struct ParseOutcome {
    pub rule_set: Option<RuleSet>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseOutcome {
    /// True when any diagnostic is fatal.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }
}
