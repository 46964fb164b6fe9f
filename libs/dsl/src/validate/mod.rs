//! Static validation passes over a parsed [`RuleSet`].
//!
//! Passes run in a fixed order: naming, syntax shape, dependency/order,
//! circular dependencies, logic, best practices. Each issue carries a stable
//! code, a severity, a message, a longer description, and where possible a
//! concrete suggestion. A deterministic quality score in [0, 100] is derived
//! from severity-weighted counts.

mod dependencies;
mod logic;
mod naming;
mod practices;
mod shape;

use crate::ast::{RuleSet, SourceLocation};
use serde::Serialize;

/// Issue severity. `Critical` and `Error` block evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

/// A single validation finding.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl ValidationIssue {
    pub fn new(
        code: &'static str,
        severity: Severity,
        message: impl Into<String>,
        description: &'static str,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            description,
            suggestion: None,
            location: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }
}

/// Validator configuration: issue cap and fail-fast switch.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Stop after the first pass that produces a blocking issue.
    pub fail_fast: bool,
    pub max_issues: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_issues: 100,
        }
    }
}

/// The full validation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub quality_score: u8,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when any issue blocks evaluation.
    pub fn has_blocking_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity <= Severity::Error)
    }
}

/// Run all passes with default configuration.
pub fn validate(rule_set: &RuleSet) -> ValidationReport {
    validate_with_config(rule_set, &ValidatorConfig::default())
}

pub fn validate_with_config(rule_set: &RuleSet, config: &ValidatorConfig) -> ValidationReport {
    let passes: [fn(&RuleSet, &mut Vec<ValidationIssue>); 6] = [
        naming::run,
        shape::run,
        dependencies::run_order,
        dependencies::run_cycles,
        logic::run,
        practices::run,
    ];

    let mut issues = Vec::new();
    for pass in passes {
        if issues.len() >= config.max_issues {
            break;
        }
        pass(rule_set, &mut issues);
        if config.fail_fast
            && issues.iter().any(|i: &ValidationIssue| i.severity <= Severity::Error)
        {
            break;
        }
    }
    issues.truncate(config.max_issues);

    let quality_score = quality_score(&issues);
    ValidationReport {
        valid: !issues.iter().any(|i| i.severity <= Severity::Error),
        quality_score,
        issues,
    }
}

/// Deterministic severity-weighted score.
fn quality_score(issues: &[ValidationIssue]) -> u8 {
    let penalty: u32 = issues
        .iter()
        .map(|issue| match issue.severity {
            Severity::Critical => 30,
            Severity::Error => 15,
            Severity::Warning => 5,
            Severity::Info => 1,
        })
        .sum();
    100u32.saturating_sub(penalty) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn validate_source(source: &str) -> ValidationReport {
        let outcome = parse_document(source);
        validate(&outcome.rule_set.expect("parse produced no rule set"))
    }

    #[test]
    fn test_clean_rule_scores_high() {
        let report = validate_source(
            r#"
name: clean_rule
description: A well-formed rule
inputs: [creditScore]
when: [creditScore at_least 700]
then: [set eligible to true]
else: [set eligible to false]
output:
  eligible: boolean
"#,
        );
        assert!(report.valid, "issues: {:?}", report.issues);
        assert!(report.quality_score >= 95);
    }

    #[test]
    fn test_order_error_blocks_evaluation() {
        let report = validate_source(
            r#"
name: out_of_order
description: references before production
inputs: [monthlyDebt, monthlyIncome]
when: [risk_ratio less_than 0.4]
then: [calculate risk_ratio as monthlyDebt / monthlyIncome]
output:
  risk_ratio: number
"#,
        );
        assert!(!report.valid);
        assert!(report.has_blocking_issues());
        let issue = report
            .issues
            .iter()
            .find(|i| i.code == "DEP_002")
            .expect("DEP_002 issue");
        assert!(issue.message.contains("risk_ratio"));
    }

    #[test]
    fn test_quality_score_is_deterministic() {
        let source = r#"
name: ab
inputs: []
when: [true]
then: [set ok to true]
"#;
        let first = validate_source(source);
        let second = validate_source(source);
        assert_eq!(first.quality_score, second.quality_score);
        assert!(first.quality_score < 100);
    }
}
