//! Naming pass: every name must match the regex of its classification tier.
//!
//! The parser already rejects malformed names inside inline expressions;
//! this pass re-checks the document-level declarations and the cross-tier
//! shadowing rule, so a structurally-built RuleSet gets the same guarantees.

use super::{Severity, ValidationIssue};
use crate::ast::{Action, AstVisitor, Expression, NameKind, RuleSet};
use crate::parser::expression::{to_camel_case, to_snake_case};
use crate::token::is_reserved_word;

pub fn run(rule_set: &RuleSet, issues: &mut Vec<ValidationIssue>) {
    for input in &rule_set.inputs {
        if NameKind::classify(&input.name) != Some(NameKind::Input) {
            issues.push(
                ValidationIssue::new(
                    "NAME_001",
                    Severity::Critical,
                    format!("Input '{}' is not camelCase", input.name),
                    "Input variables are supplied by the caller and must be camelCase; \
                     the lexical form selects the variable-resolution tier.",
                )
                .with_suggestion(format!(
                    "rename `{}` to `{}` in inputs",
                    input.name,
                    to_camel_case(&input.name)
                ))
                .at(input.location),
            );
        }
        if is_reserved_word(&input.name) {
            issues.push(
                ValidationIssue::new(
                    "NAME_005",
                    Severity::Critical,
                    format!("Input '{}' collides with a reserved word", input.name),
                    "Keywords and operator words cannot be used as variable names.",
                )
                .at(input.location),
            );
        }
    }

    for constant in &rule_set.constants {
        if NameKind::classify(&constant.name) != Some(NameKind::Constant) {
            issues.push(
                ValidationIssue::new(
                    "NAME_002",
                    Severity::Critical,
                    format!("Inline constant '{}' is not UPPER_SNAKE", constant.name),
                    "Constants resolve from the constant tier and must be UPPER_SNAKE.",
                )
                .with_suggestion(format!(
                    "rename `{}` to `{}`",
                    constant.name,
                    constant.name.to_uppercase().replace([' ', '-'], "_")
                ))
                .at(constant.location),
            );
        }
    }

    // No declared input may shadow an inline constant (or vice versa); the
    // tiers differ only by case, so compare case-insensitively.
    for input in &rule_set.inputs {
        let folded = input.name.to_lowercase().replace('_', "");
        for constant in &rule_set.constants {
            if constant.name.to_lowercase().replace('_', "") == folded {
                issues.push(
                    ValidationIssue::new(
                        "NAME_004",
                        Severity::Error,
                        format!(
                            "Input '{}' shadows inline constant '{}'",
                            input.name, constant.name
                        ),
                        "An input and an inline constant with the same effective name make \
                         lookup priority surprising; rename one of them.",
                    )
                    .at(input.location),
                );
            }
        }
    }

    // Set/Calculate targets are snake_case by construction in the parser,
    // but re-check for rule sets assembled programmatically.
    struct TargetCheck<'a> {
        issues: &'a mut Vec<ValidationIssue>,
    }

    impl AstVisitor for TargetCheck<'_> {
        fn visit_action(&mut self, action: &Action) {
            if let Some(target) = action.target() {
                let snake = target.starts_with(|c: char| c.is_ascii_lowercase())
                    && target
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
                if !snake || is_reserved_word(target) {
                    self.issues.push(
                        ValidationIssue::new(
                            "NAME_003",
                            Severity::Critical,
                            format!("Action target '{}' is not snake_case", target),
                            "Computed variables are produced by actions and must be snake_case.",
                        )
                        .with_suggestion(format!(
                            "rename `{}` to `{}`",
                            target,
                            to_snake_case(target)
                        ))
                        .at(action.location()),
                    );
                }
            }
            crate::ast::walk_action(self, action);
        }

        fn visit_expression(&mut self, expr: &Expression) {
            if let Expression::Variable { name, kind, location } = expr {
                if NameKind::classify(name) != Some(*kind) {
                    self.issues.push(
                        ValidationIssue::new(
                            "NAME_006",
                            Severity::Critical,
                            format!(
                                "Variable '{}' is tagged as {} but its form says otherwise",
                                name,
                                kind.describe()
                            ),
                            "A variable reference's classification must match its lexical form.",
                        )
                        .at(*location),
                    );
                }
            }
            crate::ast::walk_expression(self, expr);
        }
    }

    let mut check = TargetCheck { issues };
    rule_set.visit(&mut check);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    #[test]
    fn test_upper_snake_input_is_critical() {
        let outcome = parse_document(
            r#"
name: bad
inputs: [CREDIT_SCORE]
when: [true]
then: [set ok to true]
"#,
        );
        let mut issues = Vec::new();
        run(&outcome.rule_set.unwrap(), &mut issues);
        let issue = issues.iter().find(|i| i.code == "NAME_001").unwrap();
        assert_eq!(issue.severity, Severity::Critical);
        assert!(issue
            .suggestion
            .as_deref()
            .unwrap()
            .contains("creditScore"));
    }

    #[test]
    fn test_input_shadowing_inline_constant() {
        let outcome = parse_document(
            r#"
name: shadowing
inputs: [maxAmount]
constants:
  - name: MAX_AMOUNT
    value: 100
when: [maxAmount less_than MAX_AMOUNT]
then: [set ok to true]
"#,
        );
        let mut issues = Vec::new();
        run(&outcome.rule_set.unwrap(), &mut issues);
        assert!(issues.iter().any(|i| i.code == "NAME_004"));
    }

    #[test]
    fn test_clean_names_produce_no_issues() {
        let outcome = parse_document(
            r#"
name: clean
inputs: [creditScore]
constants:
  - name: MIN_SCORE
    value: 650
when: [creditScore at_least MIN_SCORE]
then: [set approval_tier to "A"]
"#,
        );
        let mut issues = Vec::new();
        run(&outcome.rule_set.unwrap(), &mut issues);
        assert!(issues.is_empty(), "issues: {:?}", issues);
    }
}
