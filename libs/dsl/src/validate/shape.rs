//! Syntax-shape pass: required document fields and enum constraints.

use super::{Severity, ValidationIssue};
use crate::ast::{RuleBody, RuleSet};

const RISK_LEVELS: [&str; 4] = ["LOW", "MEDIUM", "HIGH", "CRITICAL"];

pub fn run(rule_set: &RuleSet, issues: &mut Vec<ValidationIssue>) {
    if rule_set.name.len() < 3 {
        issues.push(ValidationIssue::new(
            "SHAPE_001",
            Severity::Error,
            format!("Rule name '{}' is too short", rule_set.name),
            "Every rule document needs a name of at least three characters.",
        ));
    }

    if rule_set.description.as_deref().unwrap_or("").is_empty() {
        issues.push(
            ValidationIssue::new(
                "SHAPE_002",
                Severity::Warning,
                "Rule has no description",
                "A description is recommended so operators can tell rules apart.",
            )
            .with_suggestion("add a one-line description field"),
        );
    }

    if rule_set.inputs.is_empty() {
        issues.push(ValidationIssue::new(
            "SHAPE_003",
            Severity::Warning,
            "Rule declares no inputs",
            "Rules normally read caller-supplied inputs; an empty inputs list is \
             usually an authoring mistake.",
        ));
    }

    let action_count = match &rule_set.body {
        RuleBody::WhenThen {
            then_actions,
            else_actions,
            ..
        }
        | RuleBody::Conditions {
            then_actions,
            else_actions,
            ..
        } => then_actions.len() + else_actions.len(),
        RuleBody::Rules(rules) => rules
            .iter()
            .map(|r| r.then_actions.len() + r.else_actions.len())
            .sum(),
    };
    if action_count == 0 {
        issues.push(ValidationIssue::new(
            "SHAPE_004",
            Severity::Error,
            "Rule has no reachable actions",
            "Without at least one action the rule can never produce output.",
        ));
    }

    if rule_set.output.is_empty() {
        issues.push(
            ValidationIssue::new(
                "SHAPE_005",
                Severity::Warning,
                "Rule declares no outputs",
                "Computed variables are still returned, but declaring outputs documents \
                 the rule's contract.",
            )
            .with_suggestion("add an output map naming the values callers rely on"),
        );
    }

    if let Some(risk_level) = rule_set.metadata.risk_level.as_deref() {
        if !RISK_LEVELS.contains(&risk_level) {
            issues.push(
                ValidationIssue::new(
                    "SHAPE_006",
                    Severity::Error,
                    format!("riskLevel '{}' is not a known level", risk_level),
                    "riskLevel is constrained to LOW, MEDIUM, HIGH, or CRITICAL.",
                )
                .with_suggestion(format!("use one of {}", RISK_LEVELS.join(", "))),
            );
        }
    }

    if rule_set.surface_forms.len() > 1 {
        issues.push(
            ValidationIssue::new(
                "SHAPE_007",
                Severity::Error,
                format!(
                    "Multiple surface forms present: {}",
                    rule_set.surface_forms.join(", ")
                ),
                "Only one of when/conditions/rules may be primary; the others are ignored \
                 at evaluation time.",
            )
            .with_suggestion("keep a single surface form and delete the rest"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn run_on(source: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        run(&parse_document(source).rule_set.unwrap(), &mut issues);
        issues
    }

    #[test]
    fn test_short_name_and_missing_pieces() {
        let issues = run_on("name: ab\n");
        let codes: Vec<&str> = issues.iter().map(|i| i.code).collect();
        assert!(codes.contains(&"SHAPE_001"));
        assert!(codes.contains(&"SHAPE_003"));
        assert!(codes.contains(&"SHAPE_004"));
    }

    #[test]
    fn test_bad_risk_level() {
        let issues = run_on(
            r#"
name: risky
description: x
metadata:
  riskLevel: EXTREME
inputs: [a]
when: [a > 1]
then: [set ok to true]
output: {ok: boolean}
"#,
        );
        assert!(issues.iter().any(|i| i.code == "SHAPE_006"));
    }

    #[test]
    fn test_mixed_forms_is_error() {
        let issues = run_on(
            r#"
name: mixed
description: x
inputs: [a]
when: [a > 1]
rules:
  - when: [a > 1]
    then: [set ok to true]
then: [set ok to true]
output: {ok: boolean}
"#,
        );
        assert!(issues.iter().any(|i| i.code == "SHAPE_007"));
    }
}
