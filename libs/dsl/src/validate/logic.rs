//! Logic pass: constant conditions, unreachable branches, and
//! contradictions within `and` chains.

use super::{Severity, ValidationIssue};
use crate::ast::{CompareOp, Condition, Expression, LogicalOp, RuleBody, RuleSet};
use crate::value::Value;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub fn run(rule_set: &RuleSet, issues: &mut Vec<ValidationIssue>) {
    match &rule_set.body {
        RuleBody::WhenThen {
            when, else_actions, ..
        } => {
            for condition in when {
                inspect_condition(condition, issues);
            }
            let always_true = !when.is_empty()
                && when.iter().all(|c| constant_truth(c) == Some(true));
            if always_true && !else_actions.is_empty() {
                issues.push(unreachable_else());
            }
            if when.len() > 1 {
                check_and_contradictions(when, issues);
            }
        }
        RuleBody::Conditions {
            condition,
            else_actions,
            ..
        } => {
            inspect_condition(condition, issues);
            if constant_truth(condition) == Some(true) && !else_actions.is_empty() {
                issues.push(unreachable_else());
            }
        }
        RuleBody::Rules(rules) => {
            for rule in rules {
                if let Some(condition) = &rule.condition {
                    inspect_condition(condition, issues);
                }
            }
        }
    }
}

fn unreachable_else() -> ValidationIssue {
    ValidationIssue::new(
        "LOGIC_003",
        Severity::Warning,
        "else branch is unreachable: the condition is always true",
        "A tautological condition means the else actions can never run.",
    )
    .with_suggestion("remove the else branch or make the condition depend on data")
}

fn inspect_condition(condition: &Condition, issues: &mut Vec<ValidationIssue>) {
    match constant_truth(condition) {
        Some(true) => issues.push(
            ValidationIssue::new(
                "LOGIC_001",
                Severity::Warning,
                "Condition is always true",
                "A constant-true condition makes the branch unconditional.",
            )
            .at(condition.location()),
        ),
        Some(false) => issues.push(
            ValidationIssue::new(
                "LOGIC_002",
                Severity::Warning,
                "Condition is always false; its branch is unreachable",
                "A constant-false condition means the then actions can never run.",
            )
            .at(condition.location()),
        ),
        None => {}
    }

    if let Condition::Logical {
        op: LogicalOp::And,
        children,
        ..
    } = condition
    {
        check_and_contradictions(children, issues);
    }

    // Recurse into nested logical structure.
    if let Condition::Logical { children, .. } = condition {
        for child in children {
            inspect_condition(child, issues);
        }
    }
}

/// Constant truth value of a condition, when statically known.
fn constant_truth(condition: &Condition) -> Option<bool> {
    match condition {
        Condition::Expr {
            expr: Expression::Literal { value, .. },
        } => Some(value.truthy()),
        Condition::Comparison {
            left: Expression::Literal { value: left, .. },
            op: CompareOp::Equal,
            right: Some(Expression::Literal { value: right, .. }),
            ..
        } => Some(left.loose_eq(right)),
        _ => None,
    }
}

/// Interval analysis over `and` chains: `x > 10 and x < 5` cannot hold.
fn check_and_contradictions(children: &[Condition], issues: &mut Vec<ValidationIssue>) {
    #[derive(Default)]
    struct Bounds {
        lower: Option<(Decimal, bool)>, // (bound, inclusive)
        upper: Option<(Decimal, bool)>,
    }

    fn tighten_lower(bounds: &mut Bounds, bound: Decimal, inclusive: bool) {
        let replace = match bounds.lower {
            Some((current, current_inclusive)) => {
                bound > current || (bound == current && current_inclusive && !inclusive)
            }
            None => true,
        };
        if replace {
            bounds.lower = Some((bound, inclusive));
        }
    }

    fn tighten_upper(bounds: &mut Bounds, bound: Decimal, inclusive: bool) {
        let replace = match bounds.upper {
            Some((current, current_inclusive)) => {
                bound < current || (bound == current && current_inclusive && !inclusive)
            }
            None => true,
        };
        if replace {
            bounds.upper = Some((bound, inclusive));
        }
    }

    let mut bounds: HashMap<&str, Bounds> = HashMap::new();

    for child in children {
        let Condition::Comparison {
            left: Expression::Variable { name, .. },
            op,
            right: Some(Expression::Literal { value: Value::Number(bound), .. }),
            ..
        } = child
        else {
            continue;
        };

        let entry = bounds.entry(name.as_str()).or_default();
        match op {
            CompareOp::GreaterThan => tighten_lower(entry, *bound, false),
            CompareOp::GreaterThanOrEqual => tighten_lower(entry, *bound, true),
            CompareOp::LessThan => tighten_upper(entry, *bound, false),
            CompareOp::LessThanOrEqual => tighten_upper(entry, *bound, true),
            CompareOp::Equal => {
                tighten_lower(entry, *bound, true);
                tighten_upper(entry, *bound, true);
            }
            _ => {}
        }
    }

    for (name, bounds) in bounds {
        if let (Some((lower, lower_inclusive)), Some((upper, upper_inclusive))) =
            (bounds.lower, bounds.upper)
        {
            let empty = lower > upper
                || (lower == upper && !(lower_inclusive && upper_inclusive));
            if empty {
                issues.push(
                    ValidationIssue::new(
                        "LOGIC_004",
                        Severity::Error,
                        format!(
                            "Contradictory bounds on '{}': the conjunction can never hold",
                            name
                        ),
                        "Two comparisons on the same variable inside an `and` chain exclude \
                         every possible value.",
                    )
                    .with_suggestion(format!("re-check the numeric bounds applied to `{}`", name)),
                );
            }
        }
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
    fn test_constant_true_condition() {
        let issues = run_on(
            r#"
name: constant
inputs: [a]
when: [true]
then: [set ok to true]
"#,
        );
        assert!(issues.iter().any(|i| i.code == "LOGIC_001"));
    }

    #[test]
    fn test_unreachable_else() {
        let issues = run_on(
            r#"
name: tautology
inputs: [a]
when: [true]
then: [set ok to true]
else: [set ok to false]
"#,
        );
        assert!(issues.iter().any(|i| i.code == "LOGIC_003"));
    }

    #[test]
    fn test_and_chain_contradiction() {
        let issues = run_on(
            r#"
name: contradiction
inputs: [x]
when:
  - x > 10
  - x < 5
then: [set ok to true]
"#,
        );
        let issue = issues.iter().find(|i| i.code == "LOGIC_004").unwrap();
        assert!(issue.message.contains('x'));
    }

    #[test]
    fn test_boundary_exclusive_contradiction() {
        let issues = run_on(
            r#"
name: boundary
inputs: [x]
when:
  - x > 5
  - x <= 5
then: [set ok to true]
"#,
        );
        assert!(issues.iter().any(|i| i.code == "LOGIC_004"));
    }

    #[test]
    fn test_satisfiable_bounds_are_clean() {
        let issues = run_on(
            r#"
name: fine
inputs: [x]
when:
  - x at_least 5
  - x less_than 10
then: [set ok to true]
"#,
        );
        assert!(
            !issues.iter().any(|i| i.code == "LOGIC_004"),
            "issues: {:?}",
            issues
        );
    }
}
