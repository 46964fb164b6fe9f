//! Best-practice pass: advisory findings that never block evaluation.

use super::{Severity, ValidationIssue};
use crate::ast::{AstVisitor, CompareOp, Condition, Expression, RuleBody, RuleSet};

const MAX_NAME_LENGTH: usize = 64;
const MAX_INLINE_LIST: usize = 100;

pub fn run(rule_set: &RuleSet, issues: &mut Vec<ValidationIssue>) {
    if rule_set.name.len() > MAX_NAME_LENGTH {
        issues.push(
            ValidationIssue::new(
                "BP_001",
                Severity::Info,
                format!(
                    "Rule name is {} characters long (over {})",
                    rule_set.name.len(),
                    MAX_NAME_LENGTH
                ),
                "Long names are awkward in logs and dashboards.",
            )
            .with_suggestion("shorten the rule name"),
        );
    }

    // Expensive operations inside conditions run on every evaluation.
    let mut scan = ConditionScan {
        issues,
        in_condition: false,
    };
    match &rule_set.body {
        RuleBody::WhenThen { when, .. } => {
            for condition in when {
                scan.in_condition = true;
                scan.visit_condition(condition);
                scan.in_condition = false;
            }
        }
        RuleBody::Conditions { condition, .. } => {
            scan.in_condition = true;
            scan.visit_condition(condition);
            scan.in_condition = false;
        }
        RuleBody::Rules(rules) => {
            for rule in rules {
                if let Some(condition) = &rule.condition {
                    scan.in_condition = true;
                    scan.visit_condition(condition);
                    scan.in_condition = false;
                }
            }
        }
    }

    // Oversized inline lists anywhere in the tree.
    let mut lists = ListScan { issues };
    rule_set.visit(&mut lists);
}

struct ConditionScan<'a> {
    issues: &'a mut Vec<ValidationIssue>,
    in_condition: bool,
}

impl AstVisitor for ConditionScan<'_> {
    fn visit_condition(&mut self, condition: &Condition) {
        if self.in_condition {
            if let Condition::Comparison {
                op: CompareOp::Matches | CompareOp::NotMatches,
                location,
                ..
            } = condition
            {
                self.issues.push(
                    ValidationIssue::new(
                        "BP_003",
                        Severity::Info,
                        "Regular-expression operator in a condition",
                        "Regex compilation and matching run on every evaluation of this \
                         rule; consider a cheaper operator when the pattern allows it.",
                    )
                    .at(*location),
                );
            }
        }
        crate::ast::walk_condition(self, condition);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        if self.in_condition {
            if let Expression::FunctionCall { name, location, .. } = expr {
                if name.starts_with("rest_") {
                    self.issues.push(
                        ValidationIssue::new(
                            "BP_005",
                            Severity::Warning,
                            format!("HTTP call '{}' inside a condition", name),
                            "Network calls in the condition path make every evaluation \
                             latency-bound; move the call into an action and branch on its \
                             result.",
                        )
                        .at(*location),
                    );
                }
            }
        }
        crate::ast::walk_expression(self, expr);
    }
}

struct ListScan<'a> {
    issues: &'a mut Vec<ValidationIssue>,
}

impl AstVisitor for ListScan<'_> {
    fn visit_expression(&mut self, expr: &Expression) {
        let size = match expr {
            Expression::ListLiteral { elements, .. } => Some(elements.len()),
            Expression::Literal {
                value: crate::value::Value::List(items),
                ..
            } => Some(items.len()),
            _ => None,
        };
        if let Some(size) = size {
            if size > MAX_INLINE_LIST {
                self.issues.push(
                    ValidationIssue::new(
                        "BP_004",
                        Severity::Warning,
                        format!("Inline list with {} elements", size),
                        "Very large inline lists bloat the rule document and slow \
                         membership checks; store the values as a constant instead.",
                    )
                    .at(expr.location()),
                );
            }
        }
        crate::ast::walk_expression(self, expr);
    }
}
