//! Dependency passes: order-of-operations and circular references.
//!
//! The order pass walks the rule in evaluation order with a growing set of
//! produced names; any computed-tier reference that precedes its producing
//! action is `DEP_002`. The cycle pass builds a DAG keyed by target and
//! reports every cycle with its full path.

use super::{Severity, ValidationIssue};
use crate::ast::{
    Action, AstVisitor, Condition, Expression, NameKind, RuleBody, RuleSet, SourceLocation,
};
use crate::eval::derived;
use std::collections::{HashMap, HashSet};

// ============================================
// Order of operations
// ============================================

pub fn run_order(rule_set: &RuleSet, issues: &mut Vec<ValidationIssue>) {
    let mut walk = OrderWalk {
        produced: HashSet::new(),
        targets: computed_like_targets(rule_set),
        issues,
    };

    match &rule_set.body {
        RuleBody::WhenThen {
            when,
            then_actions,
            else_actions,
        } => {
            for condition in when {
                walk.check_condition(condition);
            }
            walk.walk_actions(then_actions);
            walk.walk_actions(else_actions);
        }
        RuleBody::Conditions {
            condition,
            then_actions,
            else_actions,
        } => {
            walk.check_condition(condition);
            walk.walk_actions(then_actions);
            walk.walk_actions(else_actions);
        }
        RuleBody::Rules(rules) => {
            // Sub-rules share the context, so later rules see earlier
            // rules' computed variables.
            for rule in rules {
                if let Some(condition) = &rule.condition {
                    walk.check_condition(condition);
                }
                walk.walk_actions(&rule.then_actions);
                walk.walk_actions(&rule.else_actions);
            }
        }
    }

    if let Some(config) = &rule_set.circuit_breaker {
        if let Some(condition) = &config.condition {
            walk.check_condition(condition);
        }
    }
}

/// Every Set/Calculate target anywhere in the rule set.
fn all_targets(rule_set: &RuleSet) -> HashSet<String> {
    struct TargetCollector {
        targets: HashSet<String>,
    }

    impl AstVisitor for TargetCollector {
        fn visit_action(&mut self, action: &Action) {
            if let Some(target) = action.target() {
                self.targets.insert(target.to_string());
            }
            crate::ast::walk_action(self, action);
        }
    }

    let mut collector = TargetCollector {
        targets: HashSet::new(),
    };
    rule_set.visit(&mut collector);
    collector.targets
}

/// Targets whose references count as computed-tier dependencies.
///
/// Single-word targets (`eligible`, `tier`) classify as Input when
/// referenced, so the kind tag alone cannot identify them; any name an
/// action produces counts, except declared inputs, which legitimately
/// resolve from the input tier before their producing action runs.
fn computed_like_targets(rule_set: &RuleSet) -> HashSet<String> {
    let mut targets = all_targets(rule_set);
    for input in &rule_set.inputs {
        targets.remove(&input.name);
    }
    targets
}

struct OrderWalk<'a> {
    produced: HashSet<String>,
    targets: HashSet<String>,
    issues: &'a mut Vec<ValidationIssue>,
}

impl OrderWalk<'_> {
    fn walk_actions(&mut self, actions: &[Action]) {
        for action in actions {
            match action {
                Action::Set { target, value, .. } => {
                    self.check_expression(value);
                    self.produced.insert(target.clone());
                }
                Action::Calculate {
                    target, expression, ..
                } => {
                    self.check_expression(expression);
                    self.produced.insert(target.clone());
                }
                Action::Call { args, .. } => {
                    for arg in args {
                        self.check_expression(arg);
                    }
                }
                Action::Conditional {
                    condition,
                    then_actions,
                    else_actions,
                    ..
                } => {
                    self.check_condition(condition);
                    self.walk_actions(then_actions);
                    self.walk_actions(else_actions);
                }
                Action::CircuitBreaker { condition, .. } => {
                    if let Some(expr) = condition {
                        self.check_expression(expr);
                    }
                }
            }
        }
    }

    fn check_condition(&mut self, condition: &Condition) {
        for (name, location) in computed_refs_in_condition(condition, &self.targets) {
            self.report_unproduced(&name, location);
        }
    }

    fn check_expression(&mut self, expr: &Expression) {
        for (name, location) in computed_refs_in_expression(expr, &self.targets) {
            self.report_unproduced(&name, location);
        }
    }

    fn report_unproduced(&mut self, name: &str, location: Option<SourceLocation>) {
        if self.produced.contains(name) {
            return;
        }
        // Derived ratios resolve by computation, but only while no action
        // produces the same name: an explicit production means this
        // reference depends on it.
        if derived::is_derived(name) && !self.targets.contains(name) {
            return;
        }
        self.issues.push(
            ValidationIssue::new(
                "DEP_002",
                Severity::Error,
                format!(
                    "Computed variable '{}' is referenced before any action produces it",
                    name
                ),
                "Within a rule set, the action producing a computed variable must precede \
                 every reference to it in evaluation order.",
            )
            .with_suggestion(format!(
                "move the `set`/`calculate` producing `{}` before this reference",
                name
            ))
            .at(location),
        );
    }
}

/// Collect computed-tier references with their locations: snake_case names,
/// plus Input-tagged names that some action produces (single-word targets).
struct RefCollector<'t> {
    targets: &'t HashSet<String>,
    refs: Vec<(String, Option<SourceLocation>)>,
}

impl AstVisitor for RefCollector<'_> {
    fn visit_expression(&mut self, expr: &Expression) {
        if let Expression::Variable {
            name,
            kind,
            location,
        } = expr
        {
            let computed = *kind == NameKind::Computed
                || (*kind == NameKind::Input && self.targets.contains(name));
            if computed {
                self.refs.push((name.clone(), *location));
            }
        }
        crate::ast::walk_expression(self, expr);
    }
}

fn computed_refs_in_condition(
    condition: &Condition,
    targets: &HashSet<String>,
) -> Vec<(String, Option<SourceLocation>)> {
    let mut collector = RefCollector {
        targets,
        refs: Vec::new(),
    };
    collector.visit_condition(condition);
    collector.refs
}

fn computed_refs_in_expression(
    expr: &Expression,
    targets: &HashSet<String>,
) -> Vec<(String, Option<SourceLocation>)> {
    let mut collector = RefCollector {
        targets,
        refs: Vec::new(),
    };
    collector.visit_expression(expr);
    collector.refs
}

// ============================================
// Circular dependencies
// ============================================

pub fn run_cycles(rule_set: &RuleSet, issues: &mut Vec<ValidationIssue>) {
    // target -> computed names referenced by its producing expression
    let mut graph: HashMap<String, Vec<String>> = HashMap::new();
    let targets = computed_like_targets(rule_set);

    struct EdgeCollector<'g> {
        graph: &'g mut HashMap<String, Vec<String>>,
        targets: &'g HashSet<String>,
    }

    impl AstVisitor for EdgeCollector<'_> {
        fn visit_action(&mut self, action: &Action) {
            match action {
                Action::Set { target, value, .. } => {
                    let refs = computed_refs_in_expression(value, self.targets);
                    self.graph
                        .entry(target.clone())
                        .or_default()
                        .extend(refs.into_iter().map(|(name, _)| name));
                }
                Action::Calculate {
                    target, expression, ..
                } => {
                    let refs = computed_refs_in_expression(expression, self.targets);
                    self.graph
                        .entry(target.clone())
                        .or_default()
                        .extend(refs.into_iter().map(|(name, _)| name));
                }
                _ => {}
            }
            crate::ast::walk_action(self, action);
        }
    }

    let mut collector = EdgeCollector {
        graph: &mut graph,
        targets: &targets,
    };
    rule_set.visit(&mut collector);

    // Iterative-deepening DFS with an explicit path for cycle reporting.
    let mut visited: HashSet<String> = HashSet::new();
    let mut targets: Vec<&String> = graph.keys().collect();
    targets.sort();

    for start in targets {
        if visited.contains(start.as_str()) {
            continue;
        }
        let mut path: Vec<String> = Vec::new();
        let mut on_path: HashSet<String> = HashSet::new();
        if let Some(cycle) = dfs(start, &graph, &mut visited, &mut path, &mut on_path) {
            issues.push(
                ValidationIssue::new(
                    "CYC_001",
                    Severity::Critical,
                    format!("Circular dependency: {}", cycle.join(" -> ")),
                    "Computed variables form a reference cycle; no evaluation order can \
                     satisfy it.",
                )
                .with_suggestion("break the cycle by computing one of these values from inputs only"),
            );
        }
    }
}

fn dfs(
    node: &str,
    graph: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
    on_path: &mut HashSet<String>,
) -> Option<Vec<String>> {
    if on_path.contains(node) {
        // Close the loop for the report: a -> b -> a.
        let start = path.iter().position(|n| n == node).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].to_vec();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if visited.contains(node) {
        return None;
    }
    visited.insert(node.to_string());
    on_path.insert(node.to_string());
    path.push(node.to_string());

    if let Some(children) = graph.get(node) {
        for child in children {
            if let Some(cycle) = dfs(child, graph, visited, path, on_path) {
                return Some(cycle);
            }
        }
    }

    path.pop();
    on_path.remove(node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn order_issues(source: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        run_order(&parse_document(source).rule_set.unwrap(), &mut issues);
        issues
    }

    fn cycle_issues(source: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        run_cycles(&parse_document(source).rule_set.unwrap(), &mut issues);
        issues
    }

    #[test]
    fn test_reference_before_production() {
        let issues = order_issues(
            r#"
name: order
inputs: [monthlyDebt, monthlyIncome]
when: [debt_ratio less_than 0.4]
then: [calculate debt_ratio as monthlyDebt / monthlyIncome]
"#,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "DEP_002");
        assert!(issues[0].message.contains("debt_ratio"));
    }

    #[test]
    fn test_derived_names_are_allowed_unproduced() {
        let issues = order_issues(
            r#"
name: derived_ok
inputs: [monthlyDebtPayments, monthlyIncome]
when: [debt_to_income less_than 0.4]
then: [set ok to true]
"#,
        );
        assert!(issues.is_empty(), "issues: {:?}", issues);
    }

    #[test]
    fn test_single_word_target_is_order_checked() {
        // `eligible` classifies as Input when referenced, but an action
        // produces it, so the early reference is still a dependency error.
        let issues = order_issues(
            r#"
name: single_word
inputs: [creditScore]
when: [eligible == true]
then: [set eligible to true]
"#,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "DEP_002");
        assert!(issues[0].message.contains("eligible"));
    }

    #[test]
    fn test_declared_input_that_is_also_a_target_is_clean() {
        // `score` resolves from the input tier before the shadowing set.
        let issues = order_issues(
            r#"
name: shadowed_input
inputs: [score]
when: [score at_least 0]
then:
  - set score to 999
  - calculate echoed_score as score
"#,
        );
        assert!(issues.is_empty(), "issues: {:?}", issues);
    }

    #[test]
    fn test_explicitly_produced_derived_name_is_order_checked() {
        // debt_to_income would normally derive, but this rule produces it
        // in then:, so the when: reference precedes its production.
        let issues = order_issues(
            r#"
name: derived_shadowed
inputs: [monthlyDebt, monthlyIncome]
when: [debt_to_income less_than 0.4]
then: [calculate debt_to_income as monthlyDebt / monthlyIncome]
"#,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "DEP_002");
        assert!(issues[0].message.contains("debt_to_income"));
    }

    #[test]
    fn test_production_then_reference_is_clean() {
        let issues = order_issues(
            r#"
name: ordered
inputs: [amount]
when: [amount at_least 0]
then:
  - calculate base_fee as amount * 0.01
  - calculate total_fee as base_fee + 5
"#,
        );
        assert!(issues.is_empty(), "issues: {:?}", issues);
    }

    #[test]
    fn test_later_sub_rules_see_earlier_products() {
        let issues = order_issues(
            r#"
name: chained
inputs: [a]
rules:
  - when: [a > 0]
    then: [set score_band to "HIGH"]
  - when: [score_band == "HIGH"]
    then: [set ok to true]
"#,
        );
        assert!(issues.is_empty(), "issues: {:?}", issues);
    }

    #[test]
    fn test_cycle_detection_with_path() {
        let issues = cycle_issues(
            r#"
name: cyclic
inputs: [a]
when: [a > 0]
then:
  - calculate first_value as second_value + 1
  - calculate second_value as first_value + 1
"#,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "CYC_001");
        assert!(issues[0].message.contains("first_value"));
        assert!(issues[0].message.contains("second_value"));
    }

    #[test]
    fn test_cycle_through_single_word_names() {
        let issues = cycle_issues(
            r#"
name: single_word_cycle
inputs: [a]
when: [a > 0]
then:
  - set alpha to beta
  - set beta to alpha
"#,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "CYC_001");
        assert!(issues[0].message.contains("alpha"));
        assert!(issues[0].message.contains("beta"));
    }

    #[test]
    fn test_self_reference_cycle() {
        let issues = cycle_issues(
            r#"
name: self_cycle
inputs: [a]
when: [a > 0]
then: [calculate running_total as running_total + a]
"#,
        );
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("running_total -> running_total"));
    }
}
