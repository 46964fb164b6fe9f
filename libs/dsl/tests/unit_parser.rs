//! Parser integration tests: the three surface forms and error collection.

use arbiter_dsl::ast::{Action, CompareOp, Condition, Expression, LogicalOp, RuleBody};
use arbiter_dsl::parser::{parse_document, DiagnosticSeverity, ExpressionParser};
use arbiter_dsl::Value;

#[test]
fn simplified_and_structured_forms_agree() {
    let simplified = parse_document(
        r#"
name: form_a
inputs: [creditScore]
when: [creditScore at_least 700]
then: [set approved to true]
else: [set approved to false]
"#,
    )
    .rule_set
    .unwrap();

    let structured = parse_document(
        r#"
name: form_b
inputs: [creditScore]
conditions:
  if:
    compare: {left: creditScore, operator: at_least, right: 700}
  then:
    - set: {target: approved, value: true}
  else:
    - set: {target: approved, value: false}
"#,
    )
    .rule_set
    .unwrap();

    let simplified_condition = match &simplified.body {
        RuleBody::WhenThen { when, .. } => &when[0],
        other => panic!("unexpected body: {:?}", other),
    };
    let structured_condition = match &structured.body {
        RuleBody::Conditions { condition, .. } => condition,
        other => panic!("unexpected body: {:?}", other),
    };

    // Same comparison, regardless of surface form (locations differ).
    match (simplified_condition, structured_condition) {
        (
            Condition::Comparison { op: op_a, left: left_a, .. },
            Condition::Comparison { op: op_b, left: left_b, .. },
        ) => {
            assert_eq!(op_a, op_b);
            assert_eq!(
                matches!(left_a, Expression::Variable { name, .. } if name == "creditScore"),
                matches!(left_b, Expression::Variable { name, .. } if name == "creditScore"),
            );
        }
        other => panic!("unexpected conditions: {:?}", other),
    }
}

#[test]
fn structured_not_and_nested_or() {
    let outcome = parse_document(
        r#"
name: nesting
inputs: [a, b]
conditions:
  if:
    not:
      or:
        - compare: {left: a, operator: "<", right: 0}
        - compare: {left: b, operator: "<", right: 0}
  then:
    - set non_negative to true
"#,
    );
    assert!(!outcome.has_errors(), "diagnostics: {:?}", outcome.diagnostics);
    match outcome.rule_set.unwrap().body {
        RuleBody::Conditions { condition, .. } => match condition {
            Condition::Logical { op: LogicalOp::Not, children, .. } => {
                assert!(matches!(
                    &children[0],
                    Condition::Logical { op: LogicalOp::Or, .. }
                ));
            }
            other => panic!("unexpected condition: {:?}", other),
        },
        other => panic!("unexpected body: {:?}", other),
    }
}

#[test]
fn arithmetic_node_folds_operands() {
    let outcome = parse_document(
        r#"
name: arithmetic_form
inputs: [a, b, c]
conditions:
  if:
    compare:
      left:
        arithmetic: {operator: add, operands: [a, b, c]}
      operator: ">"
      right: 10
  then:
    - set over_limit to true
"#,
    );
    assert!(!outcome.has_errors(), "diagnostics: {:?}", outcome.diagnostics);
}

#[test]
fn sub_rules_keep_declared_order() {
    let outcome = parse_document(
        r#"
name: ordered_rules
inputs: [x]
rules:
  - name: alpha
    when: [x > 0]
    then: [set stage_one to true]
  - name: beta
    when: [stage_one == true]
    then: [set stage_two to true]
  - name: gamma
    then: [set always_runs to true]
"#,
    );
    assert!(!outcome.has_errors(), "diagnostics: {:?}", outcome.diagnostics);
    match outcome.rule_set.unwrap().body {
        RuleBody::Rules(rules) => {
            let names: Vec<Option<&str>> = rules.iter().map(|r| r.name.as_deref()).collect();
            assert_eq!(names, [Some("alpha"), Some("beta"), Some("gamma")]);
            assert!(rules[2].condition.is_none());
        }
        other => panic!("unexpected body: {:?}", other),
    }
}

#[test]
fn error_collection_does_not_stop_at_first() {
    let outcome = parse_document(
        r#"
name: many_errors
inputs: [a, BAD_INPUT, b]
when:
  - a >
  - b at_least
  - a ??
then:
  - set Goodname to 1
  - set fine_value to 2
"#,
    );
    let errors: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .collect();
    assert!(errors.len() >= 4, "diagnostics: {:?}", outcome.diagnostics);

    // The good action still made it into the partial AST.
    match outcome.rule_set.unwrap().body {
        RuleBody::WhenThen { then_actions, .. } => {
            assert!(then_actions.iter().any(
                |a| matches!(a, Action::Set { target, .. } if target == "fine_value")
            ));
        }
        other => panic!("unexpected body: {:?}", other),
    }
}

#[test]
fn diagnostics_carry_positions_for_inline_errors() {
    let outcome = parse_document(
        r#"
name: located
inputs: [a]
when:
  - a at_least @
then: [set ok to true]
"#,
    );
    let diagnostic = outcome
        .diagnostics
        .iter()
        .find(|d| d.severity == DiagnosticSeverity::Error)
        .expect("an error diagnostic");
    let location = diagnostic.location.expect("inline errors carry a location");
    assert_eq!(location.column, 12);
}

#[test]
fn word_operator_aliases_parse_to_symbols() {
    for (alias, op) in [
        ("at_least", CompareOp::GreaterThanOrEqual),
        ("greater_than", CompareOp::GreaterThan),
        ("less_than", CompareOp::LessThan),
        ("equals", CompareOp::Equal),
    ] {
        let condition =
            ExpressionParser::parse_condition_string(&format!("amount {} 5", alias)).unwrap();
        match condition {
            Condition::Comparison { op: parsed, .. } => assert_eq!(parsed, op),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

#[test]
fn inline_constants_become_literals() {
    let outcome = parse_document(
        r#"
name: typed_constants
inputs: [a]
constants:
  - name: LIMITS
    type: OBJECT
    value:
      floor: 10
      ceiling: 90
when: [a at_least 1]
then: [set ok to true]
"#,
    );
    assert!(!outcome.has_errors());
    let rule_set = outcome.rule_set.unwrap();
    match &rule_set.constants[0].value {
        Value::Map(fields) => {
            assert_eq!(fields.get("floor"), Some(&Value::int(10)));
            assert_eq!(fields.get("ceiling"), Some(&Value::int(90)));
        }
        other => panic!("unexpected constant value: {:?}", other),
    }
}
