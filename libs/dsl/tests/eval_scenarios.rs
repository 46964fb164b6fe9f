//! End-to-end evaluation scenarios through the public engine API.

use arbiter_dsl::{
    BatchOptions, BatchRequest, Engine, EvalOptions, MemoryConstantStore, Value,
};
use std::sync::Arc;

fn inputs(json: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match json {
        serde_json::Value::Object(map) => map,
        other => panic!("inputs must be an object, got {:?}", other),
    }
}

const SIMPLE_APPROVAL: &str = r#"
name: simple_approval
description: Credit approval with income floor
inputs: [creditScore, annualIncome]
when:
  - creditScore at_least 700
  - annualIncome at_least 50000
then:
  - set eligible to true
  - set tier to "STANDARD"
else:
  - set eligible to false
output:
  eligible: boolean
  tier: text
"#;

#[tokio::test]
async fn scenario_simple_approval() {
    let engine = Engine::new();
    let response = engine
        .evaluate(
            SIMPLE_APPROVAL,
            inputs(serde_json::json!({"creditScore": 720, "annualIncome": 75000})),
            &EvalOptions::default(),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    assert!(response.condition_result);
    assert_eq!(response.output["eligible"], serde_json::json!(true));
    assert_eq!(response.output["tier"], serde_json::json!("STANDARD"));
    assert!(!response.circuit_breaker_triggered);
}

#[tokio::test]
async fn scenario_constant_lookup() {
    let source = SIMPLE_APPROVAL.replace("700", "MIN_CREDIT_SCORE");
    let store = MemoryConstantStore::new().with("MIN_CREDIT_SCORE", serde_json::json!(650));
    let engine = Engine::new().with_constant_store(Arc::new(store));

    let response = engine
        .evaluate(
            &source,
            inputs(serde_json::json!({"creditScore": 660, "annualIncome": 75000})),
            &EvalOptions::default(),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    assert!(response.condition_result);
}

#[tokio::test]
async fn scenario_order_of_operations_error() {
    let engine = Engine::new();
    let compiled = engine.compile(
        r#"
name: out_of_order
description: uses debt_to_income before computing it
inputs: [monthlyDebt, monthlyIncome]
when:
  - debt_to_income less_than 0.4
then:
  - calculate debt_to_income as monthlyDebt / monthlyIncome
output:
  debt_to_income: number
"#,
    );

    let report = compiled.validation.as_ref().expect("validation ran");
    let issue = report
        .issues
        .iter()
        .find(|i| i.code == "DEP_002")
        .expect("DEP_002 reported");
    assert!(issue.message.contains("debt_to_income"));
    assert!(!compiled.is_evaluable());

    // Evaluation never runs.
    let response = engine
        .evaluate_compiled(
            &compiled,
            inputs(serde_json::json!({"monthlyDebt": 1, "monthlyIncome": 2})),
            &EvalOptions::default(),
        )
        .await;
    assert!(!response.success);
    assert!(response.output.is_empty());
}

#[tokio::test]
async fn scenario_circuit_breaker() {
    let engine = Engine::new();
    let response = engine
        .evaluate(
            r#"
name: breaker_rule
description: trips mid-action-list
inputs: [riskScore]
when: [riskScore at_least 90]
then:
  - set tier to "X"
  - circuit_breaker: {trigger: true, message: "risk too high"}
  - set follow_up to true
output:
  tier: text
"#,
            inputs(serde_json::json!({"riskScore": 95})),
            &EvalOptions::default(),
        )
        .await;

    assert!(response.success);
    assert!(response.circuit_breaker_triggered);
    assert_eq!(
        response.circuit_breaker_message.as_deref(),
        Some("risk too high")
    );
    assert_eq!(response.output["tier"], serde_json::json!("X"));
    assert!(
        !response.output.contains_key("follow_up"),
        "no action after the trip may be observable"
    );
}

#[tokio::test]
async fn scenario_arithmetic_with_constant_is_exact() {
    let store = MemoryConstantStore::new().with("RISK_MULTIPLIER", serde_json::json!(1.25));
    let engine = Engine::new().with_constant_store(Arc::new(store));

    let response = engine
        .evaluate(
            r#"
name: exact_arithmetic
description: decimal, not float
inputs: [monthlyDebtPayments, monthlyIncome]
when: [debt_to_income is_not_null]
then:
  - calculate risk_factor as debt_to_income * RISK_MULTIPLIER
output:
  risk_factor: number
"#,
            inputs(serde_json::json!({"monthlyDebtPayments": 2000, "monthlyIncome": 5000})),
            &EvalOptions::default(),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    // 0.4 * 1.25 is exactly 0.5 in decimal arithmetic.
    assert_eq!(response.output["risk_factor"], serde_json::json!(0.5));
}

#[tokio::test]
async fn scenario_routing_number_validation() {
    let engine = Engine::new();
    let response = engine
        .evaluate(
            r#"
name: routing_check
description: ABA checksum
inputs: [routingNumber]
when: [true]
then:
  - calculate routing_valid as is_routing_number(routingNumber)
output:
  routing_valid: boolean
"#,
            inputs(serde_json::json!({"routingNumber": "021000021"})),
            &EvalOptions::default(),
        )
        .await;
    assert!(response.success);
    assert_eq!(response.output["routing_valid"], serde_json::json!(true));

    let response = engine
        .evaluate(
            r#"
name: routing_check
description: ABA checksum
inputs: [routingNumber]
when: [true]
then:
  - calculate routing_valid as is_routing_number(routingNumber)
output:
  routing_valid: boolean
"#,
            inputs(serde_json::json!({"routingNumber": "021000020"})),
            &EvalOptions::default(),
        )
        .await;
    assert_eq!(response.output["routing_valid"], serde_json::json!(false));
}

#[tokio::test]
async fn structured_conditions_form_evaluates() {
    let engine = Engine::new();
    let response = engine
        .evaluate(
            r#"
name: structured_form
description: explicit compare nodes
inputs: [creditScore, annualIncome]
conditions:
  if:
    and:
      - compare: {left: creditScore, operator: at_least, right: 700}
      - compare: {left: annualIncome, operator: ">", right: 50000}
  then:
    - set approved to true
  else:
    - set approved to false
output:
  approved: boolean
"#,
            inputs(serde_json::json!({"creditScore": 710, "annualIncome": 60000})),
            &EvalOptions::default(),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    assert!(response.condition_result);
    assert_eq!(response.output["approved"], serde_json::json!(true));
}

#[tokio::test]
async fn batch_evaluation_with_priorities() {
    let high = r#"
name: high_priority
description: runs first under sort_by_priority
metadata:
  priority: 10
inputs: [a]
when: [a > 0]
then: [set ok to true]
output: {ok: boolean}
"#;
    let low = r#"
name: low_priority
description: runs later under sort_by_priority
metadata:
  priority: 1
inputs: [a]
when: [a > 0]
then: [set ok to true]
output: {ok: boolean}
"#;

    let engine = Engine::new();
    let outcome = engine
        .evaluate_batch(
            vec![
                BatchRequest {
                    source: low.to_string(),
                    inputs: inputs(serde_json::json!({"a": 1})),
                },
                BatchRequest {
                    source: high.to_string(),
                    inputs: inputs(serde_json::json!({"a": 1})),
                },
            ],
            &BatchOptions {
                sort_by_priority: true,
                max_concurrency: 1,
                ..Default::default()
            },
        )
        .await;

    assert!(!outcome.timed_out);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 0);
    // Responses stay aligned with the request order regardless of dispatch.
    assert!(outcome.responses[0].as_ref().unwrap().success);
    assert!(outcome.responses[1].as_ref().unwrap().success);
}

#[tokio::test]
async fn computed_tier_shadows_input() {
    // Lookup precedence is strict: computed > input > constant.
    let engine = Engine::new();
    let response = engine
        .evaluate(
            r#"
name: shadowing
description: computed wins after set
inputs: [score]
when: [score at_least 0]
then:
  - set score to 999
  - calculate echoed_score as score
output:
  echoed_score: number
"#,
            inputs(serde_json::json!({"score": 5})),
            &EvalOptions::default(),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    assert_eq!(response.output["echoed_score"], serde_json::json!(999));
}

#[tokio::test]
async fn infinity_sentinel_serializes() {
    let engine = Engine::new();
    let response = engine
        .evaluate(
            r#"
name: sentinel
description: zero-denominator ratio
inputs: [creditUsed, creditLimit]
when: [credit_utilization is_positive]
then: [set flagged to true]
output: {flagged: boolean}
"#,
            inputs(serde_json::json!({"creditUsed": 100, "creditLimit": 0})),
            &EvalOptions::default(),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    assert!(response.condition_result);
    assert_eq!(response.output["flagged"], serde_json::json!(true));
    let _ = Value::Infinity; // sentinel type stays exported
}
