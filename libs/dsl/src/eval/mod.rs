//! Tree-walking evaluator.
//!
//! The walk itself is a plain recursive traversal; the only suspension
//! points are constant loading (before the walk starts) and the HTTP
//! built-ins. Recursion goes through boxed futures so the async functions
//! can call themselves; the context's depth guard bounds the nesting.

pub mod compare;
pub mod derived;

use crate::ast::{
    Action, BinaryOp, Condition, Expression, LogicalOp, NameKind, RuleBody, RuleSet, UnaryOp,
};
use crate::constants::{resolve_constants, ConstantStore};
use crate::context::EvaluationContext;
use crate::error::{Error, Result};
use crate::functions::{self, json_path, FunctionGroup};
use crate::transport::HttpTransport;
use crate::value::Value;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Per-evaluation options.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Wall-clock budget for the whole evaluation.
    pub timeout: Duration,
    /// Independent per-call budget for HTTP built-ins.
    pub http_timeout: Duration,
    /// Correlation identifier; generated when absent.
    pub operation_id: Option<String>,
    /// When true, a declared input missing from the request fails with
    /// `MISSING_INPUT` instead of resolving to Null.
    pub require_inputs: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            http_timeout: Duration::from_secs(10),
            operation_id: None,
            require_inputs: false,
        }
    }
}

/// The evaluate response wire shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EvaluateResponse {
    pub success: bool,
    pub condition_result: bool,
    pub output: IndexMap<String, serde_json::Value>,
    pub circuit_breaker_triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl EvaluateResponse {
    fn failure(error: &Error, started: std::time::Instant) -> Self {
        let mut message = error.to_string();
        if let Some(location) = error.location() {
            message.push_str(&format!(" ({})", location));
        }
        Self {
            success: false,
            condition_result: false,
            output: IndexMap::new(),
            circuit_breaker_triggered: false,
            circuit_breaker_message: None,
            error: Some(message),
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Evaluate a parsed rule set against caller inputs.
///
/// Constants resolve before the walk begins; the walk owns the context
/// exclusively until it returns.
pub async fn evaluate_rule_set(
    rule_set: &RuleSet,
    inputs: serde_json::Map<String, serde_json::Value>,
    store: Option<&dyn ConstantStore>,
    transport: Option<Arc<dyn HttpTransport>>,
    options: &EvalOptions,
) -> EvaluateResponse {
    let operation_id = options
        .operation_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut ctx = EvaluationContext::new(operation_id);
    let started = ctx.started_at;

    let declared: HashSet<&str> = rule_set.inputs.iter().map(|i| i.name.as_str()).collect();
    for (name, value) in &inputs {
        if !declared.contains(name.as_str()) {
            tracing::warn!(
                operation_id = %ctx.operation_id,
                input = %name,
                "request supplied an undeclared input"
            );
        }
        ctx.set_input(name.clone(), Value::from_json(value));
    }
    for declared_input in &rule_set.inputs {
        if !ctx.has_input(&declared_input.name) {
            if options.require_inputs {
                return EvaluateResponse::failure(
                    &Error::MissingInput(declared_input.name.clone()),
                    started,
                );
            }
            tracing::warn!(
                operation_id = %ctx.operation_id,
                input = %declared_input.name,
                "declared input missing from request; it will resolve to null"
            );
        }
    }

    if let Err(err) = resolve_constants(rule_set, store, &mut ctx).await {
        return EvaluateResponse::failure(&err, started);
    }

    let mut evaluator = Evaluator {
        ctx: &mut ctx,
        transport,
        http_timeout: options.http_timeout,
    };
    let condition_result = match evaluator.run_rule_set(rule_set).await {
        Ok(result) => result,
        Err(err) => return EvaluateResponse::failure(&err, started),
    };

    EvaluateResponse {
        success: true,
        condition_result,
        output: build_output(rule_set, &ctx),
        circuit_breaker_triggered: ctx.circuit_breaker_triggered(),
        circuit_breaker_message: ctx.circuit_breaker_message().map(str::to_string),
        error: None,
        execution_time_ms: started.elapsed().as_millis() as u64,
    }
}

/// Project the declared output map, then union the full computed tier.
fn build_output(rule_set: &RuleSet, ctx: &EvaluationContext) -> IndexMap<String, serde_json::Value> {
    let mut output = IndexMap::new();
    for (key, target) in &rule_set.output {
        if let Some(value) = ctx.computed().get(target) {
            output.insert(key.clone(), value.to_json());
        } else if let Some(value) = ctx.computed().get(key) {
            // A type tag: emit whatever computed variable shares the key name.
            output.insert(key.clone(), value.to_json());
        }
    }
    for (name, value) in ctx.computed() {
        if !output.contains_key(name) {
            output.insert(name.clone(), value.to_json());
        }
    }
    output
}

/// Short-lived walker over one rule set; owns the context for the duration.
pub struct Evaluator<'a> {
    ctx: &'a mut EvaluationContext,
    transport: Option<Arc<dyn HttpTransport>>,
    http_timeout: Duration,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a mut EvaluationContext, transport: Option<Arc<dyn HttpTransport>>) -> Self {
        Self {
            ctx,
            transport,
            http_timeout: Duration::from_secs(10),
        }
    }

    // ============================================
    // Rule-set dispatch
    // ============================================

    pub async fn run_rule_set(&mut self, rule_set: &RuleSet) -> Result<bool> {
        let condition_result = match &rule_set.body {
            RuleBody::WhenThen {
                when,
                then_actions,
                else_actions,
            } => {
                let mut all = true;
                for condition in when {
                    if !self.eval_condition(condition).await? {
                        all = false;
                        break;
                    }
                }
                if all {
                    self.run_actions(then_actions).await?;
                } else {
                    self.run_actions(else_actions).await?;
                }
                all
            }
            RuleBody::Conditions {
                condition,
                then_actions,
                else_actions,
            } => {
                let result = self.eval_condition(condition).await?;
                if result {
                    self.run_actions(then_actions).await?;
                } else {
                    self.run_actions(else_actions).await?;
                }
                result
            }
            RuleBody::Rules(rules) => {
                let mut first_result = true;
                for (index, rule) in rules.iter().enumerate() {
                    if self.ctx.circuit_breaker_triggered() {
                        break;
                    }
                    let matched = match &rule.condition {
                        Some(condition) => self.eval_condition(condition).await?,
                        None => true,
                    };
                    if index == 0 {
                        first_result = matched;
                    }
                    if matched {
                        self.run_actions(&rule.then_actions).await?;
                    } else {
                        self.run_actions(&rule.else_actions).await?;
                    }
                }
                first_result
            }
        };

        // RuleSet-level breaker config: consulted after the main block, and
        // only if no circuit_breaker action already tripped (actions win).
        if let Some(config) = &rule_set.circuit_breaker {
            if config.enabled && !self.ctx.circuit_breaker_triggered() {
                if let Some(condition) = &config.condition {
                    if self.eval_condition(condition).await? {
                        self.ctx.trip_circuit_breaker(
                            config
                                .message
                                .clone()
                                .unwrap_or_else(|| "Circuit breaker triggered".to_string()),
                        );
                    }
                }
            }
        }

        Ok(condition_result)
    }

    // ============================================
    // Actions
    // ============================================

    /// Run actions in source order. Nothing executes after a breaker trip.
    pub async fn run_actions(&mut self, actions: &[Action]) -> Result<()> {
        for action in actions {
            if self.ctx.circuit_breaker_triggered() {
                break;
            }
            self.run_action(action).await?;
        }
        Ok(())
    }

    fn run_action<'b>(&'b mut self, action: &'b Action) -> BoxFuture<'b, Result<()>> {
        Box::pin(async move {
            match action {
                Action::Set { target, value, .. } => {
                    let value = self.eval_expression(value).await?;
                    tracing::debug!(
                        operation_id = %self.ctx.operation_id,
                        target = %target,
                        "set"
                    );
                    self.ctx.set_computed(target.clone(), value);
                }
                Action::Calculate {
                    target, expression, ..
                } => {
                    let value = self.eval_expression(expression).await?;
                    tracing::debug!(
                        operation_id = %self.ctx.operation_id,
                        target = %target,
                        "calculate"
                    );
                    self.ctx.set_computed(target.clone(), value);
                }
                Action::Call { name, args, .. } => {
                    let call = Expression::FunctionCall {
                        name: name.clone(),
                        args: args.clone(),
                        location: action.location(),
                    };
                    self.eval_expression(&call).await?;
                }
                Action::Conditional {
                    condition,
                    then_actions,
                    else_actions,
                    ..
                } => {
                    if self.eval_condition(condition).await? {
                        self.run_actions(then_actions).await?;
                    } else {
                        self.run_actions(else_actions).await?;
                    }
                }
                Action::CircuitBreaker {
                    condition, message, ..
                } => {
                    let trip = match condition {
                        Some(expr) => self.eval_expression(expr).await?.truthy(),
                        None => true,
                    };
                    if trip {
                        tracing::warn!(
                            operation_id = %self.ctx.operation_id,
                            message = %message,
                            "circuit breaker tripped"
                        );
                        self.ctx.trip_circuit_breaker(message.clone());
                    }
                }
            }
            Ok(())
        })
    }

    // ============================================
    // Conditions
    // ============================================

    pub fn eval_condition<'b>(&'b mut self, condition: &'b Condition) -> BoxFuture<'b, Result<bool>> {
        Box::pin(async move {
            match condition {
                Condition::Comparison {
                    left, op, right, ..
                } => {
                    let left = self.eval_expression(left).await?;
                    let right = match right {
                        Some(expr) => Some(self.eval_expression(expr).await?),
                        None => None,
                    };
                    compare::apply(*op, &left, right.as_ref())
                }
                Condition::Logical { op, children, .. } => match op {
                    LogicalOp::And => {
                        for child in children {
                            if !self.eval_condition(child).await? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    LogicalOp::Or => {
                        for child in children {
                            if self.eval_condition(child).await? {
                                return Ok(true);
                            }
                        }
                        Ok(false)
                    }
                    LogicalOp::Not => Ok(!self.eval_condition(&children[0]).await?),
                },
                Condition::Expr { expr } => Ok(self.eval_expression(expr).await?.truthy()),
            }
        })
    }

    // ============================================
    // Expressions
    // ============================================

    pub fn eval_expression<'b>(&'b mut self, expr: &'b Expression) -> BoxFuture<'b, Result<Value>> {
        Box::pin(async move {
            self.ctx.enter()?;
            let result = self.eval_expression_inner(expr).await;
            self.ctx.leave();
            result
        })
    }

    async fn eval_expression_inner(&mut self, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Literal { value, .. } => Ok(value.clone()),

            Expression::Variable { name, kind, .. } => {
                if let Some(value) = self.ctx.lookup(name) {
                    return Ok(value.clone());
                }
                if derived::is_derived(name) {
                    return Ok(derived::compute(name, self.ctx));
                }
                match kind {
                    NameKind::Constant => Err(Error::UndefinedConstant(name.clone())),
                    // Unresolved inputs and computed names resolve to Null;
                    // rules test for null explicitly where it matters.
                    _ => Ok(Value::Null),
                }
            }

            Expression::Binary {
                op, left, right, ..
            } => {
                if *op == BinaryOp::NullCoalesce {
                    let left = self.eval_expression(left).await?;
                    if !left.is_null() {
                        return Ok(left);
                    }
                    return self.eval_expression(right).await;
                }
                let left = self.eval_expression(left).await?;
                let right = self.eval_expression(right).await?;
                binary_arithmetic(*op, left, right)
            }

            Expression::Unary { op, operand, .. } => {
                let value = self.eval_expression(operand).await?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Negate => value
                        .as_decimal()
                        .map(|d| Value::Number(-d))
                        .ok_or_else(|| {
                            Error::Type(format!("cannot negate {}", value.type_name()))
                        }),
                }
            }

            Expression::FunctionCall { name, args, .. } => {
                let Some(meta) = functions::lookup(name) else {
                    return Err(Error::UnknownFunction(name.clone()));
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expression(arg).await?);
                }
                if meta.group == FunctionGroup::Http {
                    functions::check_arity(meta, values.len())?;
                    let Some(transport) = self.transport.clone() else {
                        return Ok(functions::http::no_transport_map());
                    };
                    return functions::http::call(
                        name,
                        &values,
                        transport.as_ref(),
                        self.http_timeout,
                        &self.ctx.operation_id,
                    )
                    .await;
                }
                functions::dispatch_sync(meta, &values)
            }

            Expression::JsonPath { object, path, .. } => {
                let object = self.eval_expression(object).await?;
                Ok(json_path::resolve_path(&object, path))
            }

            Expression::Conditional {
                condition,
                then_value,
                else_value,
                ..
            } => {
                if self.eval_condition(condition).await? {
                    self.eval_expression(then_value).await
                } else {
                    self.eval_expression(else_value).await
                }
            }

            Expression::ListLiteral { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval_expression(element).await?);
                }
                Ok(Value::List(items))
            }
        }
    }
}

/// Arithmetic over evaluated operands. The infinity sentinel saturates
/// through additive and multiplicative operators instead of erroring.
fn binary_arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    if matches!(left, Value::Infinity) || matches!(right, Value::Infinity) {
        return match op {
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Power => {
                Ok(Value::Infinity)
            }
            BinaryOp::Divide => {
                if matches!(left, Value::Infinity) && !matches!(right, Value::Infinity) {
                    Ok(Value::Infinity)
                } else if matches!(right, Value::Infinity) && !matches!(left, Value::Infinity) {
                    Ok(Value::int(0))
                } else {
                    Err(Error::Type("cannot divide infinity by infinity".into()))
                }
            }
            BinaryOp::Modulo => Err(Error::Type("cannot take modulo of infinity".into())),
            BinaryOp::NullCoalesce => unreachable!("coalesce handled before arithmetic"),
        };
    }

    let name = match op {
        BinaryOp::Add => "add",
        BinaryOp::Subtract => "subtract",
        BinaryOp::Multiply => "multiply",
        BinaryOp::Divide => "divide",
        BinaryOp::Modulo => "modulo",
        BinaryOp::Power => "power",
        BinaryOp::NullCoalesce => unreachable!("coalesce handled before arithmetic"),
    };
    functions::math::dispatch(name, &[left, right])
}
