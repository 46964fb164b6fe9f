//! Structured parse: YAML tree to [`RuleSet`].

use super::expression::{to_camel_case, ExpressionParser};
use super::{ParseDiagnostic, ParseOutcome, MAX_DIAGNOSTICS};
use crate::ast::{
    Action, CircuitBreakerConfig, CompareOp, Condition, Expression, InlineConstant, InputDecl,
    NameKind, RuleBody, RuleMetadata, RuleSet, SubRule,
};
use crate::value::Value;
use indexmap::IndexMap;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_yaml::Value as Yaml;

/// Parse a YAML rule document. Diagnostics are collected, not thrown; the
/// returned AST is partial when entries failed to parse.
pub fn parse_document(source: &str) -> ParseOutcome {
    let yaml: Yaml = match serde_yaml::from_str(source) {
        Ok(yaml) => yaml,
        Err(err) => {
            let mut diagnostic =
                ParseDiagnostic::error("PARSE_001", format!("Invalid YAML: {}", err));
            if let Some(location) = err.location() {
                diagnostic.location = Some(crate::ast::SourceLocation::new(
                    location.line(),
                    location.column(),
                    1,
                ));
            }
            return ParseOutcome {
                rule_set: None,
                diagnostics: vec![diagnostic],
            };
        }
    };

    let Yaml::Mapping(_) = yaml else {
        return ParseOutcome {
            rule_set: None,
            diagnostics: vec![ParseDiagnostic::error(
                "PARSE_002",
                "Rule document must be a YAML mapping",
            )],
        };
    };

    let mut parser = DocumentParser {
        diagnostics: Vec::new(),
    };
    let rule_set = parser.parse_rule_set(&yaml);
    ParseOutcome {
        rule_set: Some(rule_set),
        diagnostics: parser.diagnostics,
    }
}

struct DocumentParser {
    diagnostics: Vec<ParseDiagnostic>,
}

impl DocumentParser {
    fn push(&mut self, diagnostic: ParseDiagnostic) {
        if self.diagnostics.len() < MAX_DIAGNOSTICS {
            self.diagnostics.push(diagnostic);
        }
    }

    fn parse_rule_set(&mut self, yaml: &Yaml) -> RuleSet {
        let name = str_field(yaml, "name").unwrap_or_default();
        let description = str_field(yaml, "description");
        let version = str_field(yaml, "version");
        let metadata = self.parse_metadata(yaml.get("metadata"));
        let inputs = self.parse_inputs(yaml.get("inputs"));
        let constants = self.parse_constants(yaml.get("constants"));
        let output = self.parse_output(yaml.get("output"));
        let circuit_breaker = self.parse_circuit_breaker(yaml.get("circuit_breaker"));

        let mut surface_forms = Vec::new();
        if yaml.get("conditions").is_some() {
            surface_forms.push("conditions");
        }
        if yaml.get("when").is_some() {
            surface_forms.push("when");
        }
        if yaml.get("rules").is_some() {
            surface_forms.push("rules");
        }
        if surface_forms.len() > 1 {
            self.push(ParseDiagnostic::warning(
                "PARSE_003",
                format!(
                    "Multiple surface forms present ({}); only the first is primary",
                    surface_forms.join(", ")
                ),
            ));
        }

        let body = if let Some(conditions) = yaml.get("conditions") {
            self.parse_conditions_body(conditions)
        } else if let Some(when) = yaml.get("when") {
            let when = self.parse_condition_list(when, "when");
            let then_actions = self.parse_actions(yaml.get("then"), "then");
            let else_actions = self.parse_actions(yaml.get("else"), "else");
            RuleBody::WhenThen {
                when,
                then_actions,
                else_actions,
            }
        } else if let Some(rules) = yaml.get("rules") {
            RuleBody::Rules(self.parse_sub_rules(rules))
        } else {
            // No primary form: an empty when-list is a vacuous conjunction,
            // so bare then-actions still run.
            RuleBody::WhenThen {
                when: Vec::new(),
                then_actions: self.parse_actions(yaml.get("then"), "then"),
                else_actions: self.parse_actions(yaml.get("else"), "else"),
            }
        };

        RuleSet {
            name,
            description,
            version,
            metadata,
            inputs,
            constants,
            body,
            output,
            circuit_breaker,
            surface_forms,
        }
    }

    fn parse_metadata(&mut self, yaml: Option<&Yaml>) -> RuleMetadata {
        let Some(yaml) = yaml else {
            return RuleMetadata::default();
        };

        let tags = yaml
            .get("tags")
            .and_then(Yaml::as_sequence)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        RuleMetadata {
            tags,
            author: str_field(yaml, "author"),
            category: str_field(yaml, "category"),
            priority: yaml.get("priority").and_then(Yaml::as_i64),
            risk_level: str_field(yaml, "riskLevel"),
        }
    }

    fn parse_inputs(&mut self, yaml: Option<&Yaml>) -> Vec<InputDecl> {
        let Some(Yaml::Sequence(items)) = yaml else {
            return Vec::new();
        };

        let mut inputs = Vec::new();
        for item in items {
            let Some(name) = item.as_str() else {
                self.push(ParseDiagnostic::error(
                    "PARSE_004",
                    format!("inputs entries must be strings, found {:?}", item),
                ));
                continue;
            };
            if NameKind::classify(name) != Some(NameKind::Input) {
                self.push(
                    ParseDiagnostic::error(
                        "NAME_001",
                        format!("Input '{}' is not camelCase", name),
                    )
                    .with_hint(format!(
                        "rename `{}` to `{}` in inputs",
                        name,
                        to_camel_case(name)
                    )),
                );
            }
            inputs.push(InputDecl {
                name: name.to_string(),
                location: None,
            });
        }
        inputs
    }

    fn parse_constants(&mut self, yaml: Option<&Yaml>) -> Vec<InlineConstant> {
        let Some(Yaml::Sequence(items)) = yaml else {
            return Vec::new();
        };

        let mut constants = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let Some(name) = str_field(item, "name") else {
                self.push(ParseDiagnostic::error(
                    "PARSE_005",
                    format!("constants[{}] is missing a name", index),
                ));
                continue;
            };
            if NameKind::classify(&name) != Some(NameKind::Constant) {
                self.push(
                    ParseDiagnostic::error(
                        "NAME_002",
                        format!("Constant '{}' is not UPPER_SNAKE", name),
                    )
                    .with_hint(format!(
                        "rename `{}` to `{}`",
                        name,
                        name.to_uppercase().replace([' ', '-'], "_")
                    )),
                );
            }
            let value = item
                .get("value")
                .map(yaml_to_value)
                .unwrap_or(Value::Null);
            constants.push(InlineConstant {
                name,
                value,
                description: str_field(item, "description"),
                location: None,
            });
        }
        constants
    }

    fn parse_output(&mut self, yaml: Option<&Yaml>) -> IndexMap<String, String> {
        let Some(Yaml::Mapping(fields)) = yaml else {
            return IndexMap::new();
        };

        fields
            .iter()
            .filter_map(|(key, value)| {
                let key = key.as_str()?.to_string();
                let value = match value {
                    Yaml::String(s) => s.clone(),
                    other => yaml_to_value(other).to_string(),
                };
                Some((key, value))
            })
            .collect()
    }

    fn parse_circuit_breaker(&mut self, yaml: Option<&Yaml>) -> Option<CircuitBreakerConfig> {
        let yaml = yaml?;
        let condition = yaml
            .get("condition")
            .and_then(Yaml::as_str)
            .and_then(|text| match ExpressionParser::parse_condition_string(text) {
                Ok(condition) => Some(condition),
                Err(err) => {
                    self.push(ParseDiagnostic::from_error("circuit_breaker.condition", &err));
                    None
                }
            });

        Some(CircuitBreakerConfig {
            enabled: yaml.get("enabled").and_then(Yaml::as_bool).unwrap_or(true),
            condition,
            message: str_field(yaml, "message"),
            threshold: yaml.get("threshold").and_then(Yaml::as_i64),
            time_window_ms: yaml.get("timeWindowMs").and_then(Yaml::as_i64),
        })
    }

    // ============================================
    // Conditions
    // ============================================

    fn parse_condition_list(&mut self, yaml: &Yaml, context: &str) -> Vec<Condition> {
        match yaml {
            Yaml::Sequence(items) => items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    self.parse_condition_node(item, &format!("{}[{}]", context, index))
                })
                .collect(),
            single => self
                .parse_condition_node(single, context)
                .into_iter()
                .collect(),
        }
    }

    /// Parse one condition node: an inline string, or a structured map with
    /// `compare` / `and` / `or` / `not` / `function` / `arithmetic` keys.
    fn parse_condition_node(&mut self, yaml: &Yaml, context: &str) -> Option<Condition> {
        match yaml {
            Yaml::String(text) => match ExpressionParser::parse_condition_string(text) {
                Ok(condition) => Some(condition),
                Err(err) => {
                    self.push(ParseDiagnostic::from_error(context, &err));
                    None
                }
            },
            Yaml::Bool(b) => Some(Condition::Expr {
                expr: Expression::literal(Value::Bool(*b)),
            }),
            Yaml::Mapping(_) => self.parse_structured_condition(yaml, context),
            other => {
                self.push(ParseDiagnostic::error(
                    "PARSE_006",
                    format!("{}: expected a condition, found {:?}", context, other),
                ));
                None
            }
        }
    }

    fn parse_structured_condition(&mut self, yaml: &Yaml, context: &str) -> Option<Condition> {
        if let Some(compare) = yaml.get("compare") {
            let left = self.parse_operand(compare.get("left"), &format!("{}.compare.left", context))?;
            let operator = str_field(compare, "operator").unwrap_or_default();
            let op = symbol_compare_op(&operator).or_else(|| CompareOp::from_word(&operator));
            let Some(op) = op else {
                self.push(ParseDiagnostic::error(
                    "PARSE_007",
                    format!("{}: unknown comparison operator '{}'", context, operator),
                ));
                return None;
            };
            let right = if op.is_unary() {
                None
            } else {
                Some(self.parse_operand(
                    compare.get("right"),
                    &format!("{}.compare.right", context),
                )?)
            };
            return Some(Condition::Comparison {
                left,
                op,
                right,
                location: None,
            });
        }

        for (key, op) in [("and", crate::ast::LogicalOp::And), ("or", crate::ast::LogicalOp::Or)] {
            if let Some(Yaml::Sequence(items)) = yaml.get(key) {
                let children: Vec<Condition> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        self.parse_condition_node(item, &format!("{}.{}[{}]", context, key, index))
                    })
                    .collect();
                if children.is_empty() {
                    self.push(ParseDiagnostic::error(
                        "PARSE_008",
                        format!("{}: '{}' requires at least one child condition", context, key),
                    ));
                    return None;
                }
                return Some(Condition::Logical {
                    op,
                    children,
                    location: None,
                });
            }
        }

        if let Some(inner) = yaml.get("not") {
            let child = self.parse_condition_node(inner, &format!("{}.not", context))?;
            return Some(Condition::Logical {
                op: crate::ast::LogicalOp::Not,
                children: vec![child],
                location: None,
            });
        }

        if yaml.get("function").is_some() || yaml.get("arithmetic").is_some() {
            let expr = self.parse_operand(Some(yaml), context)?;
            return Some(Condition::Expr { expr });
        }

        self.push(ParseDiagnostic::error(
            "PARSE_009",
            format!(
                "{}: structured condition needs one of compare/and/or/not/function/arithmetic",
                context
            ),
        ));
        None
    }

    /// Parse an operand position: scalar literal, inline expression string,
    /// or nested `function` / `arithmetic` map.
    fn parse_operand(&mut self, yaml: Option<&Yaml>, context: &str) -> Option<Expression> {
        let Some(yaml) = yaml else {
            self.push(ParseDiagnostic::error(
                "PARSE_010",
                format!("{}: missing operand", context),
            ));
            return None;
        };

        match yaml {
            Yaml::String(text) => match ExpressionParser::parse_expression_string(text) {
                Ok(expr) => Some(expr),
                Err(err) => {
                    self.push(ParseDiagnostic::from_error(context, &err));
                    None
                }
            },
            Yaml::Bool(b) => Some(Expression::literal(Value::Bool(*b))),
            Yaml::Number(_) | Yaml::Null => Some(Expression::literal(yaml_to_value(yaml))),
            Yaml::Sequence(items) => {
                let elements: Vec<Expression> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        self.parse_operand(Some(item), &format!("{}[{}]", context, index))
                    })
                    .collect();
                Some(Expression::ListLiteral {
                    elements,
                    location: None,
                })
            }
            Yaml::Mapping(_) => {
                if let Some(function) = yaml.get("function") {
                    let name = str_field(function, "name").unwrap_or_default();
                    let args = match function.get("args") {
                        Some(Yaml::Sequence(items)) => items
                            .iter()
                            .enumerate()
                            .filter_map(|(index, item)| {
                                self.parse_operand(
                                    Some(item),
                                    &format!("{}.args[{}]", context, index),
                                )
                            })
                            .collect(),
                        _ => Vec::new(),
                    };
                    return Some(Expression::FunctionCall {
                        name,
                        args,
                        location: None,
                    });
                }
                if let Some(arithmetic) = yaml.get("arithmetic") {
                    return self.parse_arithmetic(arithmetic, context);
                }
                self.push(ParseDiagnostic::error(
                    "PARSE_011",
                    format!("{}: cannot interpret mapping as an operand", context),
                ));
                None
            }
            other => {
                self.push(ParseDiagnostic::error(
                    "PARSE_011",
                    format!("{}: cannot interpret {:?} as an operand", context, other),
                ));
                None
            }
        }
    }

    fn parse_arithmetic(&mut self, yaml: &Yaml, context: &str) -> Option<Expression> {
        let operator = str_field(yaml, "operator").unwrap_or_default();
        let op = match operator.as_str() {
            "add" | "+" => crate::ast::BinaryOp::Add,
            "subtract" | "-" => crate::ast::BinaryOp::Subtract,
            "multiply" | "*" => crate::ast::BinaryOp::Multiply,
            "divide" | "/" => crate::ast::BinaryOp::Divide,
            "modulo" | "%" => crate::ast::BinaryOp::Modulo,
            "power" | "^" => crate::ast::BinaryOp::Power,
            other => {
                self.push(ParseDiagnostic::error(
                    "PARSE_012",
                    format!("{}: unknown arithmetic operator '{}'", context, other),
                ));
                return None;
            }
        };

        let Some(Yaml::Sequence(operands)) = yaml.get("operands") else {
            self.push(ParseDiagnostic::error(
                "PARSE_013",
                format!("{}: arithmetic requires an operands list", context),
            ));
            return None;
        };

        let mut parsed: Vec<Expression> = operands
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                self.parse_operand(Some(item), &format!("{}.operands[{}]", context, index))
            })
            .collect();

        if parsed.len() < 2 {
            self.push(ParseDiagnostic::error(
                "PARSE_013",
                format!("{}: arithmetic requires at least two operands", context),
            ));
            return None;
        }

        // Left-fold the operand list.
        let mut expr = parsed.remove(0);
        for right in parsed {
            expr = Expression::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                location: None,
            };
        }
        Some(expr)
    }

    fn parse_conditions_body(&mut self, yaml: &Yaml) -> RuleBody {
        let condition = yaml
            .get("if")
            .and_then(|node| self.parse_condition_node(node, "conditions.if"))
            .unwrap_or(Condition::Expr {
                expr: Expression::literal(Value::Bool(false)),
            });
        if yaml.get("if").is_none() {
            self.push(ParseDiagnostic::error(
                "PARSE_014",
                "conditions block requires an 'if' entry",
            ));
        }
        let then_actions = self.parse_actions(yaml.get("then"), "conditions.then");
        let else_actions = self.parse_actions(yaml.get("else"), "conditions.else");
        RuleBody::Conditions {
            condition,
            then_actions,
            else_actions,
        }
    }

    fn parse_sub_rules(&mut self, yaml: &Yaml) -> Vec<SubRule> {
        let Yaml::Sequence(items) = yaml else {
            self.push(ParseDiagnostic::error(
                "PARSE_015",
                "rules must be a list of sub-rules",
            ));
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let context = format!("rules[{}]", index);
                let condition = item
                    .get("when")
                    .or_else(|| item.get("if"))
                    .map(|node| {
                        let conditions =
                            self.parse_condition_list(node, &format!("{}.when", context));
                        conjunction(conditions)
                    });
                SubRule {
                    name: str_field(item, "name"),
                    condition,
                    then_actions: self.parse_actions(item.get("then"), &format!("{}.then", context)),
                    else_actions: self.parse_actions(item.get("else"), &format!("{}.else", context)),
                    location: None,
                }
            })
            .collect()
    }

    // ============================================
    // Actions
    // ============================================

    fn parse_actions(&mut self, yaml: Option<&Yaml>, context: &str) -> Vec<Action> {
        let Some(yaml) = yaml else {
            return Vec::new();
        };

        match yaml {
            Yaml::Sequence(items) => items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    self.parse_action_node(item, &format!("{}[{}]", context, index))
                })
                .collect(),
            single => self
                .parse_action_node(single, context)
                .into_iter()
                .collect(),
        }
    }

    fn parse_action_node(&mut self, yaml: &Yaml, context: &str) -> Option<Action> {
        match yaml {
            Yaml::String(text) => match ExpressionParser::parse_action_string(text) {
                Ok(action) => Some(action),
                Err(err) => {
                    self.push(ParseDiagnostic::from_error(context, &err));
                    None
                }
            },
            Yaml::Mapping(_) => self.parse_structured_action(yaml, context),
            other => {
                self.push(ParseDiagnostic::error(
                    "PARSE_016",
                    format!("{}: expected an action, found {:?}", context, other),
                ));
                None
            }
        }
    }

    fn parse_structured_action(&mut self, yaml: &Yaml, context: &str) -> Option<Action> {
        if let Some(set) = yaml.get("set") {
            let Some(target) = str_field(set, "target") else {
                self.push(ParseDiagnostic::error(
                    "PARSE_018",
                    format!("{}.set: missing target", context),
                ));
                return None;
            };
            let value = self.parse_operand(set.get("value"), &format!("{}.set.value", context))?;
            return self.checked_target(target, context).map(|target| Action::Set {
                target,
                value,
                location: None,
            });
        }

        if let Some(calculate) = yaml.get("calculate") {
            let Some(target) = str_field(calculate, "target") else {
                self.push(ParseDiagnostic::error(
                    "PARSE_018",
                    format!("{}.calculate: missing target", context),
                ));
                return None;
            };
            let expression = self.parse_operand(
                calculate
                    .get("expression")
                    .or_else(|| calculate.get("value")),
                &format!("{}.calculate.expression", context),
            )?;
            return self
                .checked_target(target, context)
                .map(|target| Action::Calculate {
                    target,
                    expression,
                    location: None,
                });
        }

        if let Some(breaker) = yaml.get("circuit_breaker") {
            return Some(self.parse_circuit_breaker_action(breaker, context));
        }

        if let Some(condition_node) = yaml.get("if").or_else(|| yaml.get("condition")) {
            let condition =
                self.parse_condition_node(condition_node, &format!("{}.if", context))?;
            return Some(Action::Conditional {
                condition,
                then_actions: self.parse_actions(yaml.get("then"), &format!("{}.then", context)),
                else_actions: self.parse_actions(yaml.get("else"), &format!("{}.else", context)),
                location: None,
            });
        }

        if let Some(call) = yaml.get("function").or_else(|| yaml.get("call")) {
            let name = str_field(call, "name").unwrap_or_default();
            let args = match call.get("args") {
                Some(Yaml::Sequence(items)) => items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        self.parse_operand(Some(item), &format!("{}.args[{}]", context, index))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            return Some(Action::Call {
                name,
                args,
                location: None,
            });
        }

        self.push(ParseDiagnostic::error(
            "PARSE_017",
            format!(
                "{}: structured action needs one of set/calculate/if/function/circuit_breaker",
                context
            ),
        ));
        None
    }

    fn parse_circuit_breaker_action(&mut self, yaml: &Yaml, context: &str) -> Action {
        match yaml {
            Yaml::String(message) => Action::CircuitBreaker {
                condition: None,
                message: message.clone(),
                location: None,
            },
            _ => {
                let condition = yaml
                    .get("condition")
                    .or_else(|| yaml.get("trigger"))
                    .and_then(|node| match node {
                        // `trigger: true` means trip unconditionally.
                        Yaml::Bool(true) => None,
                        Yaml::Bool(false) => {
                            Some(Expression::literal(Value::Bool(false)))
                        }
                        Yaml::String(text) => {
                            match ExpressionParser::parse_expression_string(text) {
                                Ok(expr) => Some(expr),
                                Err(err) => {
                                    self.push(ParseDiagnostic::from_error(
                                        &format!("{}.circuit_breaker", context),
                                        &err,
                                    ));
                                    None
                                }
                            }
                        }
                        _ => None,
                    });
                Action::CircuitBreaker {
                    condition,
                    message: str_field(yaml, "message")
                        .unwrap_or_else(|| "Circuit breaker triggered".to_string()),
                    location: None,
                }
            }
        }
    }

    fn checked_target(&mut self, target: String, context: &str) -> Option<String> {
        let snake = target.starts_with(|c: char| c.is_ascii_lowercase())
            && target
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !snake || crate::token::is_reserved_word(&target) {
            self.push(
                ParseDiagnostic::error(
                    "NAME_003",
                    format!("{}: action target '{}' must be snake_case", context, target),
                )
                .with_hint(format!(
                    "rename `{}` to `{}`",
                    target,
                    super::expression::to_snake_case(&target)
                )),
            );
            return None;
        }
        Some(target)
    }
}

/// Combine a `when:` list into a single conjunction.
pub fn conjunction(mut conditions: Vec<Condition>) -> Condition {
    match conditions.len() {
        0 => Condition::Expr {
            expr: Expression::literal(Value::Bool(true)),
        },
        1 => conditions.pop().expect("nonempty"),
        _ => Condition::Logical {
            op: crate::ast::LogicalOp::And,
            children: conditions,
            location: None,
        },
    }
}

fn symbol_compare_op(symbol: &str) -> Option<CompareOp> {
    Some(match symbol {
        "==" | "=" => CompareOp::Equal,
        "!=" => CompareOp::NotEqual,
        ">" => CompareOp::GreaterThan,
        ">=" => CompareOp::GreaterThanOrEqual,
        "<" => CompareOp::LessThan,
        "<=" => CompareOp::LessThanOrEqual,
        _ => return None,
    })
}

fn str_field(yaml: &Yaml, field: &str) -> Option<String> {
    yaml.get(field).and_then(Yaml::as_str).map(str::to_string)
}

fn yaml_to_value(yaml: &Yaml) -> Value {
    match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Value::Number(Decimal::from(u))
            } else {
                n.as_f64()
                    .and_then(Decimal::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::Text(s.clone()),
        Yaml::Sequence(items) => Value::List(items.iter().map(yaml_to_value).collect()),
        Yaml::Mapping(fields) => Value::Map(
            fields
                .iter()
                .filter_map(|(key, value)| {
                    key.as_str().map(|k| (k.to_string(), yaml_to_value(value)))
                })
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}
