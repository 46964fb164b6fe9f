//! Abstract syntax tree for rule documents.
//!
//! The AST is immutable after parsing: the evaluator never mutates nodes, so
//! a compiled [`RuleSet`] can be shared between concurrent evaluations behind
//! an `Arc`. Every node carries an optional [`SourceLocation`] pointing back
//! into the YAML document or inline expression string.

use crate::value::Value;
use indexmap::IndexMap;

/// (line, column, length) triple attached to AST nodes and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        Self {
            line,
            column,
            length,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Variable-resolution tier selected by the lexical form of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// camelCase: supplied by the caller.
    Input,
    /// UPPER_SNAKE: resolved from the constant store or inline constants.
    Constant,
    /// snake_case with at least one underscore: produced by actions.
    Computed,
}

impl NameKind {
    /// Classify a name by its lexical form. `None` means the name fits no
    /// tier (e.g. `Mixed_Case`) and must be rejected.
    pub fn classify(name: &str) -> Option<NameKind> {
        let mut chars = name.chars();
        let first = chars.next()?;

        if first.is_ascii_uppercase() {
            return name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
                .then_some(NameKind::Constant);
        }

        if !first.is_ascii_lowercase() {
            return None;
        }

        if name.contains('_') {
            return name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                .then_some(NameKind::Computed);
        }

        name.chars()
            .all(|c| c.is_ascii_alphanumeric())
            .then_some(NameKind::Input)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            NameKind::Input => "camelCase input",
            NameKind::Constant => "UPPER_SNAKE constant",
            NameKind::Computed => "snake_case computed variable",
        }
    }
}

/// Arithmetic and coalescing operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    NullCoalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
            BinaryOp::NullCoalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation on Decimal.
    Negate,
    /// Logical negation on truthiness.
    Not,
}

/// Comparison operators, symbolic and word forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    InList,
    NotInList,
    Between,
    Matches,
    NotMatches,
    IsEmpty,
    IsNotEmpty,
    IsNull,
    IsNotNull,
    IsNumeric,
    IsEmail,
    IsPhone,
    IsDate,
    LengthEquals,
    LengthGreaterThan,
    LengthLessThan,
    WithinRange,
    OutsideRange,
    IsPositive,
    IsNegative,
    IsZero,
    IsNonZero,
    IsPercentage,
    IsCurrency,
    IsCreditScore,
    IsSsn,
    IsAccountNumber,
    IsRoutingNumber,
    IsBusinessDay,
    IsWeekend,
    AgeAtLeast,
    AgeLessThan,
}

impl CompareOp {
    /// Resolve a word operator, including the name-word aliases
    /// (`at_least` = `>=`, `greater_than` = `>`, `less_than` = `<`,
    /// `equals` = `==`).
    pub fn from_word(word: &str) -> Option<CompareOp> {
        Some(match word {
            "equals" => CompareOp::Equal,
            "at_least" => CompareOp::GreaterThanOrEqual,
            "greater_than" => CompareOp::GreaterThan,
            "less_than" => CompareOp::LessThan,
            "contains" => CompareOp::Contains,
            "starts_with" => CompareOp::StartsWith,
            "ends_with" => CompareOp::EndsWith,
            "in_list" => CompareOp::InList,
            "not_in_list" => CompareOp::NotInList,
            "between" => CompareOp::Between,
            "matches" => CompareOp::Matches,
            "not_matches" => CompareOp::NotMatches,
            "is_empty" => CompareOp::IsEmpty,
            "is_not_empty" => CompareOp::IsNotEmpty,
            "is_null" => CompareOp::IsNull,
            "is_not_null" => CompareOp::IsNotNull,
            "is_numeric" => CompareOp::IsNumeric,
            "is_email" => CompareOp::IsEmail,
            "is_phone" => CompareOp::IsPhone,
            "is_date" => CompareOp::IsDate,
            "length_equals" => CompareOp::LengthEquals,
            "length_greater_than" => CompareOp::LengthGreaterThan,
            "length_less_than" => CompareOp::LengthLessThan,
            "within_range" => CompareOp::WithinRange,
            "outside_range" => CompareOp::OutsideRange,
            "is_positive" => CompareOp::IsPositive,
            "is_negative" => CompareOp::IsNegative,
            "is_zero" => CompareOp::IsZero,
            "is_non_zero" => CompareOp::IsNonZero,
            "is_percentage" => CompareOp::IsPercentage,
            "is_currency" => CompareOp::IsCurrency,
            "is_credit_score" => CompareOp::IsCreditScore,
            "is_ssn" => CompareOp::IsSsn,
            "is_account_number" => CompareOp::IsAccountNumber,
            "is_routing_number" => CompareOp::IsRoutingNumber,
            "is_business_day" => CompareOp::IsBusinessDay,
            "is_weekend" => CompareOp::IsWeekend,
            "age_at_least" => CompareOp::AgeAtLeast,
            "age_less_than" => CompareOp::AgeLessThan,
            _ => return None,
        })
    }

    /// True for unary word operators, which take no right operand.
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            CompareOp::IsEmpty
                | CompareOp::IsNotEmpty
                | CompareOp::IsNull
                | CompareOp::IsNotNull
                | CompareOp::IsNumeric
                | CompareOp::IsEmail
                | CompareOp::IsPhone
                | CompareOp::IsDate
                | CompareOp::IsPositive
                | CompareOp::IsNegative
                | CompareOp::IsZero
                | CompareOp::IsNonZero
                | CompareOp::IsPercentage
                | CompareOp::IsCurrency
                | CompareOp::IsCreditScore
                | CompareOp::IsSsn
                | CompareOp::IsAccountNumber
                | CompareOp::IsRoutingNumber
                | CompareOp::IsBusinessDay
                | CompareOp::IsWeekend
        )
    }

    /// Operators whose right operand is a two-element range.
    pub fn takes_range(&self) -> bool {
        matches!(
            self,
            CompareOp::Between | CompareOp::WithinRange | CompareOp::OutsideRange
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEqual => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
            CompareOp::Contains => "contains",
            CompareOp::StartsWith => "starts_with",
            CompareOp::EndsWith => "ends_with",
            CompareOp::InList => "in_list",
            CompareOp::NotInList => "not_in_list",
            CompareOp::Between => "between",
            CompareOp::Matches => "matches",
            CompareOp::NotMatches => "not_matches",
            CompareOp::IsEmpty => "is_empty",
            CompareOp::IsNotEmpty => "is_not_empty",
            CompareOp::IsNull => "is_null",
            CompareOp::IsNotNull => "is_not_null",
            CompareOp::IsNumeric => "is_numeric",
            CompareOp::IsEmail => "is_email",
            CompareOp::IsPhone => "is_phone",
            CompareOp::IsDate => "is_date",
            CompareOp::LengthEquals => "length_equals",
            CompareOp::LengthGreaterThan => "length_greater_than",
            CompareOp::LengthLessThan => "length_less_than",
            CompareOp::WithinRange => "within_range",
            CompareOp::OutsideRange => "outside_range",
            CompareOp::IsPositive => "is_positive",
            CompareOp::IsNegative => "is_negative",
            CompareOp::IsZero => "is_zero",
            CompareOp::IsNonZero => "is_non_zero",
            CompareOp::IsPercentage => "is_percentage",
            CompareOp::IsCurrency => "is_currency",
            CompareOp::IsCreditScore => "is_credit_score",
            CompareOp::IsSsn => "is_ssn",
            CompareOp::IsAccountNumber => "is_account_number",
            CompareOp::IsRoutingNumber => "is_routing_number",
            CompareOp::IsBusinessDay => "is_business_day",
            CompareOp::IsWeekend => "is_weekend",
            CompareOp::AgeAtLeast => "age_at_least",
            CompareOp::AgeLessThan => "age_less_than",
        }
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal {
        value: Value,
        location: Option<SourceLocation>,
    },
    Variable {
        name: String,
        kind: NameKind,
        location: Option<SourceLocation>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        location: Option<SourceLocation>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
        location: Option<SourceLocation>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expression>,
        location: Option<SourceLocation>,
    },
    /// Dot-and-bracket path over a map or list value (`customer.address.city`,
    /// `items[0].price`).
    JsonPath {
        object: Box<Expression>,
        path: String,
        location: Option<SourceLocation>,
    },
    /// `if <condition> then <expr> else <expr>`.
    Conditional {
        condition: Box<Condition>,
        then_value: Box<Expression>,
        else_value: Box<Expression>,
        location: Option<SourceLocation>,
    },
    /// Bracketed element list; compound right operand of `in_list`/`between`.
    ListLiteral {
        elements: Vec<Expression>,
        location: Option<SourceLocation>,
    },
}

impl Expression {
    pub fn literal(value: Value) -> Expression {
        Expression::Literal {
            value,
            location: None,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Expression::Literal { location, .. }
            | Expression::Variable { location, .. }
            | Expression::Binary { location, .. }
            | Expression::Unary { location, .. }
            | Expression::FunctionCall { location, .. }
            | Expression::JsonPath { location, .. }
            | Expression::Conditional { location, .. }
            | Expression::ListLiteral { location, .. } => *location,
        }
    }

    /// Serialize back to inline-DSL text. Re-parsing the output yields a
    /// structurally equal expression.
    pub fn to_dsl(&self) -> String {
        match self {
            Expression::Literal { value, .. } => match value {
                Value::Text(s) => format!("\"{}\"", s),
                other => other.to_string(),
            },
            Expression::Variable { name, .. } => name.clone(),
            Expression::Binary {
                op, left, right, ..
            } => format!("({} {} {})", left.to_dsl(), op.symbol(), right.to_dsl()),
            Expression::Unary { op, operand, .. } => match op {
                UnaryOp::Negate => format!("(-{})", operand.to_dsl()),
                UnaryOp::Not => format!("(not {})", operand.to_dsl()),
            },
            Expression::FunctionCall { name, args, .. } => {
                let args: Vec<String> = args.iter().map(Expression::to_dsl).collect();
                format!("{}({})", name, args.join(", "))
            }
            Expression::JsonPath { object, path, .. } => {
                if path.starts_with('[') {
                    format!("{}{}", object.to_dsl(), path)
                } else {
                    format!("{}.{}", object.to_dsl(), path)
                }
            }
            Expression::Conditional {
                condition,
                then_value,
                else_value,
                ..
            } => format!(
                "(if {} then {} else {})",
                condition.to_dsl(),
                then_value.to_dsl(),
                else_value.to_dsl()
            ),
            Expression::ListLiteral { elements, .. } => {
                let elements: Vec<String> = elements.iter().map(Expression::to_dsl).collect();
                format!("[{}]", elements.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Condition node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        left: Expression,
        op: CompareOp,
        /// Absent for unary word operators (`is_empty`, `is_ssn`, ...).
        right: Option<Expression>,
        location: Option<SourceLocation>,
    },
    Logical {
        op: LogicalOp,
        children: Vec<Condition>,
        location: Option<SourceLocation>,
    },
    /// A bare expression judged by truthiness.
    Expr { expr: Expression },
}

impl Condition {
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Condition::Comparison { location, .. } | Condition::Logical { location, .. } => {
                *location
            }
            Condition::Expr { expr } => expr.location(),
        }
    }

    pub fn to_dsl(&self) -> String {
        match self {
            Condition::Comparison {
                left, op, right, ..
            } => match right {
                Some(right) => format!("{} {} {}", left.to_dsl(), op.symbol(), right.to_dsl()),
                None => format!("{} {}", left.to_dsl(), op.symbol()),
            },
            Condition::Logical { op, children, .. } => match op {
                LogicalOp::Not => format!("(not {})", children[0].to_dsl()),
                LogicalOp::And | LogicalOp::Or => {
                    let word = if *op == LogicalOp::And { "and" } else { "or" };
                    let parts: Vec<String> = children.iter().map(Condition::to_dsl).collect();
                    format!("({})", parts.join(&format!(" {} ", word)))
                }
            },
            Condition::Expr { expr } => expr.to_dsl(),
        }
    }
}

/// Action node.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `set <snake_case> to <expr>`
    Set {
        target: String,
        value: Expression,
        location: Option<SourceLocation>,
    },
    /// `calculate <snake_case> as <expr>`
    Calculate {
        target: String,
        expression: Expression,
        location: Option<SourceLocation>,
    },
    /// Bare function invocation used for its side effect (`rest_post(...)`).
    Call {
        name: String,
        args: Vec<Expression>,
        location: Option<SourceLocation>,
    },
    Conditional {
        condition: Condition,
        then_actions: Vec<Action>,
        else_actions: Vec<Action>,
        location: Option<SourceLocation>,
    },
    /// Trip the circuit breaker when `condition` (default: always) is truthy.
    CircuitBreaker {
        condition: Option<Expression>,
        message: String,
        location: Option<SourceLocation>,
    },
}

impl Action {
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Action::Set { location, .. }
            | Action::Calculate { location, .. }
            | Action::Call { location, .. }
            | Action::Conditional { location, .. }
            | Action::CircuitBreaker { location, .. } => *location,
        }
    }

    /// The snake_case name this action produces, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Action::Set { target, .. } | Action::Calculate { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Rule metadata block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMetadata {
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub priority: Option<i64>,
    pub risk_level: Option<String>,
}

/// A declared input with its declaration site.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDecl {
    pub name: String,
    pub location: Option<SourceLocation>,
}

/// An inline constant declared in the rule document.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineConstant {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
    pub location: Option<SourceLocation>,
}

/// RuleSet-level circuit-breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub condition: Option<Condition>,
    pub message: Option<String>,
    pub threshold: Option<i64>,
    pub time_window_ms: Option<i64>,
}

/// A member of the ordered `rules:` list. Sub-rules share the evaluation
/// context, so later rules observe earlier rules' computed variables.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRule {
    pub name: Option<String>,
    pub condition: Option<Condition>,
    pub then_actions: Vec<Action>,
    pub else_actions: Vec<Action>,
    pub location: Option<SourceLocation>,
}

/// The main body of a rule document: exactly one surface form is primary.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleBody {
    /// Simplified form: `when:` list evaluated as a conjunction.
    WhenThen {
        when: Vec<Condition>,
        then_actions: Vec<Action>,
        else_actions: Vec<Action>,
    },
    /// Structured form: `conditions: {if, then, else}`.
    Conditions {
        condition: Condition,
        then_actions: Vec<Action>,
        else_actions: Vec<Action>,
    },
    /// Multi-rule form: ordered sub-rules.
    Rules(Vec<SubRule>),
}

/// Parsed top-level rule document.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub metadata: RuleMetadata,
    pub inputs: Vec<InputDecl>,
    pub constants: Vec<InlineConstant>,
    pub body: RuleBody,
    pub output: IndexMap<String, String>,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    /// Which surface forms were present in the document. More than one is a
    /// validator finding, not a parse failure.
    pub surface_forms: Vec<&'static str>,
}

// ============================================
// Visitor
// ============================================

/// Read-only visitor over the AST. Default methods walk the full tree;
/// override the hooks you need.
pub trait AstVisitor {
    fn visit_expression(&mut self, expr: &Expression) {
        walk_expression(self, expr);
    }

    fn visit_condition(&mut self, condition: &Condition) {
        walk_condition(self, condition);
    }

    fn visit_action(&mut self, action: &Action) {
        walk_action(self, action);
    }
}

pub fn walk_expression<V: AstVisitor + ?Sized>(visitor: &mut V, expr: &Expression) {
    match expr {
        Expression::Literal { .. } | Expression::Variable { .. } => {}
        Expression::Binary { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        Expression::Unary { operand, .. } => visitor.visit_expression(operand),
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                visitor.visit_expression(arg);
            }
        }
        Expression::JsonPath { object, .. } => visitor.visit_expression(object),
        Expression::Conditional {
            condition,
            then_value,
            else_value,
            ..
        } => {
            visitor.visit_condition(condition);
            visitor.visit_expression(then_value);
            visitor.visit_expression(else_value);
        }
        Expression::ListLiteral { elements, .. } => {
            for element in elements {
                visitor.visit_expression(element);
            }
        }
    }
}

pub fn walk_condition<V: AstVisitor + ?Sized>(visitor: &mut V, condition: &Condition) {
    match condition {
        Condition::Comparison { left, right, .. } => {
            visitor.visit_expression(left);
            if let Some(right) = right {
                visitor.visit_expression(right);
            }
        }
        Condition::Logical { children, .. } => {
            for child in children {
                visitor.visit_condition(child);
            }
        }
        Condition::Expr { expr } => visitor.visit_expression(expr),
    }
}

pub fn walk_action<V: AstVisitor + ?Sized>(visitor: &mut V, action: &Action) {
    match action {
        Action::Set { value, .. } => visitor.visit_expression(value),
        Action::Calculate { expression, .. } => visitor.visit_expression(expression),
        Action::Call { args, .. } => {
            for arg in args {
                visitor.visit_expression(arg);
            }
        }
        Action::Conditional {
            condition,
            then_actions,
            else_actions,
            ..
        } => {
            visitor.visit_condition(condition);
            for action in then_actions.iter().chain(else_actions) {
                visitor.visit_action(action);
            }
        }
        Action::CircuitBreaker { condition, .. } => {
            if let Some(condition) = condition {
                visitor.visit_expression(condition);
            }
        }
    }
}

impl RuleSet {
    /// Walk every condition and action in evaluation order.
    pub fn visit<V: AstVisitor + ?Sized>(&self, visitor: &mut V) {
        match &self.body {
            RuleBody::WhenThen {
                when,
                then_actions,
                else_actions,
            } => {
                for condition in when {
                    visitor.visit_condition(condition);
                }
                for action in then_actions.iter().chain(else_actions) {
                    visitor.visit_action(action);
                }
            }
            RuleBody::Conditions {
                condition,
                then_actions,
                else_actions,
            } => {
                visitor.visit_condition(condition);
                for action in then_actions.iter().chain(else_actions) {
                    visitor.visit_action(action);
                }
            }
            RuleBody::Rules(rules) => {
                for rule in rules {
                    if let Some(condition) = &rule.condition {
                        visitor.visit_condition(condition);
                    }
                    for action in rule.then_actions.iter().chain(&rule.else_actions) {
                        visitor.visit_action(action);
                    }
                }
            }
        }
        if let Some(config) = &self.circuit_breaker {
            if let Some(condition) = &config.condition {
                visitor.visit_condition(condition);
            }
        }
    }
}
