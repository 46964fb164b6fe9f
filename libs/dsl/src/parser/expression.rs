//! Parser for inline rule expressions.
//!
//! Precedence climbing over the token stream. Precedence (lowest to highest):
//! 1. null-coalesce (`??`)
//! 2. logical or (`or`, `||`)
//! 3. logical and (`and`, `&&`)
//! 4. logical not (`not`)
//! 5. comparison (`==` `!=` `>` `<` `>=` `<=` and word operators)
//! 6. additive (`+` `-`)
//! 7. multiplicative (`*` `/` `%`)
//! 8. exponent (`^`, right-associative)
//! 9. unary minus
//! 10. call / index / member access
//!
//! `??` binds loosest of all: `a ?? b or c` reads as `a ?? (b or c)`, and
//! `x == a ?? b` as `(x == a) ?? b`. `between X and Y` and `in_list [...]`
//! parse as comparisons with compound right operands. Levels 2–5 exist only
//! in condition position; a condition in expression position (an action's
//! right-hand side, a `??` operand) is desugared to
//! `if <cond> then true else false`.

use crate::ast::{
    Action, BinaryOp, CompareOp, Condition, Expression, LogicalOp, NameKind, UnaryOp,
};
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::token::{is_reserved_word, Token, TokenType};
use crate::value::Value;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Maximum expression nesting depth; deeper input is rejected rather than
/// risking stack overflow.
pub const MAX_RECURSION_DEPTH: usize = 50;

pub struct ExpressionParser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl ExpressionParser {
    pub fn new(input: &str) -> Result<Self> {
        Ok(Self {
            tokens: Lexer::tokenize(input)?,
            pos: 0,
            depth: 0,
        })
    }

    /// Parse a full condition string (`when:` entry or structured operand).
    pub fn parse_condition_string(input: &str) -> Result<Condition> {
        let mut parser = Self::new(input)?;
        let condition = parser.parse_condition()?;
        parser.expect_eof()?;
        Ok(condition)
    }

    /// Parse a full expression string (action right-hand side, argument).
    pub fn parse_expression_string(input: &str) -> Result<Expression> {
        let mut parser = Self::new(input)?;
        let expr = parser.parse_expression()?;
        parser.expect_eof()?;
        Ok(expr)
    }

    /// Parse an action string (`then:`/`else:` entry in the simplified form).
    ///
    /// Recognized by prefix: `set <target> to <expr>`,
    /// `calculate <target> as <expr>`, `circuit_breaker("message")`, or a
    /// bare function call.
    pub fn parse_action_string(input: &str) -> Result<Action> {
        let mut parser = Self::new(input)?;
        let action = parser.parse_action()?;
        parser.expect_eof()?;
        Ok(action)
    }

    // ============================================
    // Token plumbing
    // ============================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    fn expect(&mut self, token_type: TokenType, what: &str) -> Result<Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            let token = self.current();
            Err(Error::parse(
                format!("Expected {}, found '{}'", what, describe(token)),
                Some(token.location()),
            ))
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        if self.check(TokenType::Eof) {
            Ok(())
        } else {
            let token = self.current();
            let message = if token.token_type == TokenType::CloseParen {
                "Unmatched closing parenthesis".to_string()
            } else {
                format!("Unexpected trailing input '{}'", describe(token))
            };
            Err(Error::parse(message, Some(token.location())))
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(Error::TooComplex(MAX_RECURSION_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ============================================
    // Conditions
    // ============================================

    /// Top of the grammar: null-coalesce over whole conditions. Without a
    /// `??` the parsed condition passes through untouched.
    fn parse_condition(&mut self) -> Result<Condition> {
        self.enter()?;
        let first = self.parse_or_condition()?;
        let result = if self.check(TokenType::NullCoalesce) {
            let mut expr = expression_operand(first);
            while self.check(TokenType::NullCoalesce) {
                let token = self.advance();
                let right = expression_operand(self.parse_or_condition()?);
                expr = Expression::Binary {
                    op: BinaryOp::NullCoalesce,
                    left: Box::new(expr),
                    right: Box::new(right),
                    location: Some(token.location()),
                };
            }
            Condition::Expr { expr }
        } else {
            first
        };
        self.leave();
        Ok(result)
    }

    fn parse_or_condition(&mut self) -> Result<Condition> {
        self.enter()?;
        let first = self.parse_and_condition()?;
        let mut children = vec![first];

        while self.check(TokenType::Or) {
            self.advance();
            children.push(self.parse_and_condition()?);
        }
        self.leave();

        if children.len() == 1 {
            Ok(children.pop().expect("nonempty"))
        } else {
            let location = children[0].location();
            Ok(Condition::Logical {
                op: LogicalOp::Or,
                children,
                location,
            })
        }
    }

    fn parse_and_condition(&mut self) -> Result<Condition> {
        let first = self.parse_not_condition()?;
        let mut children = vec![first];

        while self.check(TokenType::And) {
            self.advance();
            children.push(self.parse_not_condition()?);
        }

        if children.len() == 1 {
            Ok(children.pop().expect("nonempty"))
        } else {
            let location = children[0].location();
            Ok(Condition::Logical {
                op: LogicalOp::And,
                children,
                location,
            })
        }
    }

    fn parse_not_condition(&mut self) -> Result<Condition> {
        if self.check(TokenType::Not) {
            let token = self.advance();
            let operand = self.parse_not_condition()?;
            return Ok(Condition::Logical {
                op: LogicalOp::Not,
                children: vec![operand],
                location: Some(token.location()),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Condition> {
        self.enter()?;

        // A parenthesized group may enclose a whole condition (`(a and b)`)
        // or just an expression operand (`(a + b) > c`). Try the condition
        // reading first and fall back on the expression route.
        if self.check(TokenType::OpenParen) {
            let saved_pos = self.pos;
            let saved_depth = self.depth;
            self.advance();
            if let Ok(inner) = self.parse_condition() {
                if self.check(TokenType::CloseParen) {
                    self.advance();
                    let grouped_condition = !matches!(inner, Condition::Expr { .. });
                    if grouped_condition && !self.comparison_follows() {
                        self.leave();
                        return Ok(inner);
                    }
                }
            }
            self.pos = saved_pos;
            self.depth = saved_depth;
        }

        let left = self.parse_additive()?;
        let condition = if let Some(op) = self.peek_compare_op() {
            let op_token = self.advance();
            let location = Some(op_token.location());
            let right = self.parse_comparison_rhs(op)?;
            Condition::Comparison {
                left,
                op,
                right,
                location,
            }
        } else {
            Condition::Expr { expr: left }
        };
        self.leave();
        Ok(condition)
    }

    fn comparison_follows(&self) -> bool {
        self.peek_compare_op().is_some()
    }

    fn peek_compare_op(&self) -> Option<CompareOp> {
        let token = self.current();
        match token.token_type {
            TokenType::Equal => Some(CompareOp::Equal),
            TokenType::NotEqual => Some(CompareOp::NotEqual),
            TokenType::GreaterThan => Some(CompareOp::GreaterThan),
            TokenType::GreaterThanOrEqual => Some(CompareOp::GreaterThanOrEqual),
            TokenType::LessThan => Some(CompareOp::LessThan),
            TokenType::LessThanOrEqual => Some(CompareOp::LessThanOrEqual),
            TokenType::WordOp => CompareOp::from_word(&token.value),
            _ => None,
        }
    }

    fn parse_comparison_rhs(&mut self, op: CompareOp) -> Result<Option<Expression>> {
        if op.is_unary() {
            return Ok(None);
        }

        if op.takes_range() {
            // `between X and Y`, or a bracketed 2-element list.
            if self.check(TokenType::OpenBracket) {
                return Ok(Some(self.parse_additive()?));
            }
            let low = self.parse_additive()?;
            self.expect(TokenType::And, "'and' between range bounds")?;
            let high = self.parse_additive()?;
            let location = low.location();
            return Ok(Some(Expression::ListLiteral {
                elements: vec![low, high],
                location,
            }));
        }

        Ok(Some(self.parse_additive()?))
    }

    // ============================================
    // Expressions
    // ============================================

    /// Full grammar in expression position: delimited contexts (argument
    /// lists, parentheses, list elements) restart from the top and view the
    /// result as an expression.
    pub(crate) fn parse_expression(&mut self) -> Result<Expression> {
        Ok(expression_operand(self.parse_condition()?))
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current().token_type {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Subtract,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                location: Some(token.location()),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_power()?;

        loop {
            let op = match self.current().token_type {
                TokenType::Multiply => BinaryOp::Multiply,
                TokenType::Divide => BinaryOp::Divide,
                TokenType::Percent => BinaryOp::Modulo,
                _ => break,
            };
            let token = self.advance();
            let right = self.parse_power()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                location: Some(token.location()),
            };
        }

        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expression> {
        let base = self.parse_unary()?;

        if self.check(TokenType::Caret) {
            let token = self.advance();
            self.enter()?;
            // Right-associative: recurse at the same level.
            let exponent = self.parse_power()?;
            self.leave();
            return Ok(Expression::Binary {
                op: BinaryOp::Power,
                left: Box::new(base),
                right: Box::new(exponent),
                location: Some(token.location()),
            });
        }

        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        if self.check(TokenType::Minus) {
            let token = self.advance();
            self.enter()?;
            let operand = self.parse_unary()?;
            self.leave();
            return Ok(Expression::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
                location: Some(token.location()),
            });
        }
        if self.check(TokenType::Not) {
            let token = self.advance();
            self.enter()?;
            let operand = self.parse_unary()?;
            self.leave();
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                location: Some(token.location()),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;
        let mut path = String::new();

        loop {
            if self.check(TokenType::Dot) {
                self.advance();
                let member = self.expect(TokenType::Identifier, "member name after '.'")?;
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(&member.value);
            } else if self.check(TokenType::OpenBracket) && self.index_follows() {
                self.advance();
                let index = self.expect(TokenType::NumberLiteral, "numeric index")?;
                self.expect(TokenType::CloseBracket, "']' after index")?;
                path.push_str(&format!("[{}]", index.value));
            } else {
                break;
            }
        }

        if !path.is_empty() {
            let location = expr.location();
            expr = Expression::JsonPath {
                object: Box::new(expr),
                path,
                location,
            };
        }

        Ok(expr)
    }

    /// Distinguish `items[0]` indexing from a following list literal.
    fn index_follows(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1).map(|t| &t.token_type),
            Some(TokenType::NumberLiteral)
        ) && matches!(
            self.tokens.get(self.pos + 2).map(|t| &t.token_type),
            Some(TokenType::CloseBracket)
        )
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let token = self.current().clone();
        match token.token_type {
            TokenType::NumberLiteral => {
                self.advance();
                let decimal = parse_decimal(&token.value).map_err(|message| {
                    Error::parse(message, Some(token.location()))
                })?;
                Ok(Expression::Literal {
                    value: Value::Number(decimal),
                    location: Some(token.location()),
                })
            }
            TokenType::StringLiteral => {
                self.advance();
                let location = Some(token.location());
                Ok(Expression::Literal {
                    value: Value::Text(token.value),
                    location,
                })
            }
            TokenType::BooleanLiteral => {
                self.advance();
                Ok(Expression::Literal {
                    value: Value::Bool(token.value == "true"),
                    location: Some(token.location()),
                })
            }
            TokenType::NullLiteral => {
                self.advance();
                Ok(Expression::Literal {
                    value: Value::Null,
                    location: Some(token.location()),
                })
            }
            TokenType::If => self.parse_conditional_expression(),
            TokenType::OpenParen => {
                self.advance();
                let inner = self.parse_expression()?;
                // Decision: both unmatched '(' and unmatched ')' are hard errors.
                self.expect(TokenType::CloseParen, "')' to close the group")?;
                Ok(inner)
            }
            TokenType::OpenBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(TokenType::CloseBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if self.check(TokenType::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenType::CloseBracket, "']' to close the list")?;
                Ok(Expression::ListLiteral {
                    elements,
                    location: Some(token.location()),
                })
            }
            TokenType::Identifier => {
                self.advance();
                let location = Some(token.location());
                if self.check(TokenType::OpenParen) {
                    self.advance();
                    let args = self.parse_call_args()?;
                    return Ok(Expression::FunctionCall {
                        name: token.value,
                        args,
                        location,
                    });
                }
                let Some(kind) = NameKind::classify(&token.value) else {
                    return Err(Error::Naming {
                        message: format!(
                            "Name '{}' fits no tier: use camelCase for inputs, \
                             UPPER_SNAKE for constants, or snake_case for computed variables",
                            token.value
                        ),
                        location,
                    });
                };
                Ok(Expression::Variable {
                    name: token.value,
                    kind,
                    location,
                })
            }
            // Validation operators double as functions (`is_ssn(value)`);
            // the word form with an argument list is a call, not an operator.
            TokenType::WordOp => {
                self.advance();
                let location = Some(token.location());
                if self.check(TokenType::OpenParen) {
                    self.advance();
                    let args = self.parse_call_args()?;
                    return Ok(Expression::FunctionCall {
                        name: token.value,
                        args,
                        location,
                    });
                }
                Err(Error::parse(
                    format!("Operator '{}' cannot be used as a value", token.value),
                    location,
                ))
            }
            TokenType::Eof => Err(Error::parse(
                "Unexpected end of expression",
                Some(token.location()),
            )),
            TokenType::CloseParen => Err(Error::parse(
                "Unmatched closing parenthesis",
                Some(token.location()),
            )),
            _ => Err(Error::parse(
                format!("Unexpected token '{}'", describe(&token)),
                Some(token.location()),
            )),
        }
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression> {
        let token = self.expect(TokenType::If, "'if'")?;
        let condition = self.parse_condition()?;
        self.expect(TokenType::Then, "'then' after condition")?;
        let then_value = self.parse_expression()?;
        self.expect(TokenType::Else, "'else' branch")?;
        let else_value = self.parse_expression()?;
        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
            location: Some(token.location()),
        })
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>> {
        let mut args = Vec::new();
        if !self.check(TokenType::CloseParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.check(TokenType::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenType::CloseParen, "')' to close the argument list")?;
        Ok(args)
    }

    // ============================================
    // Actions
    // ============================================

    fn parse_action(&mut self) -> Result<Action> {
        let token = self.current().clone();

        if token.token_type == TokenType::Identifier {
            match token.value.as_str() {
                "set" => {
                    self.advance();
                    let target = self.parse_action_target()?;
                    self.expect(TokenType::To, "'to' after the target name")?;
                    let value = self.parse_action_rhs()?;
                    return Ok(Action::Set {
                        target,
                        value,
                        location: Some(token.location()),
                    });
                }
                "calculate" => {
                    self.advance();
                    let target = self.parse_action_target()?;
                    self.expect(TokenType::As, "'as' after the target name")?;
                    let expression = self.parse_action_rhs()?;
                    return Ok(Action::Calculate {
                        target,
                        expression,
                        location: Some(token.location()),
                    });
                }
                "circuit_breaker" => {
                    self.advance();
                    self.expect(TokenType::OpenParen, "'(' after circuit_breaker")?;
                    let message =
                        self.expect(TokenType::StringLiteral, "circuit-breaker message string")?;
                    self.expect(TokenType::CloseParen, "')' after the message")?;
                    let location = Some(token.location());
                    return Ok(Action::CircuitBreaker {
                        condition: None,
                        message: message.value,
                        location,
                    });
                }
                _ => {
                    // Bare function-call action: `log_decision(...)`.
                    if self.tokens.get(self.pos + 1).map(|t| &t.token_type)
                        == Some(&TokenType::OpenParen)
                    {
                        self.advance();
                        self.advance();
                        let location = Some(token.location());
                        let args = self.parse_call_args()?;
                        return Ok(Action::Call {
                            name: token.value,
                            args,
                            location,
                        });
                    }
                }
            }
        }

        Err(Error::parse(
            format!(
                "Unrecognized action '{}': expected 'set <name> to <expr>', \
                 'calculate <name> as <expr>', a function call, or circuit_breaker(\"...\")",
                describe(&token)
            ),
            Some(token.location()),
        ))
    }

    fn parse_action_target(&mut self) -> Result<String> {
        let token = self.current().clone();
        if token.token_type != TokenType::Identifier {
            let hint = if token.token_type == TokenType::WordOp || is_reserved_word(&token.value) {
                format!(" ('{}' is a reserved word)", token.value)
            } else {
                String::new()
            };
            return Err(Error::parse(
                format!("Expected a target name, found '{}'{}", describe(&token), hint),
                Some(token.location()),
            ));
        }
        self.advance();

        let location = Some(token.location());
        let name = token.value;
        let snake = name.starts_with(|c: char| c.is_ascii_lowercase())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !snake {
            return Err(Error::Naming {
                message: format!(
                    "Action target '{}' must be snake_case; rename it to '{}'",
                    name,
                    to_snake_case(&name)
                ),
                location,
            });
        }
        Ok(name)
    }

    /// Action right-hand sides admit comparisons; a comparison desugars to a
    /// boolean-producing conditional expression via [`expression_operand`].
    fn parse_action_rhs(&mut self) -> Result<Expression> {
        self.parse_expression()
    }
}

/// View a condition as an expression operand: bare expressions pass
/// through, real conditions desugar to a boolean-producing conditional.
fn expression_operand(condition: Condition) -> Expression {
    match condition {
        Condition::Expr { expr } => expr,
        other => {
            let location = other.location();
            Expression::Conditional {
                condition: Box::new(other),
                then_value: Box::new(Expression::literal(Value::Bool(true))),
                else_value: Box::new(Expression::literal(Value::Bool(false))),
                location,
            }
        }
    }
}

fn parse_decimal(text: &str) -> std::result::Result<Decimal, String> {
    if text.contains('e') || text.contains('E') {
        Decimal::from_scientific(text)
            .map_err(|_| format!("Number '{}' is out of range", text))
    } else {
        Decimal::from_str(text).map_err(|_| format!("Number '{}' is out of range", text))
    }
}

fn describe(token: &Token) -> String {
    if token.token_type == TokenType::Eof {
        "end of input".to_string()
    } else {
        token.value.clone()
    }
}

/// Best-effort snake_case rewrite used in error suggestions.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') && !name[..i].ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// camelCase rewrite used in input-name suggestions.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        let condition =
            ExpressionParser::parse_condition_string("creditScore at_least 700").unwrap();
        match condition {
            Condition::Comparison {
                left, op, right, ..
            } => {
                assert!(matches!(
                    left,
                    Expression::Variable { kind: NameKind::Input, .. }
                ));
                assert_eq!(op, CompareOp::GreaterThanOrEqual);
                assert!(right.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_logical_chain_flattens() {
        let condition = ExpressionParser::parse_condition_string(
            "a > 1 and b > 2 and c > 3",
        )
        .unwrap();
        match condition {
            Condition::Logical { op, children, .. } => {
                assert_eq!(op, LogicalOp::And);
                assert_eq!(children.len(), 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_between_range() {
        let condition =
            ExpressionParser::parse_condition_string("age between 18 and 65").unwrap();
        match condition {
            Condition::Comparison { op, right, .. } => {
                assert_eq!(op, CompareOp::Between);
                match right.unwrap() {
                    Expression::ListLiteral { elements, .. } => assert_eq!(elements.len(), 2),
                    other => panic!("unexpected rhs: {:?}", other),
                }
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_between_followed_by_and() {
        let condition = ExpressionParser::parse_condition_string(
            "age between 18 and 65 and creditScore > 600",
        )
        .unwrap();
        match condition {
            Condition::Logical { op, children, .. } => {
                assert_eq!(op, LogicalOp::And);
                assert_eq!(children.len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_in_list_literal() {
        let condition =
            ExpressionParser::parse_condition_string("tier in_list [\"A\", \"B\"]").unwrap();
        match condition {
            Condition::Comparison { op, right, .. } => {
                assert_eq!(op, CompareOp::InList);
                assert!(matches!(right, Some(Expression::ListLiteral { .. })));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unary_word_op() {
        let condition = ExpressionParser::parse_condition_string("ssn is_ssn").unwrap();
        match condition {
            Condition::Comparison { op, right, .. } => {
                assert_eq!(op, CompareOp::IsSsn);
                assert!(right.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        let expr = ExpressionParser::parse_expression_string("1 + 2 * 3").unwrap();
        match expr {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    *right,
                    Expression::Binary { op: BinaryOp::Multiply, .. }
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_power_right_associative() {
        let expr = ExpressionParser::parse_expression_string("2 ^ 3 ^ 2").unwrap();
        match expr {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Power);
                assert!(matches!(
                    *right,
                    Expression::Binary { op: BinaryOp::Power, .. }
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_null_coalesce() {
        let expr = ExpressionParser::parse_expression_string("middleName ?? \"\"").unwrap();
        assert!(matches!(
            expr,
            Expression::Binary { op: BinaryOp::NullCoalesce, .. }
        ));
    }

    #[test]
    fn test_coalesce_binds_looser_than_or() {
        // `a ?? b or c` is `a ?? (b or c)`.
        let condition = ExpressionParser::parse_condition_string("a ?? b or c").unwrap();
        let Condition::Expr {
            expr: Expression::Binary { op, left, right, .. },
        } = condition
        else {
            panic!("expected a coalesce expression condition");
        };
        assert_eq!(op, BinaryOp::NullCoalesce);
        assert!(matches!(*left, Expression::Variable { ref name, .. } if name == "a"));
        // The right operand is the whole `b or c`, desugared to a boolean.
        match *right {
            Expression::Conditional { ref condition, .. } => {
                assert!(matches!(
                    **condition,
                    Condition::Logical { op: LogicalOp::Or, .. }
                ));
            }
            ref other => panic!("unexpected rhs: {:?}", other),
        }
    }

    #[test]
    fn test_coalesce_binds_looser_than_comparison() {
        // `x == a ?? b` is `(x == a) ?? b`.
        let condition = ExpressionParser::parse_condition_string("x ?? y == 1").unwrap();
        let Condition::Expr {
            expr: Expression::Binary { op, right, .. },
        } = condition
        else {
            panic!("expected a coalesce expression condition");
        };
        assert_eq!(op, BinaryOp::NullCoalesce);
        match *right {
            Expression::Conditional { ref condition, .. } => {
                assert!(matches!(**condition, Condition::Comparison { .. }));
            }
            ref other => panic!("unexpected rhs: {:?}", other),
        }

        let condition = ExpressionParser::parse_condition_string("x == 1 ?? y").unwrap();
        let Condition::Expr {
            expr: Expression::Binary { op, left, .. },
        } = condition
        else {
            panic!("expected a coalesce expression condition");
        };
        assert_eq!(op, BinaryOp::NullCoalesce);
        assert!(matches!(*left, Expression::Conditional { .. }));
    }

    #[test]
    fn test_json_path_postfix() {
        let expr =
            ExpressionParser::parse_expression_string("customer.address.city").unwrap();
        match expr {
            Expression::JsonPath { object, path, .. } => {
                assert!(matches!(*object, Expression::Variable { .. }));
                assert_eq!(path, "address.city");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_index_postfix() {
        let expr = ExpressionParser::parse_expression_string("items[0].price").unwrap();
        match expr {
            Expression::JsonPath { path, .. } => assert_eq!(path, "[0].price"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_function_call() {
        let expr =
            ExpressionParser::parse_expression_string("round(debt_ratio * 100, 2)").unwrap();
        match expr {
            Expression::FunctionCall { name, args, .. } => {
                assert_eq!(name, "round");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_condition_group() {
        let condition = ExpressionParser::parse_condition_string(
            "(a > 1 or b > 2) and c is_not_null",
        )
        .unwrap();
        match condition {
            Condition::Logical { op, children, .. } => {
                assert_eq!(op, LogicalOp::And);
                assert!(matches!(
                    children[0],
                    Condition::Logical { op: LogicalOp::Or, .. }
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_expression_operand() {
        let condition =
            ExpressionParser::parse_condition_string("(a + b) > c").unwrap();
        assert!(matches!(condition, Condition::Comparison { .. }));
    }

    #[test]
    fn test_set_action() {
        let action =
            ExpressionParser::parse_action_string("set eligible to true").unwrap();
        match action {
            Action::Set { target, value, .. } => {
                assert_eq!(target, "eligible");
                assert!(matches!(
                    value,
                    Expression::Literal { value: Value::Bool(true), .. }
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_calculate_action() {
        let action = ExpressionParser::parse_action_string(
            "calculate risk_factor as debt_to_income * RISK_MULTIPLIER",
        )
        .unwrap();
        match action {
            Action::Calculate { target, .. } => assert_eq!(target, "risk_factor"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_target_naming_violation_suggests_rename() {
        let err =
            ExpressionParser::parse_action_string("set RiskScore to 1").unwrap_err();
        match err {
            Error::Naming { message, .. } => {
                assert!(message.contains("risk_score"), "message: {}", message);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_circuit_breaker_action() {
        let action = ExpressionParser::parse_action_string(
            "circuit_breaker(\"risk too high\")",
        )
        .unwrap();
        match action {
            Action::CircuitBreaker { message, .. } => assert_eq!(message, "risk too high"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_word_operator_as_function_call() {
        let expr =
            ExpressionParser::parse_expression_string("is_routing_number(routingNumber)").unwrap();
        match expr {
            Expression::FunctionCall { name, args, .. } => {
                assert_eq!(name, "is_routing_number");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_word_operator_without_args_is_not_a_value() {
        assert!(ExpressionParser::parse_expression_string("1 + between").is_err());
    }

    #[test]
    fn test_unmatched_open_paren_is_hard_error() {
        assert!(ExpressionParser::parse_expression_string("(1 + 2").is_err());
    }

    #[test]
    fn test_unmatched_close_paren_is_hard_error() {
        assert!(ExpressionParser::parse_expression_string("1 + 2)").is_err());
    }

    #[test]
    fn test_conditional_expression() {
        let expr = ExpressionParser::parse_expression_string(
            "if creditScore >= 700 then \"PRIME\" else \"STANDARD\"",
        )
        .unwrap();
        assert!(matches!(expr, Expression::Conditional { .. }));
    }

    #[test]
    fn test_depth_cap() {
        let deep = format!("{}1{}", "(".repeat(60), ")".repeat(60));
        let err = ExpressionParser::parse_expression_string(&deep).unwrap_err();
        assert_eq!(err.code(), "TOO_COMPLEX");
    }

    #[test]
    fn test_reserved_word_as_target_rejected() {
        assert!(ExpressionParser::parse_action_string("set contains to 5").is_err());
    }

    #[test]
    fn test_round_trip_to_dsl() {
        for source in [
            "creditScore at_least 700",
            "a > 1 and b > 2",
            "debt_to_income * RISK_MULTIPLIER",
            "round(x_val / y_val, 2)",
            "age between 18 and 65",
        ] {
            let first = ExpressionParser::parse_condition_string(source).unwrap();
            let second = ExpressionParser::parse_condition_string(&first.to_dsl()).unwrap();
            assert_eq!(first.to_dsl(), second.to_dsl(), "source: {}", source);
        }
    }
}
