//! Derived financial ratios.
//!
//! A closed set of snake_case names resolves by computation when no action
//! has produced them. Each reads a fixed tuple of inputs under canonical
//! camelCase names, returns Null when any is missing, and never caches.
//! An explicit `set`/`calculate` to the same name shadows the derivation
//! because the computed tier is consulted first.

use crate::context::EvaluationContext;
use crate::value::Value;
use rust_decimal::Decimal;

/// Canonical derived-variable names.
pub const DERIVED_NAMES: &[&str] = &[
    "loan_to_income",
    "debt_to_income",
    "credit_utilization",
    "loan_to_value",
    "payment_to_income",
    "total_debt_service",
];

pub fn is_derived(name: &str) -> bool {
    DERIVED_NAMES.contains(&name)
}

/// Compute a derived ratio from the input tier. Missing inputs yield Null;
/// a zero denominator yields the infinity sentinel (financial-ratio rule).
pub fn compute(name: &str, ctx: &EvaluationContext) -> Value {
    match name {
        "loan_to_income" => ratio(ctx, &["loanAmount"], "annualIncome"),
        "debt_to_income" => ratio(ctx, &["monthlyDebtPayments"], "monthlyIncome"),
        "credit_utilization" => ratio(ctx, &["creditUsed"], "creditLimit"),
        "loan_to_value" => ratio(ctx, &["loanAmount"], "propertyValue"),
        "payment_to_income" => ratio(ctx, &["monthlyPayment"], "monthlyIncome"),
        "total_debt_service" => ratio(
            ctx,
            &["monthlyDebtPayments", "monthlyPayment"],
            "monthlyIncome",
        ),
        _ => Value::Null,
    }
}

fn ratio(ctx: &EvaluationContext, numerators: &[&str], denominator: &str) -> Value {
    let mut total = Decimal::ZERO;
    for name in numerators {
        match input_decimal(ctx, name) {
            Some(v) => total += v,
            None => return Value::Null,
        }
    }
    let Some(denominator) = input_decimal(ctx, denominator) else {
        return Value::Null;
    };
    if denominator.is_zero() {
        return Value::Infinity;
    }
    Value::Number(total / denominator)
}

fn input_decimal(ctx: &EvaluationContext, name: &str) -> Option<Decimal> {
    ctx.input(name).and_then(Value::as_decimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debt_to_income() {
        let mut ctx = EvaluationContext::new("op".to_string());
        ctx.set_input("monthlyDebtPayments", Value::int(2000));
        ctx.set_input("monthlyIncome", Value::int(5000));
        assert_eq!(
            compute("debt_to_income", &ctx),
            Value::Number(Decimal::new(4, 1))
        );
    }

    #[test]
    fn test_missing_input_is_null() {
        let ctx = EvaluationContext::new("op".to_string());
        assert_eq!(compute("loan_to_value", &ctx), Value::Null);
    }

    #[test]
    fn test_zero_denominator_is_infinity() {
        let mut ctx = EvaluationContext::new("op".to_string());
        ctx.set_input("creditUsed", Value::int(100));
        ctx.set_input("creditLimit", Value::int(0));
        assert_eq!(compute("credit_utilization", &ctx), Value::Infinity);
    }

    #[test]
    fn test_total_debt_service_sums_numerators() {
        let mut ctx = EvaluationContext::new("op".to_string());
        ctx.set_input("monthlyDebtPayments", Value::int(1000));
        ctx.set_input("monthlyPayment", Value::int(1500));
        ctx.set_input("monthlyIncome", Value::int(5000));
        assert_eq!(
            compute("total_debt_service", &ctx),
            Value::Number(Decimal::new(5, 1))
        );
    }
}
