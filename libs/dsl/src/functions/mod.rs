//! Built-in function library.
//!
//! Operations are grouped and addressed by lowercase name. The registry is a
//! compile-time perfect hash map, so name lookup is O(1) with no runtime
//! allocation. Each entry carries a fixed arity contract enforced before
//! dispatch; violations surface as `ARITY_*` errors.
//!
//! All groups except HTTP are synchronous; the `rest_*` built-ins suspend on
//! the transport and are dispatched by the evaluator instead of
//! [`dispatch_sync`].

pub mod financial;
pub mod geo;
pub mod http;
pub mod json_path;
pub mod math;
pub mod stats;
pub mod temporal;
pub mod validation;

use crate::error::{Error, Result};
use crate::value::Value;
use phf::phf_map;
use rust_decimal::Decimal;

/// Function group; selects the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionGroup {
    Math,
    Financial,
    Statistical,
    Temporal,
    Json,
    Validation,
    Http,
    Geo,
}

/// Function metadata.
#[derive(Debug, Clone, Copy)]
pub struct FunctionMetadata {
    pub name: &'static str,
    pub group: FunctionGroup,
    pub min_args: usize,
    pub max_args: Option<usize>, // None = unbounded
}

/// Static compile-time function registry.
static FUNCTIONS_BY_NAME: phf::Map<&'static str, FunctionMetadata> = phf_map! {
    // Arithmetic
    "add" => FunctionMetadata { name: "add", group: FunctionGroup::Math, min_args: 2, max_args: None },
    "subtract" => FunctionMetadata { name: "subtract", group: FunctionGroup::Math, min_args: 2, max_args: Some(2) },
    "multiply" => FunctionMetadata { name: "multiply", group: FunctionGroup::Math, min_args: 2, max_args: None },
    "divide" => FunctionMetadata { name: "divide", group: FunctionGroup::Math, min_args: 2, max_args: Some(2) },
    "modulo" => FunctionMetadata { name: "modulo", group: FunctionGroup::Math, min_args: 2, max_args: Some(2) },
    "power" => FunctionMetadata { name: "power", group: FunctionGroup::Math, min_args: 2, max_args: Some(2) },
    "abs" => FunctionMetadata { name: "abs", group: FunctionGroup::Math, min_args: 1, max_args: Some(1) },
    "min" => FunctionMetadata { name: "min", group: FunctionGroup::Math, min_args: 1, max_args: None },
    "max" => FunctionMetadata { name: "max", group: FunctionGroup::Math, min_args: 1, max_args: None },
    "round" => FunctionMetadata { name: "round", group: FunctionGroup::Math, min_args: 1, max_args: Some(2) },
    "floor" => FunctionMetadata { name: "floor", group: FunctionGroup::Math, min_args: 1, max_args: Some(1) },
    "ceil" => FunctionMetadata { name: "ceil", group: FunctionGroup::Math, min_args: 1, max_args: Some(1) },

    // Financial
    "npv" => FunctionMetadata { name: "npv", group: FunctionGroup::Financial, min_args: 2, max_args: None },
    "irr" => FunctionMetadata { name: "irr", group: FunctionGroup::Financial, min_args: 2, max_args: None },
    "pmt" => FunctionMetadata { name: "pmt", group: FunctionGroup::Financial, min_args: 3, max_args: Some(5) },
    "pv" => FunctionMetadata { name: "pv", group: FunctionGroup::Financial, min_args: 3, max_args: Some(5) },
    "fv" => FunctionMetadata { name: "fv", group: FunctionGroup::Financial, min_args: 3, max_args: Some(5) },
    "compound_interest" => FunctionMetadata { name: "compound_interest", group: FunctionGroup::Financial, min_args: 3, max_args: Some(4) },
    "simple_interest" => FunctionMetadata { name: "simple_interest", group: FunctionGroup::Financial, min_args: 3, max_args: Some(3) },
    "loan_payment" => FunctionMetadata { name: "loan_payment", group: FunctionGroup::Financial, min_args: 3, max_args: Some(3) },
    "ratio" => FunctionMetadata { name: "ratio", group: FunctionGroup::Financial, min_args: 2, max_args: Some(2) },

    // Statistical
    "var" => FunctionMetadata { name: "var", group: FunctionGroup::Statistical, min_args: 3, max_args: Some(4) },
    "sharpe_ratio" => FunctionMetadata { name: "sharpe_ratio", group: FunctionGroup::Statistical, min_args: 3, max_args: Some(3) },
    "volatility" => FunctionMetadata { name: "volatility", group: FunctionGroup::Statistical, min_args: 1, max_args: None },
    "correlation" => FunctionMetadata { name: "correlation", group: FunctionGroup::Statistical, min_args: 3, max_args: None },
    "beta" => FunctionMetadata { name: "beta", group: FunctionGroup::Statistical, min_args: 3, max_args: None },

    // Date/time
    "days_between" => FunctionMetadata { name: "days_between", group: FunctionGroup::Temporal, min_args: 2, max_args: Some(2) },
    "months_between" => FunctionMetadata { name: "months_between", group: FunctionGroup::Temporal, min_args: 2, max_args: Some(2) },
    "years_between" => FunctionMetadata { name: "years_between", group: FunctionGroup::Temporal, min_args: 2, max_args: Some(2) },
    "age_in_years" => FunctionMetadata { name: "age_in_years", group: FunctionGroup::Temporal, min_args: 1, max_args: Some(1) },
    "now" => FunctionMetadata { name: "now", group: FunctionGroup::Temporal, min_args: 0, max_args: Some(0) },
    "format_date" => FunctionMetadata { name: "format_date", group: FunctionGroup::Temporal, min_args: 2, max_args: Some(2) },

    // JSON path
    "json_get" => FunctionMetadata { name: "json_get", group: FunctionGroup::Json, min_args: 2, max_args: Some(2) },
    "json_exists" => FunctionMetadata { name: "json_exists", group: FunctionGroup::Json, min_args: 2, max_args: Some(2) },

    // Validation
    "is_credit_score" => FunctionMetadata { name: "is_credit_score", group: FunctionGroup::Validation, min_args: 1, max_args: Some(1) },
    "is_ssn" => FunctionMetadata { name: "is_ssn", group: FunctionGroup::Validation, min_args: 1, max_args: Some(1) },
    "is_routing_number" => FunctionMetadata { name: "is_routing_number", group: FunctionGroup::Validation, min_args: 1, max_args: Some(1) },
    "is_account_number" => FunctionMetadata { name: "is_account_number", group: FunctionGroup::Validation, min_args: 1, max_args: Some(1) },
    "is_email" => FunctionMetadata { name: "is_email", group: FunctionGroup::Validation, min_args: 1, max_args: Some(1) },
    "is_phone" => FunctionMetadata { name: "is_phone", group: FunctionGroup::Validation, min_args: 1, max_args: Some(1) },

    // HTTP (async; dispatched by the evaluator, not dispatch_sync)
    "rest_get" => FunctionMetadata { name: "rest_get", group: FunctionGroup::Http, min_args: 1, max_args: Some(1) },
    "rest_post" => FunctionMetadata { name: "rest_post", group: FunctionGroup::Http, min_args: 2, max_args: Some(2) },
    "rest_put" => FunctionMetadata { name: "rest_put", group: FunctionGroup::Http, min_args: 2, max_args: Some(2) },
    "rest_delete" => FunctionMetadata { name: "rest_delete", group: FunctionGroup::Http, min_args: 1, max_args: Some(1) },
    "rest_patch" => FunctionMetadata { name: "rest_patch", group: FunctionGroup::Http, min_args: 2, max_args: Some(2) },
    "rest_call" => FunctionMetadata { name: "rest_call", group: FunctionGroup::Http, min_args: 2, max_args: Some(3) },

    // Geodetic
    "distance_between" => FunctionMetadata { name: "distance_between", group: FunctionGroup::Geo, min_args: 2, max_args: Some(2) },
};

/// Look up function metadata by lowercase name.
pub fn lookup(name: &str) -> Option<&'static FunctionMetadata> {
    FUNCTIONS_BY_NAME.get(name)
}

/// Enforce the arity contract for `meta` against `got` arguments.
pub fn check_arity(meta: &FunctionMetadata, got: usize) -> Result<()> {
    let ok = got >= meta.min_args && meta.max_args.map(|max| got <= max).unwrap_or(true);
    if ok {
        return Ok(());
    }
    let expected = match meta.max_args {
        Some(max) if max == meta.min_args => format!("{}", meta.min_args),
        Some(max) => format!("{}..{}", meta.min_args, max),
        None => format!("at least {}", meta.min_args),
    };
    Err(Error::Arity {
        function: meta.name.to_string(),
        expected,
        got,
    })
}

/// Dispatch a synchronous built-in. HTTP functions must not reach here.
pub fn dispatch_sync(meta: &FunctionMetadata, args: &[Value]) -> Result<Value> {
    check_arity(meta, args.len())?;
    match meta.group {
        FunctionGroup::Math => math::dispatch(meta.name, args),
        FunctionGroup::Financial => financial::dispatch(meta.name, args),
        FunctionGroup::Statistical => stats::dispatch(meta.name, args),
        FunctionGroup::Temporal => temporal::dispatch(meta.name, args),
        FunctionGroup::Json => json_path::dispatch(meta.name, args),
        FunctionGroup::Validation => validation::dispatch(meta.name, args),
        FunctionGroup::Geo => geo::dispatch(meta.name, args),
        FunctionGroup::Http => Err(Error::Internal(format!(
            "HTTP built-in '{}' dispatched synchronously",
            meta.name
        ))),
    }
}

// ============================================
// Shared argument helpers
// ============================================

pub(crate) fn decimal_arg(function: &str, args: &[Value], index: usize) -> Result<Decimal> {
    args[index].as_decimal().ok_or_else(|| {
        Error::Type(format!(
            "{}() argument {} must be numeric, got {}",
            function,
            index + 1,
            args[index].type_name()
        ))
    })
}

/// Flatten varargs that may mix scalars and lists into one numeric series.
pub(crate) fn numeric_series(function: &str, args: &[Value]) -> Result<Vec<Decimal>> {
    let mut series = Vec::new();
    for arg in args {
        match arg {
            Value::List(items) => {
                for item in items {
                    series.push(item.as_decimal().ok_or_else(|| {
                        Error::Type(format!(
                            "{}() list elements must be numeric, got {}",
                            function,
                            item.type_name()
                        ))
                    })?);
                }
            }
            other => series.push(other.as_decimal().ok_or_else(|| {
                Error::Type(format!(
                    "{}() arguments must be numeric, got {}",
                    function,
                    other.type_name()
                ))
            })?),
        }
    }
    Ok(series)
}
