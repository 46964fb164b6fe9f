//! Constant store interface and pre-evaluation constant resolution.
//!
//! Constants (UPPER_SNAKE names) resolve from an external store. Before
//! evaluation begins, a static scan of the AST enumerates every referenced
//! constant, inline declarations are subtracted, and the remainder is fetched
//! in one batch. Missing constants are logged as warnings here; the
//! evaluator raises `UNDEFINED_CONSTANT` only if one is actually read.

use crate::ast::{AstVisitor, Expression, NameKind, RuleSet};
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

/// Value type tag carried by stored constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstantValueType {
    Number,
    String,
    Boolean,
    Date,
    Object,
}

/// A constant as returned by the external store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Constant {
    pub code: String,
    pub value_type: ConstantValueType,
    pub value: serde_json::Value,
}

impl Constant {
    pub fn to_value(&self) -> Value {
        Value::from_json(&self.value)
    }
}

/// External constant store.
///
/// Implementations may be database-backed, HTTP-backed, or in-memory; the
/// engine only sees this seam. `batch_get` returns the constants it found;
/// absent codes are simply missing from the map.
#[async_trait]
pub trait ConstantStore: Send + Sync {
    async fn get(&self, code: &str) -> Result<Option<Constant>>;

    async fn batch_get(&self, codes: &[String]) -> Result<HashMap<String, Constant>> {
        let mut found = HashMap::new();
        for code in codes {
            if let Some(constant) = self.get(code).await? {
                found.insert(code.clone(), constant);
            }
        }
        Ok(found)
    }
}

/// In-memory store used by tests and the CLI.
#[derive(Default)]
pub struct MemoryConstantStore {
    constants: HashMap<String, Constant>,
}

impl MemoryConstantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, code: &str, value: serde_json::Value) -> Self {
        let value_type = match &value {
            serde_json::Value::Number(_) => ConstantValueType::Number,
            serde_json::Value::Bool(_) => ConstantValueType::Boolean,
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                ConstantValueType::Object
            }
            _ => ConstantValueType::String,
        };
        self.constants.insert(
            code.to_string(),
            Constant {
                code: code.to_string(),
                value_type,
                value,
            },
        );
        self
    }
}

#[async_trait]
impl ConstantStore for MemoryConstantStore {
    async fn get(&self, code: &str) -> Result<Option<Constant>> {
        Ok(self.constants.get(code).cloned())
    }
}

/// Collect every constant reference in a rule set, sorted for determinism.
pub fn collect_constant_refs(rule_set: &RuleSet) -> Vec<String> {
    struct Collector {
        names: BTreeSet<String>,
    }

    impl AstVisitor for Collector {
        fn visit_expression(&mut self, expr: &Expression) {
            if let Expression::Variable {
                name,
                kind: NameKind::Constant,
                ..
            } = expr
            {
                self.names.insert(name.clone());
            }
            crate::ast::walk_expression(self, expr);
        }
    }

    let mut collector = Collector {
        names: BTreeSet::new(),
    };
    rule_set.visit(&mut collector);
    collector.names.into_iter().collect()
}

/// Seed the context's constant tier: inline constants first, then a single
/// batch fetch for whatever the rule references beyond them.
pub async fn resolve_constants(
    rule_set: &RuleSet,
    store: Option<&dyn ConstantStore>,
    ctx: &mut EvaluationContext,
) -> Result<()> {
    for inline in &rule_set.constants {
        ctx.set_constant(inline.name.clone(), inline.value.clone());
    }

    let missing: Vec<String> = collect_constant_refs(rule_set)
        .into_iter()
        .filter(|name| !ctx.has_constant(name))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let Some(store) = store else {
        tracing::warn!(
            operation_id = %ctx.operation_id,
            constants = ?missing,
            "no constant store configured; referenced constants left unresolved"
        );
        return Ok(());
    };

    let found = store.batch_get(&missing).await?;
    for name in &missing {
        match found.get(name) {
            Some(constant) => ctx.set_constant(name.clone(), constant.to_value()),
            None => tracing::warn!(
                operation_id = %ctx.operation_id,
                constant = %name,
                "constant not found in store"
            ),
        }
    }
    Ok(())
}
