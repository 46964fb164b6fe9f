//! Evaluation context: the mutable state of a single rule run.
//!
//! The context owns three variable tiers with strict lookup priority
//! (computed > input > constant). It is created per evaluation and never
//! shared; the AST stays immutable, so all run state lives here.

use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::Instant;

/// Maximum expression-evaluation nesting depth.
pub const MAX_EVAL_DEPTH: usize = 50;

/// Per-evaluation variable store and run state.
pub struct EvaluationContext {
    /// Insertion-ordered so output projection is deterministic.
    computed: IndexMap<String, Value>,
    inputs: HashMap<String, Value>,
    constants: HashMap<String, Value>,
    /// Opaque correlation identifier carried through logs and HTTP calls.
    pub operation_id: String,
    pub started_at: Instant,
    circuit_breaker_triggered: bool,
    circuit_breaker_message: Option<String>,
    depth: usize,
}

impl EvaluationContext {
    pub fn new(operation_id: String) -> Self {
        Self {
            computed: IndexMap::new(),
            inputs: HashMap::new(),
            constants: HashMap::new(),
            operation_id,
            started_at: Instant::now(),
            circuit_breaker_triggered: false,
            circuit_breaker_message: None,
            depth: 0,
        }
    }

    /// Lookup with strict tier priority: computed, then input, then constant.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.computed
            .get(name)
            .or_else(|| self.inputs.get(name))
            .or_else(|| self.constants.get(name))
    }

    /// Write the computed tier. Shadowing an input or constant of the same
    /// name is deliberate: computed wins for the rest of the evaluation.
    pub fn set_computed(&mut self, name: impl Into<String>, value: Value) {
        self.computed.insert(name.into(), value);
    }

    pub fn set_input(&mut self, name: impl Into<String>, value: Value) {
        self.inputs.insert(name.into(), value);
    }

    pub fn set_constant(&mut self, name: impl Into<String>, value: Value) {
        self.constants.insert(name.into(), value);
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_constant(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// The computed tier in insertion order.
    pub fn computed(&self) -> &IndexMap<String, Value> {
        &self.computed
    }

    pub fn trip_circuit_breaker(&mut self, message: impl Into<String>) {
        self.circuit_breaker_triggered = true;
        self.circuit_breaker_message = Some(message.into());
    }

    pub fn circuit_breaker_triggered(&self) -> bool {
        self.circuit_breaker_triggered
    }

    pub fn circuit_breaker_message(&self) -> Option<&str> {
        self.circuit_breaker_message.as_deref()
    }

    /// Guard against pathological expression nesting during evaluation.
    pub fn enter(&mut self) -> crate::error::Result<()> {
        self.depth += 1;
        if self.depth > MAX_EVAL_DEPTH {
            return Err(crate::error::Error::TooComplex(MAX_EVAL_DEPTH));
        }
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
