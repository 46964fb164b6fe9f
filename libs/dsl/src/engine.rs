//! Engine facade: compile with caching, validate, evaluate, batch-evaluate.
//!
//! Compiled rule sets are immutable and shared behind `Arc`, so the cache
//! tolerates concurrent readers without locks beyond the LRU map itself.
//! The cache key is the SHA-256 of the source text plus the DSL version.

use crate::constants::ConstantStore;
use crate::error::Error;
use crate::eval::{evaluate_rule_set, EvalOptions, EvaluateResponse};
use crate::parser::{parse_document, ParseDiagnostic};
use crate::transport::HttpTransport;
use crate::validate::{validate, ValidationReport};
use crate::ast::RuleSet;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Version tag mixed into cache keys; bump on grammar changes.
pub const DSL_VERSION: &str = "1.0";

const DEFAULT_CACHE_SIZE: usize = 256;

/// Outcome of compiling one rule document.
#[derive(Debug)]
pub struct Compiled {
    /// Absent only when the YAML itself was malformed.
    pub rule_set: Option<Arc<RuleSet>>,
    pub diagnostics: Vec<ParseDiagnostic>,
    /// Present when the diagnostic set contains no fatal error.
    pub validation: Option<ValidationReport>,
}

impl Compiled {
    /// True when evaluation may proceed.
    pub fn is_evaluable(&self) -> bool {
        self.rule_set.is_some()
            && !self
                .diagnostics
                .iter()
                .any(|d| d.severity == crate::parser::DiagnosticSeverity::Error)
            && self
                .validation
                .as_ref()
                .map(|report| !report.has_blocking_issues())
                .unwrap_or(false)
    }

    fn first_problem(&self) -> String {
        if let Some(diagnostic) = self
            .diagnostics
            .iter()
            .find(|d| d.severity == crate::parser::DiagnosticSeverity::Error)
        {
            return format!("[{}] {}", diagnostic.code, diagnostic.message);
        }
        if let Some(report) = &self.validation {
            if let Some(issue) = report
                .issues
                .iter()
                .find(|i| i.severity <= crate::validate::Severity::Error)
            {
                return format!("[{}] {}", issue.code, issue.message);
            }
        }
        "rule cannot be evaluated".to_string()
    }
}

/// One request in a batch evaluation.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub source: String,
    pub inputs: serde_json::Map<String, serde_json::Value>,
}

/// Batch evaluation options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_concurrency: usize,
    /// Overall wall-clock budget for the whole batch.
    pub timeout: Duration,
    /// Abort remaining requests after the first failure.
    pub fail_fast: bool,
    /// Dispatch higher-priority rules (metadata.priority) first.
    pub sort_by_priority: bool,
    /// On batch timeout, keep the responses that finished.
    pub return_partial_results: bool,
    pub eval: EvalOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            timeout: Duration::from_secs(60),
            fail_fast: false,
            sort_by_priority: false,
            return_partial_results: true,
            eval: EvalOptions::default(),
        }
    }
}

/// Aggregated batch outcome. `responses[i]` corresponds to `requests[i]`
/// regardless of dispatch order; `None` marks requests that never ran.
#[derive(Debug)]
pub struct BatchOutcome {
    pub responses: Vec<Option<EvaluateResponse>>,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: bool,
}

/// Rule engine with a bounded compiled-rule cache.
pub struct Engine {
    cache: Arc<Mutex<LruCache<String, Arc<Compiled>>>>,
    constant_store: Option<Arc<dyn ConstantStore>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_CACHE_SIZE).expect("nonzero cache size"),
            ))),
            constant_store: None,
            transport: None,
        }
    }

    pub fn with_constant_store(mut self, store: Arc<dyn ConstantStore>) -> Self {
        self.constant_store = Some(store);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Compile a rule document, consulting the cache first. Validators run
    /// only when parsing produced no fatal diagnostics.
    pub fn compile(&self, source: &str) -> Arc<Compiled> {
        let key = cache_key(source);
        if let Some(hit) = self.cache.lock().expect("cache lock").get(&key) {
            tracing::debug!(key = %key, "compiled-rule cache hit");
            return hit.clone();
        }

        let outcome = parse_document(source);
        let has_errors = outcome.has_errors();
        let rule_set = outcome.rule_set.map(Arc::new);
        let validation = match (&rule_set, has_errors) {
            (Some(rule_set), false) => Some(validate(rule_set)),
            _ => None,
        };
        let compiled = Arc::new(Compiled {
            rule_set,
            diagnostics: outcome.diagnostics,
            validation,
        });

        self.cache
            .lock()
            .expect("cache lock")
            .put(key, compiled.clone());
        compiled
    }

    pub fn clear_cache(&self) {
        self.cache.lock().expect("cache lock").clear();
    }

    /// Compile, validate, and evaluate one rule document.
    ///
    /// The returned future is cancellable by dropping it; cancellation is
    /// observed at the suspension points (constant fetch, HTTP calls) and no
    /// partial result is produced.
    pub async fn evaluate(
        &self,
        source: &str,
        inputs: serde_json::Map<String, serde_json::Value>,
        options: &EvalOptions,
    ) -> EvaluateResponse {
        let compiled = self.compile(source);
        self.evaluate_compiled(&compiled, inputs, options).await
    }

    pub async fn evaluate_compiled(
        &self,
        compiled: &Compiled,
        inputs: serde_json::Map<String, serde_json::Value>,
        options: &EvalOptions,
    ) -> EvaluateResponse {
        let started = std::time::Instant::now();
        if !compiled.is_evaluable() {
            return EvaluateResponse {
                success: false,
                condition_result: false,
                output: Default::default(),
                circuit_breaker_triggered: false,
                circuit_breaker_message: None,
                error: Some(compiled.first_problem()),
                execution_time_ms: started.elapsed().as_millis() as u64,
            };
        }
        let rule_set = compiled.rule_set.as_ref().expect("evaluable implies rule set");

        let evaluation = evaluate_rule_set(
            rule_set,
            inputs,
            self.constant_store.as_deref(),
            self.transport.clone(),
            options,
        );
        match tokio::time::timeout(options.timeout, evaluation).await {
            Ok(response) => response,
            Err(_) => EvaluateResponse {
                success: false,
                condition_result: false,
                output: Default::default(),
                circuit_breaker_triggered: false,
                circuit_breaker_message: None,
                error: Some(Error::Timeout.to_string()),
                execution_time_ms: started.elapsed().as_millis() as u64,
            },
        }
    }

    /// Evaluate a batch of requests with bounded concurrency.
    ///
    /// Each request fails or succeeds independently unless `fail_fast` is
    /// set; per-request failures are reported alongside successes.
    pub async fn evaluate_batch(
        &self,
        requests: Vec<BatchRequest>,
        options: &BatchOptions,
    ) -> BatchOutcome {
        let total = requests.len();
        let compiled: Vec<Arc<Compiled>> = requests
            .iter()
            .map(|request| self.compile(&request.source))
            .collect();

        let mut order: Vec<usize> = (0..total).collect();
        if options.sort_by_priority {
            order.sort_by_key(|&index| {
                let priority = compiled[index]
                    .rule_set
                    .as_ref()
                    .and_then(|r| r.metadata.priority)
                    .unwrap_or(0);
                std::cmp::Reverse(priority)
            });
        }

        let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
        let abort = Arc::new(AtomicBool::new(false));
        let results: Arc<Mutex<Vec<Option<EvaluateResponse>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));

        let run_all = async {
            let mut tasks = Vec::with_capacity(total);
            for index in order {
                let request = requests[index].inputs.clone();
                let compiled = compiled[index].clone();
                let semaphore = semaphore.clone();
                let abort = abort.clone();
                let results = results.clone();
                let fail_fast = options.fail_fast;
                let eval_options = options.eval.clone();

                tasks.push(async move {
                    let _permit = semaphore.acquire().await.expect("semaphore closed");
                    if abort.load(Ordering::Acquire) {
                        return;
                    }
                    let response = self
                        .evaluate_compiled(&compiled, request, &eval_options)
                        .await;
                    if fail_fast && !response.success {
                        abort.store(true, Ordering::Release);
                    }
                    results.lock().expect("results lock")[index] = Some(response);
                });
            }
            futures::future::join_all(tasks).await;
        };

        let timed_out = tokio::time::timeout(options.timeout, run_all)
            .await
            .is_err();

        let responses = if timed_out && !options.return_partial_results {
            (0..total).map(|_| None).collect()
        } else {
            std::mem::take(&mut *results.lock().expect("results lock"))
        };

        let succeeded = responses
            .iter()
            .filter(|r| r.as_ref().map(|r| r.success).unwrap_or(false))
            .count();
        let failed = responses
            .iter()
            .filter(|r| r.as_ref().map(|r| !r.success).unwrap_or(false))
            .count();

        BatchOutcome {
            responses,
            succeeded,
            failed,
            timed_out,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(DSL_VERSION.as_bytes());
    hasher.update(b"\0");
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: &str = r#"
name: cached_rule
description: engine test
inputs: [creditScore]
when: [creditScore at_least 700]
then: [set eligible to true]
else: [set eligible to false]
output: {eligible: boolean}
"#;

    #[test]
    fn test_compile_cache_returns_same_arc() {
        let engine = Engine::new();
        let first = engine.compile(RULE);
        let second = engine.compile(RULE);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_validator_blocked_rule_is_not_evaluable() {
        let engine = Engine::new();
        let compiled = engine.compile(
            r#"
name: blocked
description: order error
inputs: [a]
when: [not_yet_set == 1]
then: [set not_yet_set to 1]
"#,
        );
        assert!(!compiled.is_evaluable());
    }

    #[tokio::test]
    async fn test_evaluate_happy_path() {
        let engine = Engine::new();
        let inputs = match serde_json::json!({"creditScore": 710}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let response = engine
            .evaluate(RULE, inputs, &EvalOptions::default())
            .await;
        assert!(response.success, "error: {:?}", response.error);
        assert!(response.condition_result);
    }

    #[tokio::test]
    async fn test_evaluate_blocked_rule_reports_issue() {
        let engine = Engine::new();
        let response = engine
            .evaluate(
                r#"
name: blocked
description: order error
inputs: [a]
when: [later_value == 1]
then: [set later_value to 1]
"#,
                serde_json::Map::new(),
                &EvalOptions::default(),
            )
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("DEP_002"));
    }

    #[tokio::test]
    async fn test_batch_preserves_request_order() {
        let engine = Engine::new();
        let requests = vec![
            BatchRequest {
                source: RULE.to_string(),
                inputs: match serde_json::json!({"creditScore": 710}) {
                    serde_json::Value::Object(map) => map,
                    _ => unreachable!(),
                },
            },
            BatchRequest {
                source: RULE.to_string(),
                inputs: match serde_json::json!({"creditScore": 500}) {
                    serde_json::Value::Object(map) => map,
                    _ => unreachable!(),
                },
            },
        ];
        let outcome = engine
            .evaluate_batch(requests, &BatchOptions::default())
            .await;
        assert_eq!(outcome.succeeded, 2);
        assert!(outcome.responses[0].as_ref().unwrap().condition_result);
        assert!(!outcome.responses[1].as_ref().unwrap().condition_result);
    }
}
