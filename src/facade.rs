//! `Engine`, `CompiledExpression`, and the JSON evaluation façade (spec §6.2,
//! §6.4; the LRU compile cache is the ambient addition from SPEC_FULL.md
//! §6.5). Grounded on the teacher's `env.rs`/`stdlib_registry.rs` pattern of
//! a single struct bundling a populated registry for a host to embed.

use crate::ast::Expr;
use crate::compile::{docquery, sql};
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::eval::{EvalContext, Evaluator};
use crate::optimizer::Optimizer;
use crate::registry::{FunctionDescriptor, Registry, Signature};
use crate::sandbox::GuestSandbox;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// A parsed-and-folded expression, kept alongside its original AST and
/// source text (spec §6.2).
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    pub source: String,
    pub original: Expr,
    pub optimized: Expr,
}

impl CompiledExpression {
    pub fn compile(source: &str) -> Result<Self> {
        let original = crate::parser::parse(source)?;
        let mut optimizer = Optimizer::new();
        let optimized = optimizer.optimize(&original);
        let stats = optimizer.stats();
        tracing::debug!(visited = stats.visited, folded = stats.folded, "optimized");
        Ok(Self {
            source: source.to_string(),
            original,
            optimized,
        })
    }
}

/// Bundles a pre-populated [`Registry`] with an optional bounded LRU cache
/// of compiled expressions, keyed by source text.
pub struct Engine {
    registry: Registry,
    cache: Option<Mutex<LruCache>>,
    sandbox: Option<Arc<dyn GuestSandbox>>,
}

struct LruCache {
    capacity: usize,
    entries: IndexMap<String, CompiledExpression>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    fn get_or_insert(&mut self, source: &str) -> Result<CompiledExpression> {
        if let Some(existing) = self.entries.shift_remove(source) {
            self.entries.insert(source.to_string(), existing.clone());
            return Ok(existing);
        }
        let compiled = CompiledExpression::compile(source)?;
        if self.entries.len() >= self.capacity && self.capacity > 0 {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(source.to_string(), compiled.clone());
        Ok(compiled)
    }
}

impl Engine {
    /// An engine with every required builtin registered and no compile cache.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        crate::builtins::register_all(&registry)?;
        Ok(Self {
            registry,
            cache: None,
            sandbox: None,
        })
    }

    /// Same as [`Engine::new`], but with a bounded LRU cache of compiled
    /// expressions keyed by source text.
    pub fn with_cache_capacity(capacity: usize) -> Result<Self> {
        let mut engine = Self::new()?;
        engine.cache = Some(Mutex::new(LruCache::new(capacity)));
        Ok(engine)
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn GuestSandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers a native builtin under an explicit signature.
    pub fn register_native(
        &self,
        name: impl Into<String>,
        signature: Signature,
        body: crate::registry::NativeFn,
    ) -> Result<()> {
        self.registry.register_overload(FunctionDescriptor::native(name, signature, body))
    }

    /// Registers a guest-script function, parsed by the sandbox's source
    /// parser and dispatched to the sandbox at call time.
    pub fn register_guest(
        &self,
        name: impl Into<String>,
        signature: Signature,
        source: impl Into<String>,
    ) -> Result<()> {
        self.registry
            .register_overload(FunctionDescriptor::guest(name, signature, source))
    }

    /// Parses and constant-folds `source`, consulting the cache if one is
    /// configured.
    pub fn compile(&self, source: &str) -> Result<CompiledExpression> {
        match &self.cache {
            Some(cache) => cache.lock().get_or_insert(source),
            None => CompiledExpression::compile(source),
        }
    }

    fn evaluator(&self) -> Evaluator<'_> {
        match &self.sandbox {
            Some(sandbox) => Evaluator::with_sandbox(&self.registry, sandbox.as_ref()),
            None => Evaluator::new(&self.registry),
        }
    }

    pub fn evaluate(&self, compiled: &CompiledExpression, payload: serde_json::Value) -> Result<Value> {
        let mut ctx = EvalContext::new(payload);
        self.evaluator().evaluate(&compiled.optimized, &mut ctx)
    }

    pub fn evaluate_with_deadline(
        &self,
        compiled: &CompiledExpression,
        payload: serde_json::Value,
        deadline: Deadline,
    ) -> Result<Value> {
        let mut ctx = EvalContext::with_deadline(payload, deadline);
        self.evaluator().evaluate(&compiled.optimized, &mut ctx)
    }

    pub fn evaluate_bool(&self, compiled: &CompiledExpression, payload: serde_json::Value) -> Result<bool> {
        let mut ctx = EvalContext::new(payload);
        self.evaluator().evaluate_bool(&compiled.optimized, &mut ctx)
    }

    pub fn evaluate_with_explanation(
        &self,
        compiled: &CompiledExpression,
        payload: serde_json::Value,
    ) -> (Result<Value>, crate::eval::explain::Explanation) {
        let mut ctx = EvalContext::new(payload);
        self.evaluator().evaluate_with_explanation(&compiled.optimized, &mut ctx)
    }

    pub fn compile_to_sql(&self, compiled: &CompiledExpression, options: &sql::SqlOptions) -> Result<(String, Vec<Value>)> {
        sql::compile(&compiled.optimized, options)
    }

    pub fn compile_to_docquery(
        &self,
        compiled: &CompiledExpression,
        options: &docquery::DocQueryOptions,
    ) -> Result<docquery::FilterValue> {
        docquery::compile(&compiled.optimized, options)
    }

    /// Runs one JSON façade request end to end (spec §6.4): parses `dsl`,
    /// registers any inline guest functions, evaluates against `payload`,
    /// and renders a response. Never panics; every failure becomes
    /// `FacadeResponse::error`.
    pub fn evaluate_request(&self, request: FacadeRequest) -> FacadeResponse {
        for source in &request.functions {
            if let Err(e) = self.register_request_function(source) {
                return FacadeResponse::error(e);
            }
        }
        match self.compile(&request.dsl) {
            Ok(compiled) => match self.evaluate(&compiled, request.payload) {
                Ok(value) => FacadeResponse::ok(value),
                Err(e) => FacadeResponse::error(e),
            },
            Err(e) => FacadeResponse::error(e),
        }
    }

    fn register_request_function(&self, source: &str) -> Result<()> {
        let parsed = crate::sandbox::parse_guest_source(source)?;
        let signature = Signature::new(vec![crate::value::Ty::Any; parsed.params.len()], crate::value::Ty::Any);
        self.register_guest(parsed.name.clone(), signature, source.to_string())
    }
}

/// Request body for [`Engine::evaluate_request`] (spec §6.4).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FacadeRequest {
    pub payload: serde_json::Value,
    pub dsl: String,
    #[serde(default)]
    pub functions: Vec<String>,
}

/// Response body for [`Engine::evaluate_request`] (spec §6.4). `error` is
/// set exclusively of `result`/`type`/`explanation`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FacadeResponse {
    pub result: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub type_tag: Option<String>,
    pub explanation: Option<String>,
    pub error: Option<String>,
}

impl FacadeResponse {
    fn ok(value: Value) -> Self {
        Self {
            type_tag: Some(value.type_name()),
            result: Some(value_to_json(&value)),
            explanation: None,
            error: None,
        }
    }

    fn error(err: Error) -> Self {
        Self {
            result: None,
            type_tag: None,
            explanation: None,
            error: Some(err.to_string()),
        }
    }
}

fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Int(n) => serde_json::json!(n),
        Value::Float(f) => serde_json::json!(f),
        Value::String(s) => serde_json::json!(s),
        Value::Bool(b) => serde_json::json!(b),
        Value::Null => serde_json::Value::Null,
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Any(json) => (**json).clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_and_evaluate_roundtrip() {
        let engine = Engine::new().unwrap();
        let compiled = engine.compile("1 + 2 * 3").unwrap();
        let result = engine.evaluate(&compiled, serde_json::json!({})).unwrap();
        assert!(matches!(result, Value::Int(7)));
    }

    #[test]
    fn cache_returns_same_source_without_recompiling() {
        let engine = Engine::with_cache_capacity(2).unwrap();
        let first = engine.compile("$.a + $.b").unwrap();
        let second = engine.compile("$.a + $.b").unwrap();
        assert_eq!(first.source, second.source);
    }

    #[test]
    fn cache_evicts_least_recently_used_entry() {
        let engine = Engine::with_cache_capacity(1).unwrap();
        engine.compile("1").unwrap();
        engine.compile("2").unwrap();
        let cache = engine.cache.as_ref().unwrap().lock();
        assert_eq!(cache.entries.len(), 1);
        assert!(cache.entries.contains_key("2"));
    }

    #[test]
    fn evaluate_request_reports_errors_without_panicking() {
        let engine = Engine::new().unwrap();
        let request = FacadeRequest {
            payload: serde_json::json!({}),
            dsl: "1 / 0".to_string(),
            functions: vec![],
        };
        let response = engine.evaluate_request(request);
        assert!(response.error.is_some());
        assert!(response.result.is_none());
    }

    #[test]
    fn evaluate_request_reports_type_tag_on_success() {
        let engine = Engine::new().unwrap();
        let request = FacadeRequest {
            payload: serde_json::json!({"x": 5}),
            dsl: "$.x > 0".to_string(),
            functions: vec![],
        };
        let response = engine.evaluate_request(request);
        assert_eq!(response.type_tag.as_deref(), Some("Bool"));
    }
}
