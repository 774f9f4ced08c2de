//! Explanation tree (spec §3.6): one node per evaluated subexpression,
//! built in the same recursive pass as evaluation (not a separate re-walk)
//! so it only reflects subexpressions actually executed.

use crate::error::Error;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Explanation {
    pub source: String,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub reason: Option<String>,
    pub children: Vec<Explanation>,
}

impl Explanation {
    pub fn leaf(source: impl Into<String>, result: &Result<Value, Error>) -> Self {
        Self::with_children(source, result, vec![])
    }

    pub fn with_children(
        source: impl Into<String>,
        result: &Result<Value, Error>,
        children: Vec<Explanation>,
    ) -> Self {
        let (value, error) = match result {
            Ok(v) => (Some(v.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            source: source.into(),
            value,
            error,
            reason: None,
            children,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
