// ABOUTME: Registry — the function registry: overload resolution, scoring,
// ABOUTME: and dispatch to native or guest-script callables (spec §4.6, §5)

use crate::deadline::Deadline;
use crate::error::{Error, ErrorKind};
use crate::sandbox::GuestSandbox;
use crate::value::{Ty, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type NativeFn = Arc<dyn Fn(&[Value]) -> crate::error::Result<Value> + Send + Sync>;

/// An ordered parameter list plus a variadic flag and return type. The
/// last parameter's type governs variadic arguments past the declared
/// arity.
#[derive(Clone)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub variadic: bool,
    pub return_type: Ty,
}

impl Signature {
    pub fn new(params: Vec<Ty>, return_type: Ty) -> Self {
        Self {
            params,
            variadic: false,
            return_type,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    fn key(&self) -> (Vec<Ty>, bool) {
        (self.params.clone(), self.variadic)
    }
}

#[derive(Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    Guest { source: String },
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Native(_) => write!(f, "Native(..)"),
            FunctionBody::Guest { source } => write!(f, "Guest({} bytes)", source.len()),
        }
    }
}

#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub signature: Signature,
    pub body: FunctionBody,
}

impl FunctionDescriptor {
    pub fn native(
        name: impl Into<String>,
        signature: Signature,
        callable: NativeFn,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            body: FunctionBody::Native(callable),
        }
    }

    pub fn guest(name: impl Into<String>, signature: Signature, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signature,
            body: FunctionBody::Guest {
                source: source.into(),
            },
        }
    }
}

#[derive(Clone)]
enum Entry {
    Single(Arc<FunctionDescriptor>),
    Overloaded(Vec<Arc<FunctionDescriptor>>),
}

impl Entry {
    fn overloads(&self) -> &[Arc<FunctionDescriptor>] {
        match self {
            Entry::Single(f) => std::slice::from_ref(f),
            Entry::Overloaded(fs) => fs,
        }
    }
}

/// Score of a candidate overload against a concrete argument list. `-1`
/// means incompatible (excluded from consideration).
fn score_overload(sig: &Signature, args: &[Value]) -> i64 {
    let min_arity = if sig.variadic {
        sig.params.len().saturating_sub(1)
    } else {
        sig.params.len()
    };
    if args.len() < min_arity {
        return -1;
    }
    if !sig.variadic && args.len() > sig.params.len() {
        return -1;
    }

    let mut total = 0i64;
    for (i, arg) in args.iter().enumerate() {
        let expected = if i < sig.params.len() {
            sig.params[i]
        } else if sig.variadic {
            *sig.params.last().unwrap_or(&Ty::Any)
        } else {
            return -1;
        };
        let actual = arg.type_tag();
        let points = match expected {
            Ty::Any => 1,
            _ if expected == actual => 10,
            Ty::Numeric if matches!(actual, Ty::Int | Ty::Float) => 5,
            _ if matches!(expected, Ty::Int | Ty::Float) && matches!(actual, Ty::Int | Ty::Float) => 5,
            _ => return -1,
        };
        total += points;
    }
    total
}

/// The shared function registry. Concurrency discipline per spec §5:
/// `register*`/`unregister`/`clear`/`merge` take exclusive access;
/// `get*`/`has`/`list*`/`call` take shared access and never hold the lock
/// across a function invocation (the descriptor is cloned out first).
pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, desc: FunctionDescriptor) -> crate::error::Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&desc.name) {
            tracing::warn!(function = %desc.name, "rejected duplicate registration");
            return Err(Error::new(ErrorKind::AlreadyRegistered(desc.name)));
        }
        tracing::debug!(function = %desc.name, "registered");
        entries.insert(desc.name.clone(), Entry::Single(Arc::new(desc)));
        Ok(())
    }

    pub fn register_overload(&self, desc: FunctionDescriptor) -> crate::error::Result<()> {
        let name = desc.name.clone();
        let new_key = desc.signature.key();
        let mut entries = self.entries.write();
        match entries.remove(&name) {
            None => {
                entries.insert(name, Entry::Single(Arc::new(desc)));
            }
            Some(Entry::Single(existing)) => {
                if existing.signature.key() == new_key {
                    entries.insert(name.clone(), Entry::Single(existing));
                    return Err(Error::new(ErrorKind::AlreadyRegistered(name)));
                }
                entries.insert(name, Entry::Overloaded(vec![existing, Arc::new(desc)]));
            }
            Some(Entry::Overloaded(mut overloads)) => {
                if overloads.iter().any(|o| o.signature.key() == new_key) {
                    entries.insert(name.clone(), Entry::Overloaded(overloads));
                    return Err(Error::new(ErrorKind::AlreadyRegistered(name)));
                }
                overloads.push(Arc::new(desc));
                entries.insert(name, Entry::Overloaded(overloads));
            }
        }
        Ok(())
    }

    pub fn register_builtin(
        &self,
        name: impl Into<String>,
        signature: Signature,
        callable: NativeFn,
    ) -> crate::error::Result<()> {
        self.register_overload(FunctionDescriptor::native(name, signature, callable))
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Merge another registry's entries into this one; later (other's)
    /// overloads win on signature clashes within the same name.
    pub fn merge(&self, other: &Registry) {
        let other_entries = other.entries.read();
        let mut entries = self.entries.write();
        for (name, entry) in other_entries.iter() {
            match entries.get_mut(name) {
                None => {
                    entries.insert(name.clone(), entry.clone());
                }
                Some(existing) => {
                    let mut merged: Vec<Arc<FunctionDescriptor>> = existing.overloads().to_vec();
                    for incoming in entry.overloads() {
                        if let Some(slot) = merged
                            .iter_mut()
                            .find(|m| m.signature.key() == incoming.signature.key())
                        {
                            *slot = incoming.clone();
                        } else {
                            merged.push(incoming.clone());
                        }
                    }
                    *existing = if merged.len() == 1 {
                        Entry::Single(merged.into_iter().next().unwrap())
                    } else {
                        Entry::Overloaded(merged)
                    };
                }
            }
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn list_names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the single function, or the first overload for overloaded
    /// names.
    pub fn get(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.entries
            .read()
            .get(name)
            .map(|e| e.overloads()[0].clone())
    }

    /// Scores every overload against `args` and returns the best match.
    /// Ties resolve to the first overload with the highest score;
    /// incompatible candidates (score -1) are excluded. If every
    /// candidate is incompatible, falls back to the first overload.
    pub fn get_best_match(&self, name: &str, args: &[Value]) -> Option<Arc<FunctionDescriptor>> {
        let entries = self.entries.read();
        let entry = entries.get(name)?;
        let overloads = entry.overloads();
        if overloads.len() == 1 {
            return Some(overloads[0].clone());
        }
        let mut best: Option<(i64, usize)> = None;
        for (i, candidate) in overloads.iter().enumerate() {
            let score = score_overload(&candidate.signature, args);
            if score < 0 {
                continue;
            }
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, i)),
            }
        }
        match best {
            Some((_, i)) => Some(overloads[i].clone()),
            None => Some(overloads[0].clone()),
        }
    }

    /// Resolves the best overload and invokes it. Guest-script functions
    /// are delegated to `sandbox`, which must be supplied when any guest
    /// function may be called.
    pub fn call(
        &self,
        name: &str,
        args: &[Value],
        sandbox: Option<&dyn GuestSandbox>,
        deadline: &Deadline,
    ) -> crate::error::Result<Value> {
        let descriptor = self.get_best_match(name, args).ok_or_else(|| {
            tracing::warn!(function = %name, arity = args.len(), "no matching overload");
            Error::new(ErrorKind::UndefinedFunction(name.to_string()))
        })?;

        match &descriptor.body {
            FunctionBody::Native(callable) => callable(args),
            FunctionBody::Guest { source } => {
                let sandbox = sandbox.ok_or_else(|| {
                    Error::new(ErrorKind::SandboxViolation(format!(
                        "no sandbox configured to run guest function '{}'",
                        name
                    )))
                })?;
                tracing::debug!(function = %name, "dispatching to guest sandbox");
                sandbox.execute(deadline, source, name, args)
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_one() -> NativeFn {
        Arc::new(|_args| Ok(Value::Int(1)))
    }

    #[test]
    fn register_rejects_duplicate_name() {
        let reg = Registry::new();
        reg.register(FunctionDescriptor::native(
            "f",
            Signature::new(vec![], Ty::Int),
            always_one(),
        ))
        .unwrap();
        let err = reg
            .register(FunctionDescriptor::native(
                "f",
                Signature::new(vec![], Ty::Int),
                always_one(),
            ))
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AlreadyRegistered(_)));
    }

    #[test]
    fn register_overload_converts_single_to_overload_set() {
        let reg = Registry::new();
        reg.register_overload(FunctionDescriptor::native(
            "abs",
            Signature::new(vec![Ty::Int], Ty::Int),
            always_one(),
        ))
        .unwrap();
        reg.register_overload(FunctionDescriptor::native(
            "abs",
            Signature::new(vec![Ty::Float], Ty::Float),
            always_one(),
        ))
        .unwrap();
        let best = reg.get_best_match("abs", &[Value::Float(1.5)]).unwrap();
        assert_eq!(best.signature.params, vec![Ty::Float]);
    }

    #[test]
    fn duplicate_signature_overload_is_rejected() {
        let reg = Registry::new();
        reg.register_overload(FunctionDescriptor::native(
            "f",
            Signature::new(vec![Ty::Int], Ty::Int),
            always_one(),
        ))
        .unwrap();
        let err = reg
            .register_overload(FunctionDescriptor::native(
                "f",
                Signature::new(vec![Ty::Int], Ty::Int),
                always_one(),
            ))
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AlreadyRegistered(_)));
    }

    #[test]
    fn scoring_prefers_exact_type_over_numeric_compatible() {
        let sig_exact = Signature::new(vec![Ty::Float], Ty::Float);
        let sig_numeric = Signature::new(vec![Ty::Numeric], Ty::Float);
        assert!(
            score_overload(&sig_exact, &[Value::Float(1.0)])
                > score_overload(&sig_numeric, &[Value::Float(1.0)])
        );
    }

    #[test]
    fn arity_violation_scores_negative() {
        let sig = Signature::new(vec![Ty::Int, Ty::Int], Ty::Int);
        assert_eq!(score_overload(&sig, &[Value::Int(1)]), -1);
    }

    #[test]
    fn variadic_signature_accepts_extra_args_scored_against_last_param() {
        let sig = Signature::new(vec![Ty::String, Ty::Any], Ty::String).variadic();
        let score = score_overload(
            &sig,
            &[
                Value::String("fmt".into()),
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
            ],
        );
        assert!(score >= 0);
    }

    #[test]
    fn call_dispatches_to_native_callable() {
        let reg = Registry::new();
        reg.register(FunctionDescriptor::native(
            "one",
            Signature::new(vec![], Ty::Int),
            always_one(),
        ))
        .unwrap();
        let result = reg.call("one", &[], None, &Deadline::none()).unwrap();
        assert!(matches!(result, Value::Int(1)));
    }

    #[test]
    fn call_on_undefined_function_fails() {
        let reg = Registry::new();
        let err = reg.call("missing", &[], None, &Deadline::none()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UndefinedFunction(_)));
    }

    #[test]
    fn get_best_match_falls_back_to_first_overload_when_all_incompatible() {
        let reg = Registry::new();
        reg.register_overload(FunctionDescriptor::native(
            "f",
            Signature::new(vec![Ty::Int], Ty::Int),
            always_one(),
        ))
        .unwrap();
        reg.register_overload(FunctionDescriptor::native(
            "f",
            Signature::new(vec![Ty::String], Ty::String),
            always_one(),
        ))
        .unwrap();
        let best = reg.get_best_match("f", &[Value::List(vec![])]).unwrap();
        assert_eq!(best.signature.params, vec![Ty::Int]);
    }
}
