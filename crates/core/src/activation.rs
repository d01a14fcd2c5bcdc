//! Activation: the name→value binding environment
//! consulted during evaluation.
//!
//! The lazy-binding idea is grounded on Seq's closure capture
//! environment (`Arc<[Value]>` in `crates/runtime/src/closures.rs`): a set
//! of values made available to evaluation, computed once. Here captures are
//! name-keyed rather than positional, and a capture may additionally be
//! deferred (a thunk) instead of already-materialized. Each activation is
//! used by a single evaluation on a single thread, so resolving a thunk and
//! caching its result directly in the binding map (rather than behind a
//! `Mutex`/`OnceLock`) is sufficient.

use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Value;

/// Function overload resolution lives entirely outside this core; `Overload` is
/// therefore an opaque handle the core stores and returns but never
/// inspects.
pub type Overload = Arc<dyn std::any::Any + Send + Sync>;

/// A thunk yielding a value on first access.
struct LazyBinding(Box<dyn FnOnce() -> Value>);

impl LazyBinding {
    fn run(self) -> Value {
        (self.0)()
    }
}

enum Binding {
    Eager(Value),
    Lazy(LazyBinding),
}

/// Bindings by name; a binding is either already a value or a lazily
/// computed one, resolved and cached at first read. The core
/// only consumes this interface — population is the embedder's job.
#[derive(Default)]
pub struct Activation {
    bindings: HashMap<Arc<str>, Binding>,
    overloads: HashMap<Arc<str>, Vec<Overload>>,
}

impl Activation {
    pub fn new() -> Activation {
        Activation::default()
    }

    pub fn bind(&mut self, name: impl Into<Arc<str>>, value: Value) {
        self.bindings.insert(name.into(), Binding::Eager(value));
    }

    /// Bind a name to a thunk, resolved and cached at first read.
    pub fn bind_lazy(
        &mut self,
        name: impl Into<Arc<str>>,
        thunk: impl FnOnce() -> Value + 'static,
    ) {
        self.bindings
            .insert(name.into(), Binding::Lazy(LazyBinding(Box::new(thunk))));
    }

    /// `&mut self`: resolving a lazy binding mutates the cache in place.
    pub fn find_variable(&mut self, name: &str) -> Option<Value> {
        match self.bindings.remove(name)? {
            Binding::Eager(v) => {
                let result = v.clone();
                self.bindings.insert(Arc::from(name), Binding::Eager(v));
                Some(result)
            }
            Binding::Lazy(lazy) => {
                let value = lazy.run();
                self.bindings
                    .insert(Arc::from(name), Binding::Eager(value.clone()));
                Some(value)
            }
        }
    }

    pub fn register_overload(&mut self, name: impl Into<Arc<str>>, overload: Overload) {
        self.overloads
            .entry(name.into())
            .or_default()
            .push(overload);
    }

    pub fn find_function_overloads(&self, name: &str) -> &[Overload] {
        self.overloads.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eager_binding_round_trips() {
        let mut activation = Activation::new();
        activation.bind("x", Value::Int(42));
        assert_eq!(activation.find_variable("x"), Some(Value::Int(42)));
    }

    #[test]
    fn lazy_binding_resolves_once() {
        use std::cell::Cell;
        let calls = Arc::new(Cell::new(0));
        let calls2 = calls.clone();
        let mut activation = Activation::new();
        activation.bind_lazy("y", move || {
            calls2.set(calls2.get() + 1);
            Value::Int(7)
        });
        assert_eq!(activation.find_variable("y"), Some(Value::Int(7)));
        assert_eq!(activation.find_variable("y"), Some(Value::Int(7)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn missing_variable_is_none() {
        let mut activation = Activation::new();
        assert_eq!(activation.find_variable("missing"), None);
    }

    #[test]
    fn unregistered_function_has_no_overloads() {
        let activation = Activation::new();
        assert!(activation.find_function_overloads("f").is_empty());
    }
}
