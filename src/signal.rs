//! Signals, computations and dependency collection.
//!
//! A [`Signal`] is a snapshot taken at render time: the value a scope field
//! (or a [`Computation`]) had when the server read it, plus enough metadata
//! for the client runtime to subscribe to later changes.
//!
//! Dependency collection is explicit. [`track`] runs a closure with a
//! collector pushed on a thread-local stack; every [`Scope::get`] and
//! [`Signal::get`] inside it reports the `scope:key` pair it read.
//!
//! [`Scope::get`]: crate::Scope::get

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

thread_local! {
    /// Stack of active collectors. Nested `track` calls push their own set;
    /// reads are only reported to the innermost one.
    static COLLECTOR_STACK: RefCell<Vec<BTreeSet<DepKey>>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` while collecting every field read it performs.
///
/// Returns the closure's result along with the set of `scope:key` pairs that
/// were read through [`Scope::get`](crate::Scope::get) or [`Signal::get`].
///
/// # Example
///
/// ```ignore
/// let (total, deps) = track(|| {
///     cx.get("price").as_f64().unwrap_or(0.0) * cx.get("qty").as_f64().unwrap_or(0.0)
/// });
/// assert_eq!(deps.len(), 2);
/// ```
pub fn track<R>(f: impl FnOnce() -> R) -> (R, BTreeSet<DepKey>) {
    COLLECTOR_STACK.with(|stack| stack.borrow_mut().push(BTreeSet::new()));
    let guard = CollectorGuard;
    let result = f();
    drop(guard);
    let deps = COLLECTOR_STACK
        .with(|stack| stack.borrow_mut().pop())
        .unwrap_or_default();
    (result, deps)
}

/// Run `f` with dependency collection suspended.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let saved = COLLECTOR_STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
    let result = f();
    COLLECTOR_STACK.with(|stack| *stack.borrow_mut() = saved);
    result
}

/// Returns true while inside [`track`].
pub fn is_tracking() -> bool {
    COLLECTOR_STACK.with(|stack| !stack.borrow().is_empty())
}

/// Report a read to the innermost collector, if any.
pub(crate) fn record_read(dep: DepKey) {
    COLLECTOR_STACK.with(|stack| {
        if let Some(top) = stack.borrow_mut().last_mut() {
            top.insert(dep);
        }
    });
}

/// Pops the collector if `f` panics so the stack stays balanced.
struct CollectorGuard;

impl Drop for CollectorGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            COLLECTOR_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

/// A `scope:key` dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepKey {
    /// The owning scope id.
    pub scope: u32,
    /// The field name.
    pub key: Arc<str>,
}

impl DepKey {
    /// Create a dependency key.
    pub fn new(scope: u32, key: impl Into<Arc<str>>) -> Self {
        Self {
            scope,
            key: key.into(),
        }
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.key)
    }
}

/// Client-executable JavaScript function source.
///
/// This is the code-generation boundary between server and client: Rust
/// closures compute values while rendering, a `ClientFn` is what the client
/// runs afterwards (event handlers, effects, computation bodies). Inside the
/// function `this` is the owning scope's store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientFn(Arc<str>);

impl ClientFn {
    /// Wrap a complete function expression, e.g. `function(e){ ... }` or
    /// `(e) => ...`. Arrow functions do not bind `this`.
    pub fn new(source: impl AsRef<str>) -> Self {
        Self(Arc::from(source.as_ref().trim()))
    }

    /// Wrap a function body. The resulting function receives `event`.
    ///
    /// ```ignore
    /// let inc = ClientFn::body("this.count++");
    /// assert_eq!(inc.source(), "function(event){this.count++}");
    /// ```
    pub fn body(body: impl AsRef<str>) -> Self {
        Self(Arc::from(format!("function(event){{{}}}", body.as_ref())))
    }

    /// The JavaScript source.
    pub fn source(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A derived value with an explicit dependency set.
#[derive(Debug)]
pub struct Computation {
    /// Id, unique within `scope`.
    pub id: u32,
    /// The scope the computation was created in.
    pub scope: u32,
    /// What the client re-runs when a dependency changes.
    pub body: ClientFn,
    /// Fields read while computing the server-side value.
    pub deps: BTreeSet<DepKey>,
    /// Computations `body` calls through `$computed`. They are registered
    /// with the client before this one.
    pub inputs: Vec<Arc<Computation>>,
}

impl Computation {
    /// The client registry key, `scope:id`.
    pub fn client_key(&self) -> String {
        format!("{}:{}", self.scope, self.id)
    }
}

/// How a signal's value is retrieved.
#[derive(Debug, Clone)]
pub enum SignalKey {
    /// A direct field of the scope.
    Field(Arc<str>),
    /// A derived value.
    Computed(Arc<Computation>),
}

impl PartialEq for SignalKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SignalKey::Field(a), SignalKey::Field(b)) => a == b,
            (SignalKey::Computed(a), SignalKey::Computed(b)) => {
                a.scope == b.scope && a.id == b.id
            }
            _ => false,
        }
    }
}

/// A read snapshot of a scope-bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    scope: u32,
    key: SignalKey,
    value: Box<Value>,
}

impl Signal {
    pub(crate) fn field(scope: u32, key: impl Into<Arc<str>>, value: Value) -> Self {
        Self {
            scope,
            key: SignalKey::Field(key.into()),
            value: Box::new(value),
        }
    }

    pub(crate) fn computed(computation: Arc<Computation>, value: Value) -> Self {
        Self {
            scope: computation.scope,
            key: SignalKey::Computed(computation),
            value: Box::new(value),
        }
    }

    /// The owning scope id.
    pub fn scope(&self) -> u32 {
        self.scope
    }

    /// The field or computation this signal reads.
    pub fn key(&self) -> &SignalKey {
        &self.key
    }

    /// The snapshot, without reporting a read.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The snapshot, reporting this signal's dependencies to the active
    /// collector.
    pub fn get(&self) -> &Value {
        for dep in self.deps() {
            record_read(dep);
        }
        &self.value
    }

    /// Fields this signal ultimately depends on.
    pub fn deps(&self) -> BTreeSet<DepKey> {
        match &self.key {
            SignalKey::Field(key) => BTreeSet::from([DepKey::new(self.scope, key.clone())]),
            SignalKey::Computed(computation) => computation.deps.clone(),
        }
    }

    /// Returns true if this signal is bound to a plain field (and so may be
    /// written back by two-way bindings).
    pub fn is_field(&self) -> bool {
        matches!(self.key, SignalKey::Field(_))
    }

    /// A JavaScript expression evaluating to the live value on the client.
    pub fn client_expr(&self) -> String {
        match &self.key {
            SignalKey::Field(key) => {
                let key = serde_json::Value::String(key.to_string());
                format!("$signals({})[{}]", self.scope, key)
            }
            SignalKey::Computed(computation) => {
                format!("$computed({},{})", computation.scope, computation.id)
            }
        }
    }

    /// Derive a new signal from this one with a client body and a server-side
    /// mapping. `id` is allocated by the caller's scope.
    pub(crate) fn derive(&self, id: u32, scope: u32, body: ClientFn, value: Value) -> Signal {
        let inputs = match &self.key {
            SignalKey::Computed(inner) => vec![inner.clone()],
            SignalKey::Field(_) => Vec::new(),
        };
        let computation = Computation {
            id,
            scope,
            body,
            deps: self.deps(),
            inputs,
        };
        Signal::computed(Arc::new(computation), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_collects_reads() {
        let a = Signal::field(1, "a", Value::from(1));
        let b = Signal::field(2, "b", Value::from(2));
        let (sum, deps) = track(|| {
            a.get().as_f64().unwrap_or(0.0) + b.get().as_f64().unwrap_or(0.0)
        });
        assert_eq!(sum, 3.0);
        let deps: Vec<String> = deps.iter().map(ToString::to_string).collect();
        assert_eq!(deps, vec!["1:a", "2:b"]);
    }

    #[test]
    fn test_nested_track_reports_to_innermost() {
        let a = Signal::field(1, "a", Value::Null);
        let b = Signal::field(1, "b", Value::Null);
        let ((_, inner), outer) = track(|| {
            a.get();
            track(|| {
                b.get();
            })
        });
        assert_eq!(outer.len(), 1);
        assert!(outer.contains(&DepKey::new(1, "a")));
        assert_eq!(inner.len(), 1);
        assert!(inner.contains(&DepKey::new(1, "b")));
    }

    #[test]
    fn test_untrack_hides_reads() {
        let a = Signal::field(3, "a", Value::Null);
        let (_, deps) = track(|| untrack(|| a.get().clone()));
        assert!(deps.is_empty());
        assert!(!is_tracking());
    }

    #[test]
    fn test_computed_signal_reads_report_underlying_fields() {
        let computation = Arc::new(Computation {
            id: 0,
            scope: 1,
            body: ClientFn::body("return this.a * 2"),
            deps: BTreeSet::from([DepKey::new(1, "a")]),
            inputs: Vec::new(),
        });
        let doubled = Signal::computed(computation, Value::from(4));
        let (_, deps) = track(|| doubled.get().clone());
        assert!(deps.contains(&DepKey::new(1, "a")));
        assert_eq!(doubled.client_expr(), "$computed(1,0)");
    }

    #[test]
    fn test_client_fn_body() {
        assert_eq!(
            ClientFn::body("this.count++").source(),
            "function(event){this.count++}"
        );
        assert_eq!(
            Signal::field(2, "count", Value::from(0)).client_expr(),
            r#"$signals(2)["count"]"#
        );
    }
}
