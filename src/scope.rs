//! Per-component reactive scopes.
//!
//! Every function-component activation gets a [`Scope`] with a fresh integer
//! id. The scope is an explicit store: fields are read with [`Scope::get`]
//! (which reports the read to an active [`track`](crate::track) collector) and
//! written with [`Scope::set`]. Scope `0` is the page-level app scope, seeded
//! from [`RenderOptions::app`](crate::RenderOptionsBuilder::app).
//!
//! Fields of a scope are only sent to the client when the scope is *live*,
//! i.e. when one of its signals, handlers, refs or effects made it into the
//! output.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::context::RequestContext;
use crate::error::RenderError;
use crate::node::Node;
use crate::session::Session;
use crate::signal::{record_read, track, ClientFn, Computation, DepKey, Signal};
use crate::value::Value;

/// A handle to a DOM element registered in a scope's ref table.
///
/// Rendered as `data-ref="scope:name"`; client code resolves it with
/// `$ref("scope:name")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefHandle {
    scope: u32,
    name: Arc<str>,
}

impl RefHandle {
    /// The owning scope id.
    pub fn scope(&self) -> u32 {
        self.scope
    }

    /// The ref name, unique within its scope.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RefHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

/// The reactive identity of one component activation.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct Scope(Arc<ScopeInner>);

struct ScopeInner {
    id: u32,
    slots: Vec<Node>,
    request: Arc<RequestContext>,
    /// `None` for the app scope itself.
    app: Option<Scope>,
    /// The scope of the component that rendered this one.
    parent: Option<Scope>,
    state: Mutex<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    fields: IndexMap<String, Value>,
    effects: Vec<ClientFn>,
    next_computation: u32,
    next_handler: u32,
    next_ref: u32,
    live: bool,
    completed: bool,
}

impl Scope {
    pub(crate) fn new(
        id: u32,
        slots: Vec<Node>,
        request: Arc<RequestContext>,
        app: Option<Scope>,
        parent: Option<Scope>,
    ) -> Self {
        Scope(Arc::new(ScopeInner {
            id,
            slots,
            request,
            app,
            parent,
            state: Mutex::new(ScopeState::default()),
        }))
    }

    /// Create the app scope (id `0`) seeded with `fields`.
    pub(crate) fn app_scope(request: Arc<RequestContext>, fields: IndexMap<String, Value>) -> Self {
        let scope = Scope::new(0, Vec::new(), request, None, None);
        {
            let mut state = scope.0.state.lock();
            state.fields = fields;
            // The app scope has no component body to wait for.
            state.completed = true;
        }
        scope
    }

    /// The scope id.
    pub fn id(&self) -> u32 {
        self.0.id
    }

    /// Read a field, reporting the read to the active collector.
    ///
    /// Missing fields read as [`Value::Null`].
    pub fn get(&self, key: &str) -> Value {
        record_read(DepKey::new(self.0.id, key));
        self.0.state.lock().fields.get(key).cloned().unwrap_or_default()
    }

    /// Take a snapshot of a field as a [`Signal`].
    pub fn signal(&self, key: &str) -> Signal {
        let value = self.0.state.lock().fields.get(key).cloned().unwrap_or_default();
        Signal::field(self.0.id, key, value)
    }

    /// Write a field.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.state.lock().fields.insert(key.into(), value.into());
    }

    /// Set a field unless it already has a value, and return its signal.
    ///
    /// ```ignore
    /// let count = cx.init("count", 0);
    /// h("button").on("click", ClientFn::body("this.count++")).child(count)
    /// ```
    pub fn init(&self, key: &str, value: impl Into<Value>) -> Signal {
        let current = {
            let mut state = self.0.state.lock();
            state
                .fields
                .entry(key.to_string())
                .or_insert_with(|| value.into())
                .clone()
        };
        Signal::field(self.0.id, key, current)
    }

    /// Create a derived signal.
    ///
    /// `compute` runs once, immediately, inside [`track`]; every field it reads
    /// through [`Scope::get`] or [`Signal::get`] becomes a dependency. `body`
    /// is the client-side equivalent, re-run by the client runtime with `this`
    /// bound to this scope's store whenever a dependency changes.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let doubled = cx.computed(ClientFn::body("return this.count * 2"), |cx| {
    ///     cx.get("count").as_f64().unwrap_or(0.0) * 2.0
    /// });
    /// ```
    pub fn computed<V: Into<Value>>(
        &self,
        body: ClientFn,
        compute: impl FnOnce(&Scope) -> V,
    ) -> Signal {
        let (value, deps) = track(|| compute(self).into());
        let computation = Computation {
            id: self.next_computation_id(),
            scope: self.0.id,
            body,
            deps,
            inputs: Vec::new(),
        };
        Signal::computed(Arc::new(computation), value)
    }

    /// Register an effect to run on the client once this scope's markup is
    /// mounted.
    pub fn effect(&self, f: ClientFn) {
        let mut state = self.0.state.lock();
        state.effects.push(f);
        state.live = true;
    }

    /// A named DOM ref in this scope.
    pub fn ref_handle(&self, name: &str) -> RefHandle {
        RefHandle {
            scope: self.0.id,
            name: Arc::from(name),
        }
    }

    /// Children passed to this component.
    pub fn slots(&self) -> &[Node] {
        &self.0.slots
    }

    /// The page-level app scope.
    pub fn app(&self) -> Scope {
        match &self.0.app {
            Some(app) => app.clone(),
            None => self.clone(),
        }
    }

    pub(crate) fn parent(&self) -> Option<Scope> {
        self.0.parent.clone()
    }

    /// The incoming HTTP request.
    pub fn request(&self) -> Result<&http::Request<String>, RenderError> {
        self.0
            .request
            .request
            .as_ref()
            .ok_or(RenderError::missing("request"))
    }

    /// A parameter captured by the matched route, e.g. `id` for `/users/:id`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.0
            .request
            .route
            .as_ref()
            .and_then(|route| route.params.get(name))
            .map(String::as_str)
    }

    /// Form fields submitted with an `x-route-form` request.
    pub fn form(&self) -> Result<&IndexMap<String, String>, RenderError> {
        self.0.request.form.as_ref().ok_or(RenderError::missing("form"))
    }

    /// A value from the render-wide context map.
    pub fn context(&self, key: &str) -> Option<&Value> {
        self.0.request.context.get(key)
    }

    /// The request's session.
    ///
    /// Fails when the render was started without session options.
    pub fn session(&self) -> Result<Session, RenderError> {
        self.0
            .request
            .session
            .clone()
            .ok_or(RenderError::missing("session"))
    }

    pub(crate) fn next_computation_id(&self) -> u32 {
        let mut state = self.0.state.lock();
        let id = state.next_computation;
        state.next_computation += 1;
        id
    }

    /// Allocate a handler id, `scope_seq`.
    pub(crate) fn next_handler_id(&self) -> String {
        let mut state = self.0.state.lock();
        let seq = state.next_handler;
        state.next_handler += 1;
        state.live = true;
        format!("{}_{}", self.0.id, seq)
    }

    /// Allocate an anonymous ref handle.
    pub(crate) fn next_ref(&self) -> RefHandle {
        let seq = {
            let mut state = self.0.state.lock();
            let seq = state.next_ref;
            state.next_ref += 1;
            seq
        };
        self.ref_handle(&format!("_r{seq}"))
    }

    pub(crate) fn mark_live(&self) {
        self.0.state.lock().live = true;
    }

    pub(crate) fn complete(&self) {
        self.0.state.lock().completed = true;
    }

    /// Fields and effects ready for emission: the scope is live and its
    /// component has finished. Effects are drained.
    pub(crate) fn take_emission(&self) -> Option<(Vec<(String, Value)>, Vec<ClientFn>)> {
        let mut state = self.0.state.lock();
        if !(state.live && state.completed) {
            return None;
        }
        let fields = state
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.resolved()))
            .collect();
        let effects = std::mem::take(&mut state.effects);
        Some((fields, effects))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("id", &self.0.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(id: u32) -> Scope {
        Scope::new(id, Vec::new(), Arc::new(RequestContext::default()), None, None)
    }

    #[test]
    fn test_get_set_and_signal_snapshot() {
        let cx = scope(1);
        cx.set("name", "ada");
        let signal = cx.signal("name");
        cx.set("name", "grace");
        assert_eq!(signal.value(), &Value::from("ada"));
        assert_eq!(cx.get("name"), Value::from("grace"));
        assert_eq!(cx.get("missing"), Value::Null);
    }

    #[test]
    fn test_init_keeps_existing_value() {
        let cx = scope(1);
        assert_eq!(cx.init("n", 1).value(), &Value::from(1));
        assert_eq!(cx.init("n", 2).value(), &Value::from(1));
    }

    #[test]
    fn test_computed_captures_dependencies() {
        let cx = scope(4);
        cx.set("price", 3);
        cx.set("qty", 2);
        let total = cx.computed(ClientFn::body("return this.price * this.qty"), |cx| {
            cx.get("price").as_f64().unwrap_or(0.0) * cx.get("qty").as_f64().unwrap_or(0.0)
        });
        assert_eq!(total.value(), &Value::from(6));
        let deps: Vec<String> = total.deps().iter().map(ToString::to_string).collect();
        assert_eq!(deps, vec!["4:price", "4:qty"]);

        let second = cx.computed(ClientFn::body("return 1"), |_| 1);
        assert_eq!(second.client_expr(), "$computed(4,1)");
    }

    #[test]
    fn test_missing_request_context_fails_fast() {
        let cx = scope(1);
        assert!(matches!(
            cx.request(),
            Err(RenderError::MissingContext { what: "request" })
        ));
        assert!(cx.session().is_err());
        assert_eq!(cx.param("id"), None);
    }

    #[test]
    fn test_emission_requires_live_and_completed() {
        let cx = scope(2);
        cx.set("a", 1);
        assert!(cx.take_emission().is_none());
        cx.mark_live();
        assert!(cx.take_emission().is_none());
        cx.complete();
        let (fields, effects) = cx.take_emission().unwrap();
        assert_eq!(fields, vec![("a".to_string(), Value::from(1))]);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_handler_and_ref_ids() {
        let cx = scope(7);
        assert_eq!(cx.next_handler_id(), "7_0");
        assert_eq!(cx.next_handler_id(), "7_1");
        assert_eq!(cx.next_ref().to_string(), "7:_r0");
        assert_eq!(cx.ref_handle("input").to_string(), "7:input");
    }
}
