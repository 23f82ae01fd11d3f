//! Request-scoped render state.
//!
//! [`RenderContext`] is what the tree walk threads through: an output buffer,
//! the current scope and a handle to the request-wide [`Shared`] ledger. Each
//! deferred chunk renders with its own `RenderContext` over the same ledger.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::node::Node;
use crate::router::RouteMatch;
use crate::runtime::Features;
use crate::scope::Scope;
use crate::session::Session;
use crate::signal::{ClientFn, Computation, Signal, SignalKey};
use crate::tracer::Tracer;
use crate::value::Value;
use crate::wire::{Flags, Script};

/// Request-bound data reachable from every scope.
#[derive(Default)]
pub(crate) struct RequestContext {
    pub request: Option<http::Request<String>>,
    pub route: Option<RouteMatch>,
    pub form: Option<IndexMap<String, String>>,
    pub context: IndexMap<String, Value>,
    pub session: Option<Session>,
}

/// A deferred chunk: its id and the future producing its markup.
pub(crate) struct Pending {
    pub chunk_id: u32,
    pub future: BoxFuture<'static, String>,
}

/// Everything one render shares across its chunks.
pub(crate) struct Shared {
    state: Mutex<State>,
    pub tracer: Arc<dyn Tracer>,
    pub request: Arc<RequestContext>,
    pub app: Scope,
}

#[derive(Default)]
struct State {
    next_scope: u32,
    next_chunk: u32,
    /// Features required so far.
    features: Features,
    /// Features already sent to the client.
    sent_features: Features,
    pending: Vec<Pending>,
    scopes: IndexMap<u32, Scope>,
    computations: Vec<Arc<Computation>>,
    handlers: Vec<(String, ClientFn)>,
    redirect: Option<String>,
    seen_computations: HashSet<(u32, u32)>,
    seen_signals: HashSet<String>,
    seen_css: HashSet<String>,
    status: Option<http::StatusCode>,
    finalize_passes: u32,
}

impl State {
    /// Queue `computation` for the client, after the computations it calls.
    fn register_computation(&mut self, computation: &Arc<Computation>) {
        if !self
            .seen_computations
            .insert((computation.scope, computation.id))
        {
            return;
        }
        for input in &computation.inputs {
            self.register_computation(input);
        }
        self.computations.push(computation.clone());
    }
}

impl Shared {
    pub fn new(
        request: Arc<RequestContext>,
        app_fields: IndexMap<String, Value>,
        flags: Flags,
        tracer: Arc<dyn Tracer>,
    ) -> Arc<Self> {
        let app = Scope::app_scope(request.clone(), app_fields);
        let mut scopes = IndexMap::new();
        scopes.insert(0, app.clone());
        let state = State {
            next_scope: flags.scope,
            next_chunk: flags.chunk,
            sent_features: flags.features,
            scopes,
            ..State::default()
        };
        Arc::new(Shared {
            state: Mutex::new(state),
            tracer,
            request,
            app,
        })
    }

    /// A ledger for markup that is rendered but never activated, sharing the
    /// request and id counters of this one. Nothing recorded there reaches
    /// the response.
    pub fn detached(&self) -> Arc<Shared> {
        Shared::new(
            self.request.clone(),
            IndexMap::new(),
            self.flags(),
            self.tracer.clone(),
        )
    }

    /// Allocate a scope for a component activation.
    pub fn new_scope(&self, slots: Vec<Node>, parent: Option<Scope>) -> Scope {
        let mut state = self.state.lock();
        state.next_scope += 1;
        let id = state.next_scope;
        let scope = Scope::new(
            id,
            slots,
            self.request.clone(),
            Some(self.app.clone()),
            parent,
        );
        state.scopes.insert(id, scope.clone());
        scope
    }

    pub fn next_chunk(&self) -> u32 {
        let mut state = self.state.lock();
        state.next_chunk += 1;
        state.next_chunk
    }

    pub fn require(&self, features: Features) {
        self.state.lock().features |= features;
    }

    pub fn push_pending(&self, pending: Pending) {
        self.state.lock().pending.push(pending);
    }

    pub fn take_pending(&self) -> Vec<Pending> {
        std::mem::take(&mut self.state.lock().pending)
    }

    /// Record that `signal` reached the output: its scope (and the scopes of
    /// its dependencies) become live and a computation is registered once.
    pub fn use_signal(&self, signal: &Signal) {
        let mut state = self.state.lock();
        state.features |= Features::SIGNALS;
        if let SignalKey::Computed(computation) = signal.key() {
            state.register_computation(computation);
        }
        let mut live = vec![signal.scope()];
        live.extend(signal.deps().iter().map(|dep| dep.scope));
        for id in live {
            if let Some(scope) = state.scopes.get(&id) {
                scope.mark_live();
            }
        }
    }

    pub fn register_handler(&self, id: String, f: ClientFn) {
        let mut state = self.state.lock();
        state.features |= Features::EVENT;
        state.handlers.push((id, f));
    }

    /// Ask the client to navigate to `to` once the next payload runs. The
    /// last request wins.
    pub fn redirect(&self, to: &str) {
        self.state.lock().redirect = Some(to.to_string());
    }

    /// Returns true the first time a stylesheet hash is seen.
    pub fn first_css(&self, hash: &str) -> bool {
        self.state.lock().seen_css.insert(hash.to_string())
    }

    pub fn set_status(&self, status: http::StatusCode) {
        self.state.lock().status = Some(status);
    }

    pub fn status(&self) -> Option<http::StatusCode> {
        self.state.lock().status
    }

    pub fn flags(&self) -> Flags {
        let state = self.state.lock();
        Flags {
            scope: state.next_scope,
            chunk: state.next_chunk,
            features: state.sent_features | state.features.with_dependencies(),
        }
    }

    pub fn next_finalize_pass(&self) -> u32 {
        let mut state = self.state.lock();
        state.finalize_passes += 1;
        state.finalize_passes
    }

    /// Collect everything introduced since the previous flush: runtime
    /// modules, field values of live scopes, computations, handlers, effects
    /// and a pending redirect. With `last`, the `$FLAGS` line is appended.
    pub fn take_script(&self, last: bool) -> Script {
        let mut state = self.state.lock();
        let mut script = Script::new();

        let needed = state.features.with_dependencies();
        let new_features = needed - state.sent_features;
        state.sent_features |= new_features;
        script.raw(&new_features.script());

        let mut fields = Vec::new();
        let mut effects = Vec::new();
        let scopes: Vec<Scope> = state.scopes.values().cloned().collect();
        for scope in scopes {
            let Some((values, scope_effects)) = scope.take_emission() else {
                continue;
            };
            for (key, value) in values {
                let id = format!("{}:{}", scope.id(), key);
                if state.seen_signals.insert(id.clone()) {
                    fields.push((id, value));
                }
            }
            effects.extend(scope_effects.into_iter().map(|f| (scope.id(), f)));
        }
        script.signals(&fields);

        for computation in std::mem::take(&mut state.computations) {
            script.computation(&computation);
        }
        for (id, f) in std::mem::take(&mut state.handlers) {
            script.handler(&id, &f);
        }
        for (scope, f) in &effects {
            script.effect(*scope, f);
        }
        if let Some(to) = state.redirect.take() {
            script.redirect(&to);
        }
        if last {
            let flags = Flags {
                scope: state.next_scope,
                chunk: state.next_chunk,
                features: state.sent_features,
            };
            script.flags(&flags);
        }
        script
    }
}

/// The state threaded through one tree walk.
pub(crate) struct RenderContext {
    pub out: String,
    pub shared: Arc<Shared>,
    pub scope: Option<Scope>,
    /// Await async components inline (eager rendering, cached subtrees).
    pub eager: bool,
    /// Drop `slot` attributes while re-rendering slotted content.
    pub strip_slot: bool,
}

impl RenderContext {
    pub fn new(shared: Arc<Shared>, scope: Option<Scope>) -> Self {
        Self {
            out: String::new(),
            shared,
            scope,
            eager: false,
            strip_slot: false,
        }
    }

    /// A fresh buffer over the same ledger.
    pub fn fork(&self, scope: Option<Scope>) -> Self {
        Self {
            out: String::new(),
            shared: self.shared.clone(),
            scope,
            eager: self.eager,
            strip_slot: false,
        }
    }

    pub fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// The current component scope, falling back to the app scope.
    pub fn scope_or_app(&self) -> Scope {
        self.scope
            .clone()
            .unwrap_or_else(|| self.shared.app.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::NoopTracer;

    fn shared(flags: Flags) -> Arc<Shared> {
        Shared::new(
            Arc::new(RequestContext::default()),
            IndexMap::new(),
            flags,
            Arc::new(NoopTracer),
        )
    }

    #[test]
    fn test_ids_continue_from_flags() {
        let shared = shared(Flags {
            scope: 5,
            chunk: 2,
            features: Features::SIGNALS,
        });
        assert_eq!(shared.new_scope(Vec::new(), None).id(), 6);
        assert_eq!(shared.next_chunk(), 3);
        shared.require(Features::SIGNALS);
        let js = shared.take_script(true).into_js();
        assert!(!js.contains("m-signal"), "already-loaded module was resent");
        assert!(js.contains("$FLAGS=\"6|3|1\""));
    }

    #[test]
    fn test_derived_computation_registers_its_input_first() {
        let shared = shared(Flags::default());
        let scope = shared.new_scope(Vec::new(), None);
        scope.set("n", 2);
        let doubled = scope.computed(ClientFn::body("return this.n * 2"), |cx| {
            cx.get("n").as_f64().unwrap_or(0.0) * 2.0
        });
        let negated = doubled.derive(
            scope.next_computation_id(),
            scope.id(),
            ClientFn::new("function(){return !($computed(1,0))}"),
            Value::Bool(false),
        );
        shared.use_signal(&negated);
        shared.use_signal(&doubled);

        let js = shared.take_script(false).into_js();
        let inner = js.find("$MC(1,0,").expect("inner computation registered");
        let outer = js.find("$MC(1,1,").expect("outer computation registered");
        assert!(inner < outer);
        assert_eq!(js.matches("$MC(1,0,").count(), 1);
    }

    #[test]
    fn test_fields_emitted_once_for_live_completed_scopes() {
        let shared = shared(Flags::default());
        let scope = shared.new_scope(Vec::new(), None);
        let idle = shared.new_scope(Vec::new(), None);
        scope.set("count", 1);
        idle.set("unused", 2);
        shared.use_signal(&scope.signal("count"));
        idle.complete();

        assert!(!shared.take_script(false).into_js().contains("$MS({"));
        scope.complete();
        let js = shared.take_script(false).into_js();
        assert!(js.contains(r#"$MS({"1:count":1});"#));
        assert!(!js.contains("unused"));
        assert!(!shared.take_script(false).into_js().contains("$MS({"));
    }
}
