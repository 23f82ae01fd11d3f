//! Function components.
//!
//! A component receives its [`Scope`] and [`Props`] and returns an
//! [`Output`]: a node to render right away, a future to stream out of order,
//! a stream of nodes to append one by one, or an eagerly consumed iterator.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream};
use futures::{FutureExt, StreamExt};
use papaya::HashMap;

use crate::node::{ComponentNode, Node, Props};
use crate::scope::Scope;

/// A function component.
///
/// Implemented for closures through [`component`]; implement it directly for
/// components that carry configuration.
pub trait Component: Send + Sync + 'static {
    /// A stable, human-readable name. Used for `x-component` lookups and logs.
    fn name(&self) -> &str;

    /// Produce this component's output.
    fn render(&self, cx: Scope, props: Props) -> anyhow::Result<Output>;
}

/// What a component produced.
pub enum Output {
    /// Render immediately.
    Node(Node),
    /// Resolve later. Rendered out of order behind a portal unless eager.
    Future(BoxFuture<'static, anyhow::Result<Node>>),
    /// Append every item as its own streamed chunk, in order.
    Stream(BoxStream<'static, anyhow::Result<Node>>),
    /// Render every item immediately, in order.
    Iter(Vec<Node>),
    /// Render nothing.
    Empty,
}

impl Output {
    /// Async output.
    ///
    /// ```ignore
    /// component("user", |cx, props| {
    ///     Ok(Output::future(async move {
    ///         let user = load_user(props.get_str("id")).await?;
    ///         Ok(h("p").child(user.name))
    ///     }))
    /// })
    /// ```
    pub fn future<F, N>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<N>> + Send + 'static,
        N: Into<Node>,
    {
        Output::Future(future.map(|result| result.map(Into::into)).boxed())
    }

    /// Streamed output; each item becomes one chunk.
    pub fn stream<S, N>(stream: S) -> Self
    where
        S: Stream<Item = anyhow::Result<N>> + Send + 'static,
        N: Into<Node>,
    {
        Output::Stream(stream.map(|item| item.map(Into::into)).boxed())
    }

    /// Synchronous iterator output.
    pub fn iter<N: Into<Node>>(items: impl IntoIterator<Item = N>) -> Self {
        Output::Iter(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Output::Future(_) => f.write_str("Future(..)"),
            Output::Stream(_) => f.write_str("Stream(..)"),
            Output::Iter(nodes) => f.debug_tuple("Iter").field(nodes).finish(),
            Output::Empty => f.write_str("Empty"),
        }
    }
}

/// Conversion into [`Output`] for component return values.
pub trait IntoOutput {
    /// Convert.
    fn into_output(self) -> Output;
}

impl IntoOutput for Output {
    fn into_output(self) -> Output {
        self
    }
}

impl<T: Into<Node>> IntoOutput for T {
    fn into_output(self) -> Output {
        match self.into() {
            Node::Empty => Output::Empty,
            node => Output::Node(node),
        }
    }
}

/// A component backed by a closure.
pub struct FnComponent<F> {
    name: String,
    f: F,
}

impl<F, R> Component for FnComponent<F>
where
    F: Fn(Scope, Props) -> anyhow::Result<R> + Send + Sync + 'static,
    R: IntoOutput,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, cx: Scope, props: Props) -> anyhow::Result<Output> {
        (self.f)(cx, props).map(IntoOutput::into_output)
    }
}

/// Define a component from a closure.
///
/// # Example
///
/// ```ignore
/// let counter = component("counter", |cx, _props| {
///     let count = cx.init("count", 0);
///     Ok(h("button").on("click", ClientFn::body("this.count++")).child(count))
/// });
/// ```
pub fn component<F, R>(name: impl Into<String>, f: F) -> ComponentRef
where
    F: Fn(Scope, Props) -> anyhow::Result<R> + Send + Sync + 'static,
    R: IntoOutput,
{
    ComponentRef::new(FnComponent {
        name: name.into(),
        f,
    })
}

/// A shared reference to a component.
#[derive(Clone)]
pub struct ComponentRef(Arc<dyn Component>);

impl ComponentRef {
    /// Wrap a component.
    pub fn new(component: impl Component) -> Self {
        Self(Arc::new(component))
    }

    /// The component's name.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Start an invocation of this component.
    pub fn node(&self) -> ComponentNode {
        ComponentNode::new(self.clone())
    }

    /// Returns true if both refer to the same component instance.
    pub fn ptr_eq(&self, other: &ComponentRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn render(&self, cx: Scope, props: Props) -> anyhow::Result<Output> {
        self.0.render(cx, props)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.name()).finish()
    }
}

/// Process-wide table from generated ids back to components.
///
/// `<component is={..}>` registers its component here so that a later
/// `x-component` fetch can resolve the id. Entries are never removed.
pub struct ComponentRegistry {
    by_id: HashMap<String, ComponentRef, ahash::RandomState>,
    by_addr: HashMap<usize, String, ahash::RandomState>,
    next_id: AtomicU64,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_id: HashMap::with_hasher(ahash::RandomState::new()),
            by_addr: HashMap::with_hasher(ahash::RandomState::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static ComponentRegistry {
        static GLOBAL: OnceLock<ComponentRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ComponentRegistry::new)
    }

    /// Register a component and return its id. Registering the same
    /// component again returns the same id.
    pub fn register(&self, component: &ComponentRef) -> String {
        let by_addr = self.by_addr.pin();
        if let Some(id) = by_addr.get(&component.addr()) {
            return id.clone();
        }
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-{seq}", component.name());
        // Insert into `by_id` first so the id resolves as soon as it is
        // visible through `by_addr`.
        self.by_id.pin().insert(id.clone(), component.clone());
        match by_addr.try_insert(component.addr(), id.clone()) {
            Ok(_) => id,
            Err(occupied) => {
                // Lost a race with another registration of the same component.
                self.by_id.pin().remove(&id);
                occupied.current.clone()
            }
        }
    }

    /// Resolve a registered id.
    pub fn get(&self, id: &str) -> Option<ComponentRef> {
        self.by_id.pin().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::h;

    #[test]
    fn test_fn_component_output() {
        let greet = component("greet", |_cx, props: Props| {
            Ok(h("p").child(props.get_str("name").unwrap_or("world").to_string()))
        });
        assert_eq!(greet.name(), "greet");
        let cx = Scope::new(1, Vec::new(), Default::default(), None, None);
        let output = greet.render(cx, Props::new().with("name", "ada")).unwrap();
        assert!(matches!(output, Output::Node(Node::Element(_))));
    }

    #[test]
    fn test_empty_output() {
        let nothing = component("nothing", |_cx, _props| Ok(()));
        let cx = Scope::new(1, Vec::new(), Default::default(), None, None);
        assert!(matches!(nothing.render(cx, Props::new()).unwrap(), Output::Empty));
    }

    #[test]
    fn test_registry_ids_are_stable() {
        let registry = ComponentRegistry::new();
        let a = component("card", |_cx, _props| Ok(()));
        let b = component("card", |_cx, _props| Ok(()));
        let id_a = registry.register(&a);
        assert_eq!(registry.register(&a), id_a);
        let id_b = registry.register(&b);
        assert_ne!(id_a, id_b);
        assert!(registry.get(&id_a).unwrap().ptr_eq(&a));
        assert!(registry.get("missing").is_none());
    }
}
