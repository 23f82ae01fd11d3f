//! The node model.
//!
//! A [`Node`] is an immutable description of output: text, elements,
//! fragments, trusted raw HTML and function components. Elements are built
//! with [`h`], components with [`ComponentRef::node`](crate::ComponentRef::node).

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::component::ComponentRef;
use crate::signal::{ClientFn, Signal};
use crate::value::Value;

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Returns true for void elements such as `img` or `input`.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// A renderable tree.
#[derive(Debug, Clone, Default)]
pub enum Node {
    /// Renders nothing.
    #[default]
    Empty,
    /// Escaped text.
    Text(String),
    /// A number, printed without escaping.
    Number(f64),
    /// A live text placeholder.
    Signal(Signal),
    /// Trusted HTML, written byte-for-byte.
    Raw(Value),
    /// Children without a wrapper.
    Fragment(Vec<Node>),
    /// A positional list of nodes.
    List(Vec<Node>),
    /// An HTML element or a built-in control element.
    Element(Arc<Element>),
    /// A function component invocation.
    Component(Arc<ComponentNode>),
}

/// What [`Node::create`] builds.
#[derive(Debug, Clone)]
pub enum Tag {
    /// An element name, including the built-in control elements.
    Element(String),
    /// A fragment marker.
    Fragment,
    /// A raw-HTML marker; the HTML is read from the `html` prop.
    Raw,
    /// A function component.
    Component(ComponentRef),
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::Element(name.to_string())
    }
}

impl From<ComponentRef> for Tag {
    fn from(component: ComponentRef) -> Self {
        Tag::Component(component)
    }
}

impl Node {
    /// Create a node from a tag and props, recording `key` into the props.
    #[track_caller]
    pub fn create(tag: impl Into<Tag>, mut props: Props, key: Option<&str>) -> Node {
        if let Some(key) = key {
            props.key = Some(key.to_string());
        }
        match tag.into() {
            Tag::Element(tag) => Node::Element(Arc::new(Element {
                tag,
                props,
                site: Location::caller(),
            })),
            Tag::Fragment => Node::Fragment(props.children),
            Tag::Raw => Node::Raw(props.attrs.shift_remove("html").unwrap_or_default()),
            Tag::Component(component) => Node::Component(Arc::new(ComponentNode {
                component,
                props,
                catch: None,
            })),
        }
    }

    /// The `slot` this node is addressed to, if any.
    pub fn slot(&self) -> Option<&str> {
        match self {
            Node::Element(el) => el.props.slot(),
            Node::Component(c) => c.props.slot(),
            _ => None,
        }
    }

    /// Returns true for [`Node::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }
}

/// Children without a wrapper element.
pub fn fragment(children: impl IntoIterator<Item = impl Into<Node>>) -> Node {
    Node::Fragment(children.into_iter().map(Into::into).collect())
}

/// Escaped text.
pub fn text(s: impl Into<String>) -> Node {
    Node::Text(s.into())
}

/// Trusted HTML, written to the output without any escaping.
///
/// Callers are responsible for the XSS safety of `html`: the renderer cannot
/// tell trusted markup from user input. Passing a [`Signal`] renders a live
/// placeholder whose content the client replaces as HTML.
pub fn raw(html: impl Into<Value>) -> Node {
    Node::Raw(html.into())
}

/// Element and component props.
#[derive(Debug, Clone, Default)]
pub struct Props {
    pub(crate) attrs: IndexMap<String, Value>,
    pub(crate) children: Vec<Node>,
    pub(crate) key: Option<String>,
}

impl Props {
    /// Empty props.
    pub fn new() -> Self {
        Self::default()
    }

    /// Props from attribute pairs.
    pub fn from_attrs<K, V>(attrs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Set a prop, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Add a child, builder style.
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Set a prop.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Look up a prop.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Look up a string prop.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }

    /// All props in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The children.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// The list key, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The `slot` prop.
    pub fn slot(&self) -> Option<&str> {
        self.get_str("slot")
    }

    /// Props as a JSON object (signals replaced by their snapshot).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// An element: tag name, props and the source location that built it.
#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) tag: String,
    pub(crate) props: Props,
    pub(crate) site: &'static Location<'static>,
}

/// Start building an element.
///
/// The call site is recorded and serves as the implicit cache key of a
/// `static` element.
///
/// # Example
///
/// ```ignore
/// let node: Node = h("ul")
///     .class(vec![Value::from("list"), Value::object([("empty", items.is_empty())])])
///     .children(items.iter().map(|item| h("li").child(item.as_str())))
///     .into();
/// ```
#[track_caller]
pub fn h(tag: impl Into<String>) -> Element {
    Element {
        tag: tag.into(),
        props: Props::default(),
        site: Location::caller(),
    }
}

impl Element {
    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Set the `class` attribute. Accepts strings, arrays and objects.
    pub fn class(self, value: impl Into<Value>) -> Self {
        self.attr("class", value)
    }

    /// Set the `style` attribute. Accepts a string or a style object.
    pub fn style(self, value: impl Into<Value>) -> Self {
        self.attr("style", value)
    }

    /// Attach a client event handler, e.g. `.on("click", ..)`.
    pub fn on(self, event: &str, handler: ClientFn) -> Self {
        self.attr(format!("on{}", event.to_ascii_lowercase()), handler)
    }

    /// Two-way bind the `value` property to a field signal.
    pub fn bind_value(self, signal: Signal) -> Self {
        self.attr("$value", signal)
    }

    /// Two-way bind the `checked` property to a field signal.
    pub fn bind_checked(self, signal: Signal) -> Self {
        self.attr("$checked", signal)
    }

    /// Set the list key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.props.key = Some(key.into());
        self
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.props.children.push(child.into());
        self
    }

    /// Append children.
    pub fn children(mut self, children: impl IntoIterator<Item = impl Into<Node>>) -> Self {
        self.props
            .children
            .extend(children.into_iter().map(Into::into));
        self
    }

    /// The tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The props.
    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Where this element was built.
    pub fn site(&self) -> &'static Location<'static> {
        self.site
    }
}

/// Error fallback for a component: receives the error, returns what to
/// render in the component's place.
pub type CatchFn = Arc<dyn Fn(&anyhow::Error) -> anyhow::Result<Node> + Send + Sync>;

/// A function component invocation.
#[derive(Clone)]
pub struct ComponentNode {
    pub(crate) component: ComponentRef,
    pub(crate) props: Props,
    pub(crate) catch: Option<CatchFn>,
}

impl ComponentNode {
    /// Invoke `component` with empty props.
    pub fn new(component: ComponentRef) -> Self {
        Self {
            component,
            props: Props::default(),
            catch: None,
        }
    }

    /// Set a prop.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Append a child; children are exposed to the component as slots.
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.props.children.push(child.into());
        self
    }

    /// Append children.
    pub fn children(mut self, children: impl IntoIterator<Item = impl Into<Node>>) -> Self {
        self.props
            .children
            .extend(children.into_iter().map(Into::into));
        self
    }

    /// Content shown while an async component is pending.
    pub fn placeholder(self, placeholder: impl Into<Node>) -> Self {
        self.prop("placeholder", Value::Node(Box::new(placeholder.into())))
    }

    /// Await async output inline instead of streaming it out of order.
    pub fn eager(self) -> Self {
        self.prop("rendering", "eager")
    }

    /// Render `f`'s output instead of failing. Errors raised by `f` itself
    /// are swallowed.
    pub fn catch(
        mut self,
        f: impl Fn(&anyhow::Error) -> anyhow::Result<Node> + Send + Sync + 'static,
    ) -> Self {
        self.catch = Some(Arc::new(f));
        self
    }

    /// The component being invoked.
    pub fn component(&self) -> &ComponentRef {
        &self.component
    }

    /// The props.
    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn is_eager(&self) -> bool {
        self.props.get_str("rendering") == Some("eager")
    }
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("component", &self.component)
            .field("props", &self.props)
            .field("catch", &self.catch.is_some())
            .finish()
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(Arc::new(el))
    }
}

impl From<ComponentNode> for Node {
    fn from(c: ComponentNode) -> Self {
        Node::Component(Arc::new(c))
    }
}

impl From<ComponentRef> for Node {
    fn from(component: ComponentRef) -> Self {
        ComponentNode::new(component).into()
    }
}

impl From<()> for Node {
    fn from(_: ()) -> Self {
        Node::Empty
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<&String> for Node {
    fn from(s: &String) -> Self {
        Node::Text(s.clone())
    }
}

macro_rules! impl_node_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Node {
                fn from(n: $ty) -> Self {
                    Node::Number(n as f64)
                }
            }
        )*
    };
}

impl_node_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<Signal> for Node {
    fn from(signal: Signal) -> Self {
        Node::Signal(signal)
    }
}

impl From<&Signal> for Node {
    fn from(signal: &Signal) -> Self {
        Node::Signal(signal.clone())
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(items: Vec<T>) -> Self {
        Node::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(node: Option<T>) -> Self {
        node.map(Into::into).unwrap_or_default()
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null | Value::Bool(_) | Value::Handler(_) => Node::Empty,
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::Text(s),
            Value::Signal(signal) => Node::Signal(signal),
            Value::Node(node) => *node,
            Value::Component(component) => component.into(),
            Value::Array(items) => Node::List(items.into_iter().map(Node::from).collect()),
            other => Node::Text(other.stringify()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_records_key() {
        let node = Node::create("li", Props::new().with("class", "item"), Some("a"));
        let Node::Element(el) = node else {
            panic!("expected element");
        };
        assert_eq!(el.props().key(), Some("a"));
        assert_eq!(el.props().get_str("class"), Some("item"));
    }

    #[test]
    fn test_create_raw_and_fragment() {
        let node = Node::create(Tag::Raw, Props::new().with("html", "<b>x</b>"), None);
        assert!(matches!(node, Node::Raw(Value::String(ref s)) if s == "<b>x</b>"));

        let node = Node::create(Tag::Fragment, Props::new().with_child("a").with_child(1), None);
        assert!(matches!(node, Node::Fragment(ref children) if children.len() == 2));
    }

    #[test]
    fn test_elements_record_distinct_sites() {
        let a = h("div");
        let b = h("div");
        assert_ne!(a.site().line(), b.site().line());
    }

    #[test]
    fn test_slot_lookup() {
        let node: Node = h("p").attr("slot", "footer").into();
        assert_eq!(node.slot(), Some("footer"));
        assert_eq!(Node::from("text").slot(), None);
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("img"));
        assert!(is_void_element("input"));
        assert!(!is_void_element("div"));
    }
}
