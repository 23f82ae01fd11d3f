//! The render engine.
//!
//! [`render_node`] walks a [`Node`] tree and writes HTML into a
//! [`RenderContext`]. Static values are written as plain markup; anything
//! driven by a [`Signal`] is written with its current value *and* a
//! placeholder the client runtime uses to resubscribe, so the page is correct
//! before any script runs.
//!
//! Asynchronous component output is either awaited inline or deferred behind
//! a portal and registered with the suspense scheduler (see
//! [`crate::suspense`]).

mod attr;
mod component;
mod control;

use std::fmt::Write as _;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::context::RenderContext;
use crate::escape::{escape_for_text, escape_html};
use crate::node::{is_void_element, Element, Node};
use crate::scope::Scope;
use crate::signal::{Signal, SignalKey};
use crate::value::{format_number, Value};

pub(crate) use self::component::render_component;

/// Render `node` into `cx`.
pub(crate) fn render_node<'a>(cx: &'a mut RenderContext, node: &'a Node) -> BoxFuture<'a, ()> {
    async move {
        match node {
            Node::Empty => {}
            Node::Text(s) => cx.write(&escape_html(s)),
            Node::Number(n) => cx.write(&format_number(*n)),
            Node::Signal(signal) => render_text_signal(cx, signal, None),
            Node::Raw(Value::Signal(signal)) => render_text_signal(cx, signal, Some("html")),
            Node::Raw(html) => cx.write(&html.stringify()),
            Node::Fragment(children) | Node::List(children) => {
                render_children(cx, children).await;
            }
            Node::Element(el) => match el.tag.as_str() {
                "toggle" => control::toggle(cx, el).await,
                "switch" => control::switch(cx, el).await,
                "component" => control::lazy_component(cx, el).await,
                "router" => control::router(cx, el).await,
                "cache" | "static" => control::cache(cx, el).await,
                "redirect" => control::redirect(cx, el),
                "invalid" => control::invalid(cx, el).await,
                "slot" => control::slot(cx, el).await,
                _ => render_element(cx, el).await,
            },
            Node::Component(node) => render_component(cx, node).await,
        }
    }
    .boxed()
}

/// Render nodes in order.
pub(crate) fn render_children<'a>(
    cx: &'a mut RenderContext,
    children: &'a [Node],
) -> BoxFuture<'a, ()> {
    async move {
        for child in children {
            render_node(cx, child).await;
        }
    }
    .boxed()
}

/// Render `node` with `scope` as the current scope.
pub(crate) fn render_in_scope<'a>(
    cx: &'a mut RenderContext,
    scope: Option<Scope>,
    node: &'a Node,
) -> BoxFuture<'a, ()> {
    async move {
        let previous = std::mem::replace(&mut cx.scope, scope);
        render_node(cx, node).await;
        cx.scope = previous;
    }
    .boxed()
}

/// The opening `<m-signal ..>` tag for `signal`. Records the signal as used.
pub(crate) fn signal_open(
    cx: &RenderContext,
    signal: &Signal,
    mode: Option<&str>,
    extra_attrs: &str,
) -> String {
    cx.shared.use_signal(signal);
    let mut tag = format!("<m-signal scope=\"{}\"", signal.scope());
    match signal.key() {
        SignalKey::Field(key) => {
            let _ = write!(tag, " key=\"{}\"", escape_html(key));
        }
        SignalKey::Computed(computation) => {
            let _ = write!(tag, " computed=\"{}\"", computation.id);
        }
    }
    if let Some(mode) = mode {
        let _ = write!(tag, " mode=\"{}\"", escape_html(mode));
    }
    tag.push_str(extra_attrs);
    tag.push('>');
    tag
}

/// A text (or raw HTML) placeholder carrying the current value.
fn render_text_signal(cx: &mut RenderContext, signal: &Signal, mode: Option<&str>) {
    let open = signal_open(cx, signal, mode, "");
    cx.write(&open);
    let value = signal.value();
    if mode == Some("html") {
        if let Value::String(html) = value {
            cx.write(html);
        }
    } else if value.is_primitive() {
        cx.write(&escape_for_text(value));
    }
    cx.write("</m-signal>");
}

/// An ordinary element. Live attributes are applied through a trailing
/// `<m-group>` so void elements can receive updates too.
fn render_element<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        let mut open = format!("<{}", el.tag);
        let mut before = String::new();
        let mut live = Vec::new();
        for (name, value) in &el.props.attrs {
            let out = attr::render_attr(cx, &el.tag, name, value);
            open.push_str(&out.attr);
            before.push_str(&out.extra);
            if let Some(signal) = out.signal {
                live.push((out.target, signal));
            }
        }
        open.push('>');
        cx.write(&before);
        cx.write(&open);

        if !is_void_element(&el.tag) {
            render_children(cx, &el.props.children).await;
            let _ = write!(cx.out, "</{}>", el.tag);
        }

        if !live.is_empty() {
            cx.write("<m-group>");
            for (target, signal) in &live {
                let open = signal_open(cx, signal, Some(&format!("[{target}]")), "");
                cx.write(&open);
                cx.write("</m-signal>");
            }
            cx.write("</m-group>");
        }
    }
    .boxed()
}
