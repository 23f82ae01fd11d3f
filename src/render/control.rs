//! Built-in control elements.
//!
//! These tag names are intercepted before ordinary element rendering. Each
//! one writes markup that is correct without JavaScript and, where the
//! content can change on the client, a placeholder the runtime takes over.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::BoxFuture;
use futures::FutureExt;

use super::{render_children, render_in_scope, render_node, signal_open};
use crate::cache::RenderCache;
use crate::component::ComponentRegistry;
use crate::context::RenderContext;
use crate::escape::escape_html;
use crate::node::{ComponentNode, Element, Node};
use crate::runtime::Features;
use crate::signal::{ClientFn, Signal};
use crate::value::Value;

/// `<toggle show={..}>` / `<toggle hidden={..}>`.
///
/// A static condition renders the children or nothing. A live condition
/// renders an `m-signal` in toggle mode; hidden children are parked in an
/// inert `<template m-slot>` so the client can reveal them locally.
pub(super) fn toggle<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        let props = &el.props;
        let (signal, shown) = match (props.get("show"), props.get("hidden")) {
            (Some(Value::Signal(show)), _) => (Some(show.clone()), show.value().is_truthy()),
            (Some(show), _) => (None, show.is_truthy()),
            (None, Some(Value::Signal(hidden))) => {
                let shown = !hidden.value().is_truthy();
                (Some(negate(cx, hidden, shown)), shown)
            }
            (None, Some(hidden)) => (None, !hidden.is_truthy()),
            (None, None) => (None, true),
        };

        let Some(signal) = signal else {
            if shown {
                render_children(cx, &props.children).await;
            }
            return;
        };

        let extra = if props.get("viewTransition").is_some_and(Value::is_truthy) {
            " data-vt"
        } else {
            ""
        };
        let open = signal_open(cx, &signal, Some("toggle"), extra);
        cx.write(&open);
        if shown {
            render_children(cx, &props.children).await;
        } else {
            cx.write("<template m-slot>");
            render_children(cx, &props.children).await;
            cx.write("</template>");
        }
        cx.write("</m-signal>");
    }
    .boxed()
}

/// `!signal` as a computation owned by the current scope.
fn negate(cx: &RenderContext, signal: &Signal, value: bool) -> Signal {
    let scope = cx.scope_or_app();
    let body = ClientFn::new(format!("function(){{return !({})}}", signal.client_expr()));
    signal.derive(scope.next_computation_id(), scope.id(), body, Value::Bool(value))
}

/// `<switch value={..}>`: shows the children whose `slot` equals the value,
/// or the unslotted children when none does.
pub(super) fn switch<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        let props = &el.props;
        let (signal, current) = match props.get("value") {
            Some(Value::Signal(signal)) => (Some(signal.clone()), signal.value().stringify()),
            Some(value) => (None, value.stringify()),
            None => (None, String::new()),
        };

        let children: Vec<&Node> = props.children.iter().filter(|n| !n.is_empty()).collect();
        let matched = children.iter().any(|n| n.slot() == Some(current.as_str()));
        let (shown, hidden): (Vec<&Node>, Vec<&Node>) =
            children.into_iter().partition(|n| match n.slot() {
                Some(slot) => matched && slot == current,
                None => !matched,
            });

        // The client re-switches on `slot` attributes, so keep them.
        let strip_slot = std::mem::replace(&mut cx.strip_slot, false);
        match signal {
            None => {
                for node in shown {
                    render_node(cx, node).await;
                }
            }
            Some(signal) => {
                let open = signal_open(cx, &signal, Some("switch"), "");
                cx.write(&open);
                for node in shown {
                    render_node(cx, node).await;
                }
                if !hidden.is_empty() {
                    cx.write("<template m-slot>");
                    for node in hidden {
                        render_node(cx, node).await;
                    }
                    cx.write("</template>");
                }
                cx.write("</m-signal>");
            }
        }
        cx.strip_slot = strip_slot;
    }
    .boxed()
}

/// `<component is={..}>` / `<component name="..">`: a placeholder the client
/// fills by fetching the component with `x-component`.
pub(super) fn lazy_component<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        let props = &el.props;
        let id = match props.get("is") {
            Some(Value::Component(component)) => Some(ComponentRegistry::global().register(component)),
            _ => props.get_str("name").map(str::to_string),
        };
        let Some(id) = id else {
            tracing::warn!("<component> without `is` or `name`; rendering children");
            render_children(cx, &props.children).await;
            return;
        };

        let forwarded = serde_json::Value::Object(
            props
                .attrs
                .iter()
                .filter(|(name, _)| !matches!(name.as_str(), "is" | "name" | "placeholder"))
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        );
        cx.shared.require(Features::COMPONENT);
        cx.write(&format!(
            "<m-component name=\"{}\" props=\"{}\">",
            escape_html(&id),
            STANDARD.encode(forwarded.to_string())
        ));
        match props.get("placeholder") {
            Some(placeholder) => {
                let placeholder = Node::from(placeholder.clone());
                render_node(cx, &placeholder).await;
            }
            None => render_children(cx, &props.children).await,
        }
        cx.write("</m-component>");
    }
    .boxed()
}

/// `<router>`: the matched route's component, with the children kept as a
/// fallback template. Without a match the children render and the response
/// status becomes 404.
pub(super) fn router<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        cx.shared.require(Features::ROUTER);
        cx.write("<m-router>");

        let fallback = match cx.shared.request.route.clone() {
            Some(route) => {
                let mut page = ComponentNode::new(route.component);
                for (name, value) in route.params {
                    page = page.prop(name, value);
                }
                render_node(cx, &Node::from(page)).await;

                // The not-found markup is only a template here; its side
                // effects go to a throwaway ledger.
                let mut fallback = RenderContext::new(cx.shared.detached(), None);
                fallback.eager = true;
                render_children(&mut fallback, &el.props.children).await;
                fallback
            }
            None => {
                cx.shared.set_status(http::StatusCode::NOT_FOUND);
                let mut fallback = cx.fork(cx.scope.clone());
                fallback.eager = true;
                render_children(&mut fallback, &el.props.children).await;
                cx.write(&fallback.out);
                fallback
            }
        };
        if !fallback.out.is_empty() {
            cx.write("<template m-fallback>");
            cx.write(&fallback.out);
            cx.write("</template>");
        }
        cx.write("</m-router>");
    }
    .boxed()
}

/// `<cache key="..">` / `<static>`: memoized subtree HTML.
///
/// `static` is keyed by the call site that built it. Cached subtrees render
/// eagerly so the stored HTML never contains portals.
pub(super) fn cache<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        let props = &el.props;
        let key = if el.tag == "static" {
            format!(
                "static:{}:{}:{}",
                el.site.file(),
                el.site.line(),
                el.site.column()
            )
        } else {
            match props.key().or_else(|| props.get_str("key")) {
                Some(key) => format!("cache:{key}"),
                None => {
                    render_children(cx, &props.children).await;
                    return;
                }
            }
        };

        let cache = RenderCache::global();
        if let Some(html) = cache.get(&key) {
            cx.shared.tracer.on_cache_check(&key, true);
            cx.write(&html);
            return;
        }
        cx.shared.tracer.on_cache_check(&key, false);

        let mut sub = cx.fork(cx.scope.clone());
        sub.eager = true;
        render_children(&mut sub, &props.children).await;
        let ttl = props
            .get("expires")
            .and_then(Value::as_f64)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64);
        cache.insert(key, sub.out.as_str(), ttl);
        cx.write(&sub.out);
    }
    .boxed()
}

/// `<redirect to="..">`: no markup, only a navigation statement in the next
/// script payload.
pub(super) fn redirect(cx: &mut RenderContext, el: &Element) {
    match el.props.get_str("to") {
        Some(to) => cx.shared.redirect(to),
        None => tracing::warn!("<redirect> without `to`"),
    }
}

/// `<invalid for="field">`: a validation message revealed when a form
/// handler reports `field` as invalid.
pub(super) fn invalid<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        cx.shared.require(Features::FORM);
        let field = el.props.get_str("for").unwrap_or_default();
        cx.write(&format!("<m-invalid for=\"{}\" hidden>", escape_html(field)));
        render_children(cx, &el.props.children).await;
        cx.write("</m-invalid>");
    }
    .boxed()
}

/// `<slot name="..">`: the enclosing component's children addressed to this
/// slot, rendered in the scope that created them. Falls back to the slot's
/// own children.
pub(super) fn slot<'a>(cx: &'a mut RenderContext, el: &'a Element) -> BoxFuture<'a, ()> {
    async move {
        let name = el.props.get_str("name");
        let matched: Vec<Node> = match &cx.scope {
            Some(scope) => scope
                .slots()
                .iter()
                .filter(|n| !n.is_empty() && n.slot() == name)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        if matched.is_empty() {
            render_children(cx, &el.props.children).await;
            return;
        }

        let parent = cx.scope.as_ref().and_then(|scope| scope.parent());
        let strip_slot = std::mem::replace(&mut cx.strip_slot, true);
        render_in_scope(cx, parent, &Node::Fragment(matched)).await;
        cx.strip_slot = strip_slot;
    }
    .boxed()
}
