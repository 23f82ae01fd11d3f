//! Attribute rendering.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::context::RenderContext;
use crate::escape::{escape_html, escape_script, escape_style};
use crate::runtime::Features;
use crate::scope::Scope;
use crate::signal::{ClientFn, Computation, DepKey, Signal, SignalKey};
use crate::style::{hash_css, merge_class_names, style_to_css};
use crate::value::Value;

/// The rendered form of one attribute.
#[derive(Debug, Default)]
pub(crate) struct AttrOutput {
    /// Attribute text including its leading space, or empty.
    pub attr: String,
    /// Markup that must precede the element (scoped `<style>` blocks).
    pub extra: String,
    /// The signal driving this attribute, if it is live.
    pub signal: Option<Signal>,
    /// The attribute or property the client patches when `signal` changes.
    pub target: String,
}

/// Render one attribute of an element.
pub(crate) fn render_attr(
    cx: &mut RenderContext,
    tag: &str,
    name: &str,
    value: &Value,
) -> AttrOutput {
    let mut out = AttrOutput {
        target: name.to_string(),
        ..AttrOutput::default()
    };

    let special = matches!(name, "props" | "ref" | "action") || is_event(name, value);
    let value: Cow<'_, Value> = match value {
        Value::Signal(signal) => {
            if !special {
                out.signal = Some(signal.clone());
            }
            Cow::Owned(signal.value().clone())
        }
        v if v.is_object_shaped() && v.contains_signal() => {
            match &cx.scope {
                Some(scope) if !special => out.signal = Some(lift_signals(scope, v)),
                _ => {}
            }
            Cow::Owned(v.resolved())
        }
        v => Cow::Borrowed(v),
    };

    match name {
        "class" => {
            let classes = merge_class_names(&value);
            if !classes.is_empty() {
                out.attr = format!(" class=\"{}\"", escape_html(&classes));
            }
            if out.signal.is_some() {
                cx.shared.require(Features::STYLE);
            }
        }
        "style" => {
            render_style(cx, &value, &mut out);
            if out.signal.is_some() {
                cx.shared.require(Features::STYLE);
            }
        }
        "props" => {
            let json = value.to_json().to_string();
            out.attr = format!(" props=\"{}\"", STANDARD.encode(json));
        }
        "ref" => render_ref(cx, &value, &mut out),
        "action" if tag == "form" => match &*value {
            Value::Handler(f) => {
                let scope = cx.scope_or_app();
                let id = scope.next_handler_id();
                cx.shared.register_handler(id.clone(), f.clone());
                cx.shared.require(Features::FORM);
                out.attr = format!(
                    " onsubmit=\"$onsubmit(event,'{}',{})\"",
                    id,
                    scope.id()
                );
            }
            other => out.attr = default_attr(name, other),
        },
        "slot" if cx.strip_slot => {}
        "$value" | "$checked" => render_binding(cx, &name[1..], &value, &mut out),
        "viewTransition" => {
            out.attr = match &*value {
                Value::String(vt) => format!(
                    " data-vt style=\"view-transition-name:{}\"",
                    escape_style(vt)
                ),
                v if v.is_truthy() => " data-vt".to_string(),
                _ => String::new(),
            };
            out.signal = None;
        }
        _ if is_event(name, &value) => {
            if let Value::Handler(f) = &*value {
                let scope = cx.scope_or_app();
                let id = scope.next_handler_id();
                cx.shared.register_handler(id.clone(), f.clone());
                out.attr = format!(
                    " {}=\"$emit(event,'{}',{})\"",
                    name.to_ascii_lowercase(),
                    id,
                    scope.id()
                );
            }
        }
        _ => out.attr = default_attr(name, &value),
    }
    out
}

/// `on<event>` bound to a client handler. Other `on*` attributes (`one`,
/// `online="x"`) are ordinary.
fn is_event(name: &str, value: &Value) -> bool {
    let mut chars = name.chars();
    matches!(value, Value::Handler(_))
        && chars.next().is_some_and(|c| c.eq_ignore_ascii_case(&'o'))
        && chars.next().is_some_and(|c| c.eq_ignore_ascii_case(&'n'))
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// `true` renders a bare attribute; `false`, null and non-data values are
/// omitted; anything else is stringified and escaped.
fn default_attr(name: &str, value: &Value) -> String {
    match value {
        Value::Bool(true) => format!(" {name}"),
        Value::Null
        | Value::Bool(false)
        | Value::Handler(_)
        | Value::Node(_)
        | Value::Component(_) => String::new(),
        other => format!(" {}=\"{}\"", name, escape_html(&other.stringify())),
    }
}

fn render_style(cx: &mut RenderContext, value: &Value, out: &mut AttrOutput) {
    if let Value::String(style) = value {
        if !style.is_empty() {
            out.attr = format!(" style=\"{}\"", escape_style(style));
        }
        return;
    }
    let css = style_to_css(value);
    if css.rules.is_empty() {
        if !css.inline.is_empty() {
            out.attr = format!(" style=\"{}\"", escape_style(&css.inline));
        }
        return;
    }
    let hash = hash_css(&css.stylesheet("&"));
    if cx.shared.first_css(&hash) {
        let sheet = css.stylesheet(&format!("[data-css-{hash}]"));
        out.extra = format!(
            "<style data-css=\"{}\">{}</style>",
            hash,
            escape_script(&sheet)
        );
    }
    out.attr = format!(" data-css-{hash}");
}

fn render_ref(cx: &mut RenderContext, value: &Value, out: &mut AttrOutput) {
    let handle = match value {
        Value::Ref(handle) => handle.clone(),
        Value::Handler(callback) => {
            let scope = cx.scope_or_app();
            let handle = scope.next_ref();
            let target = serde_json::Value::from(handle.to_string());
            scope.effect(ClientFn::new(format!(
                "function(){{({callback}).call(this,$ref({target}))}}"
            )));
            handle
        }
        other => {
            out.attr = default_attr("ref", other);
            return;
        }
    };
    cx.shared.require(Features::SIGNALS);
    out.attr = format!(" data-ref=\"{}\"", escape_html(&handle.to_string()));
}

/// `$value` / `$checked`: the current value as the native attribute plus a
/// write-back handler when bound to a plain field.
fn render_binding(cx: &mut RenderContext, prop: &str, value: &Value, out: &mut AttrOutput) {
    out.target = prop.to_string();
    out.attr = if prop == "checked" {
        if value.is_truthy() {
            " checked".to_string()
        } else {
            String::new()
        }
    } else {
        default_attr("value", value)
    };
    let Some(signal) = &out.signal else {
        return;
    };
    cx.shared.require(Features::SIGNALS);
    if signal.is_field() {
        let (event, source) = if prop == "checked" {
            ("onchange", "this.checked")
        } else {
            ("oninput", "this.value")
        };
        let js = format!("{}={}", signal.client_expr(), source);
        out.attr
            .push_str(&format!(" {}=\"{}\"", event, escape_html(&js)));
    }
}

/// Turn an array/object holding signals into one computation that rebuilds
/// the whole value on the client: a static skeleton plus `(path, signal)`
/// patches.
fn lift_signals(scope: &Scope, value: &Value) -> Signal {
    let mut patches = Vec::new();
    collect_patches(value, &mut Vec::new(), &mut patches);

    let mut deps = BTreeSet::<DepKey>::new();
    let mut inputs = Vec::new();
    let mut patch_js = Vec::with_capacity(patches.len());
    for (path, signal) in &patches {
        deps.extend(signal.deps());
        if let SignalKey::Computed(inner) = signal.key() {
            inputs.push(inner.clone());
        }
        patch_js.push(format!(
            "[{},function(){{return {}}}]",
            serde_json::Value::Array(path.clone()),
            signal.client_expr()
        ));
    }
    let body = format!(
        "function(){{return $patch({},[{}])}}",
        value.to_json(),
        patch_js.join(",")
    );
    let computation = Computation {
        id: scope.next_computation_id(),
        scope: scope.id(),
        body: ClientFn::new(body),
        deps,
        inputs,
    };
    Signal::computed(Arc::new(computation), value.resolved())
}

fn collect_patches(
    value: &Value,
    path: &mut Vec<serde_json::Value>,
    patches: &mut Vec<(Vec<serde_json::Value>, Signal)>,
) {
    match value {
        Value::Signal(signal) => patches.push((path.clone(), signal.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(serde_json::Value::from(i));
                collect_patches(item, path, patches);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                path.push(serde_json::Value::from(key.as_str()));
                collect_patches(item, path, patches);
                path.pop();
            }
        }
        _ => {}
    }
}
