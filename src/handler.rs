//! The HTTP-facing entry point.
//!
//! [`render`] turns a root node and [`RenderOptions`] into an
//! `http::Response`. Request headers select the code path:
//!
//! * `x-component: <name>` (with `x-props`, base64 JSON): render one
//!   component and answer `[html, js]` as JSON.
//! * `x-route` / `x-route-form`: render the component matched for the request
//!   path, form body included, and answer `[html, js]` (404 when unmatched).
//! * anything else: stream the full page as `text/html`.
//!
//! Sub-fetches send `x-flags` so scope and chunk ids continue where the page
//! left off and runtime modules the client already has are not resent.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::stream::BoxStream;
use futures::StreamExt;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{Response, StatusCode};
use indexmap::IndexMap;

use crate::component::ComponentRegistry;
use crate::context::Shared;
use crate::error::RenderError;
use crate::node::{ComponentNode, Node, Props};
use crate::options::RenderOptions;
use crate::suspense::{document_stream, prepare, render_document, render_fragment};
use crate::value::Value;
use crate::wire::Flags;

/// A response body.
pub enum Body {
    /// A complete body (JSON sub-fetch answers).
    Full(String),
    /// A streamed page.
    Stream(BoxStream<'static, String>),
}

impl Body {
    /// Wait for the whole body.
    pub async fn collect(self) -> String {
        match self {
            Body::Full(body) => body,
            Body::Stream(stream) => stream.collect::<Vec<_>>().await.concat(),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(body) => f.debug_tuple("Full").field(body).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Render `node` as an HTTP response.
///
/// # Example
///
/// ```ignore
/// let options = RenderOptions::builder()
///     .request(request)
///     .routes(routes)
///     .session(SessionOptions::new(secret))
///     .build();
/// let response = sprout::render(layout(), options).await?;
/// ```
pub async fn render(
    node: impl Into<Node>,
    mut options: RenderOptions,
) -> Result<Response<Body>, RenderError> {
    let flags = match options.request_header("x-flags") {
        Some(flags) if !flags.trim().is_empty() => flags.parse()?,
        _ => Flags::default(),
    };

    if let Some(name) = options.request_header("x-component").map(str::to_string) {
        let component = options
            .component(&name)
            .cloned()
            .or_else(|| ComponentRegistry::global().get(&name))
            .ok_or_else(|| RenderError::UnknownComponent { name: name.clone() })?;
        let props = decode_props(options.request_header("x-props"))?;
        tracing::debug!(component = %name, "component fetch");

        let shared = prepare(&mut options, flags, None)?;
        let node = Node::from(ComponentNode {
            component,
            props,
            catch: None,
        });
        let html = render_fragment(&shared, &node).await;
        return json_response(&options, &shared, StatusCode::OK, html);
    }

    let route_form = options.request_header("x-route-form").is_some();
    if route_form || options.request_header("x-route").is_some() {
        let form = if route_form {
            options.request.as_ref().map(|req| parse_form(req.body()))
        } else {
            None
        };
        let shared = prepare(&mut options, flags, form)?;
        let Some(route) = shared.request.route.clone() else {
            tracing::debug!("route fetch without a match");
            return json_response(&options, &shared, StatusCode::NOT_FOUND, String::new());
        };
        let mut page = ComponentNode::new(route.component);
        for (name, value) in route.params {
            page = page.prop(name, value);
        }
        let html = render_fragment(&shared, &Node::from(page)).await;
        return json_response(&options, &shared, StatusCode::OK, html);
    }

    let shared = prepare(&mut options, Flags::default(), None)?;
    let head = render_document(&shared, &node.into()).await;
    let status = shared.status().unwrap_or(options.status);

    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/html; charset=utf-8");
    if let Some(cookie) = session_cookie(&shared) {
        builder = builder.header(SET_COOKIE, cookie);
    }
    let mut response = builder.body(Body::Stream(document_stream(head, shared)))?;
    extend_headers(&mut response, &options);
    Ok(response)
}

fn json_response(
    options: &RenderOptions,
    shared: &Arc<Shared>,
    status: StatusCode,
    html: String,
) -> Result<Response<Body>, RenderError> {
    let js = shared.take_script(true).into_js();
    let body = serde_json::Value::Array(vec![html.into(), js.into()]).to_string();
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = session_cookie(shared) {
        builder = builder.header(SET_COOKIE, cookie);
    }
    let mut response = builder.body(Body::Full(body))?;
    extend_headers(&mut response, options);
    Ok(response)
}

fn extend_headers(response: &mut Response<Body>, options: &RenderOptions) {
    for (name, value) in &options.headers {
        response.headers_mut().append(name.clone(), value.clone());
    }
}

fn session_cookie(shared: &Shared) -> Option<String> {
    let session = shared.request.session.as_ref()?;
    session.is_modified().then(|| session.to_set_cookie())
}

/// `x-props`: base64 of a JSON object.
fn decode_props(header: Option<&str>) -> Result<Props, RenderError> {
    let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) else {
        return Ok(Props::new());
    };
    let json: serde_json::Value = serde_json::from_slice(&STANDARD.decode(header)?)?;
    match json {
        serde_json::Value::Object(map) => Ok(Props::from_attrs(
            map.into_iter().map(|(name, value)| (name, Value::from(value))),
        )),
        serde_json::Value::Null => Ok(Props::new()),
        other => Err(RenderError::InvalidProps(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// An `application/x-www-form-urlencoded` body. A malformed body reads as
/// an empty form.
fn parse_form(body: &str) -> IndexMap<String, String> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(body) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(err) => {
            tracing::debug!(%err, "malformed form body");
            IndexMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form() {
        let form = parse_form("name=Ada+Lovelace&email=ada%40example.com&empty=&flag");
        assert_eq!(form["name"], "Ada Lovelace");
        assert_eq!(form["email"], "ada@example.com");
        assert_eq!(form["empty"], "");
        assert_eq!(form["flag"], "");
        assert_eq!(form.keys().collect::<Vec<_>>(), ["name", "email", "empty", "flag"]);

        let form = parse_form("tag=a&tag=b&q=%E2%9C%93");
        assert_eq!(form["tag"], "b");
        assert_eq!(form["q"], "\u{2713}");
        assert!(parse_form("").is_empty());
    }

    #[test]
    fn test_decode_props() {
        let header = STANDARD.encode(r#"{"id":7,"title":"x"}"#);
        let props = decode_props(Some(&header)).unwrap();
        assert_eq!(props.get("id"), Some(&Value::from(7)));
        assert_eq!(props.get_str("title"), Some("x"));

        assert!(decode_props(None).unwrap().attrs().next().is_none());
        assert!(matches!(
            decode_props(Some("not base64!")),
            Err(RenderError::InvalidProps(_))
        ));
        let array = STANDARD.encode("[1]");
        assert!(matches!(
            decode_props(Some(&array)),
            Err(RenderError::InvalidProps(_))
        ));
    }
}
