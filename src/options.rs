//! Render configuration.

use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use indexmap::IndexMap;

use crate::component::ComponentRef;
use crate::router::Router;
use crate::session::SessionOptions;
use crate::tracer::{NoopTracer, Tracer};
use crate::value::Value;

/// Options for one render.
///
/// Built with [`RenderOptions::builder`]; `RenderOptions::default()` renders
/// without a request, routes or session.
pub struct RenderOptions {
    pub(crate) request: Option<http::Request<String>>,
    pub(crate) routes: Router,
    pub(crate) components: Vec<ComponentRef>,
    pub(crate) headers: HeaderMap,
    pub(crate) status: StatusCode,
    pub(crate) app: IndexMap<String, Value>,
    pub(crate) context: IndexMap<String, Value>,
    pub(crate) session: Option<SessionOptions>,
    pub(crate) tracer: Arc<dyn Tracer>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            request: None,
            routes: Router::new(),
            components: Vec::new(),
            headers: HeaderMap::new(),
            status: StatusCode::OK,
            app: IndexMap::new(),
            context: IndexMap::new(),
            session: None,
            tracer: Arc::new(NoopTracer),
        }
    }
}

impl RenderOptions {
    /// Start building options.
    pub fn builder() -> RenderOptionsBuilder {
        RenderOptionsBuilder::new()
    }

    /// Look up a component passed in [`RenderOptionsBuilder::component`] by
    /// name.
    pub fn component(&self, name: &str) -> Option<&ComponentRef> {
        self.components.iter().find(|c| c.name() == name)
    }

    /// The request header `name`, if present and valid UTF-8.
    pub(crate) fn request_header(&self, name: &str) -> Option<&str> {
        self.request
            .as_ref()
            .and_then(|req| req.headers().get(name))
            .and_then(|value| value.to_str().ok())
    }
}

/// Builder for [`RenderOptions`].
///
/// # Example
///
/// ```ignore
/// let options = RenderOptions::builder()
///     .request(request)
///     .routes(Router::new().route("/", home).route("/posts/:slug", post))
///     .app("user", "ada")
///     .session(SessionOptions::new(secret))
///     .tracer(LogTracer::new())
///     .build();
/// ```
#[derive(Default)]
pub struct RenderOptionsBuilder {
    options: RenderOptions,
}

impl RenderOptionsBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// The incoming request. Its body carries form data for `x-route-form`.
    pub fn request(mut self, request: http::Request<String>) -> Self {
        self.options.request = Some(request);
        self
    }

    /// The route table used by `router` elements and `x-route` fetches.
    pub fn routes(mut self, routes: Router) -> Self {
        self.options.routes = routes;
        self
    }

    /// A component that `x-component` fetches may request by name.
    pub fn component(mut self, component: ComponentRef) -> Self {
        self.options.components.push(component);
        self
    }

    /// An extra response header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.options.headers.append(name, value);
            }
            _ => tracing::warn!(name, "ignoring invalid response header"),
        }
        self
    }

    /// The response status of a page render. Defaults to `200 OK`.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.options.status = status;
        self
    }

    /// Seed a field of the app scope (scope `0`).
    pub fn app(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.app.insert(key.into(), value.into());
        self
    }

    /// A value components can read with [`Scope::context`](crate::Scope::context).
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.context.insert(key.into(), value.into());
        self
    }

    /// Enable signed-cookie sessions.
    pub fn session(mut self, session: SessionOptions) -> Self {
        self.options.session = Some(session);
        self
    }

    /// Set the tracer.
    pub fn tracer<T: Tracer>(mut self, tracer: T) -> Self {
        self.options.tracer = Arc::new(tracer);
        self
    }

    /// Finish building.
    pub fn build(self) -> RenderOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::component;

    #[test]
    fn test_builder_defaults() {
        let options = RenderOptions::builder().build();
        assert_eq!(options.status, StatusCode::OK);
        assert!(options.request.is_none());
        assert!(options.routes.is_empty());
        assert!(options.session.is_none());
    }

    #[test]
    fn test_builder_sets_values() {
        let card = component("card", |_cx, _props| Ok(()));
        let request = http::Request::builder()
            .uri("/")
            .header("x-component", "card")
            .body(String::new())
            .unwrap();
        let options = RenderOptions::builder()
            .request(request)
            .component(card)
            .header("cache-control", "no-store")
            .header("bad header", "x")
            .app("theme", "dark")
            .status(StatusCode::CREATED)
            .build();
        assert!(options.component("card").is_some());
        assert_eq!(options.request_header("x-component"), Some("card"));
        assert_eq!(options.headers.len(), 1);
        assert_eq!(options.app["theme"], Value::from("dark"));
        assert_eq!(options.status, StatusCode::CREATED);
    }
}
