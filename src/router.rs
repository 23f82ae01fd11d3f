//! Route table for the `router` element and `x-route` fetches.
//!
//! Matching is deliberately simple: an exact pattern wins, otherwise the
//! first dynamic pattern (in registration order) that matches. Dynamic
//! segments are `:name` (one segment) and a trailing `*` (the rest).

use indexmap::IndexMap;

use crate::component::ComponentRef;

/// An ordered route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<(String, ComponentRef)>,
}

/// The result of a successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The pattern that matched.
    pub pattern: String,
    /// The component to render.
    pub component: ComponentRef,
    /// Captured parameters; a trailing `*` is captured as `"*"`.
    pub params: IndexMap<String, String>,
}

impl Router {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, builder style.
    pub fn route(mut self, pattern: impl Into<String>, component: ComponentRef) -> Self {
        self.routes.push((pattern.into(), component));
        self
    }

    /// Returns true if no route was added.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Match a request path (query strings are ignored).
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = normalize(path.split('?').next().unwrap_or_default());
        let exact = self
            .routes
            .iter()
            .find(|(pattern, _)| !is_dynamic(pattern) && normalize(pattern) == path);
        if let Some((pattern, component)) = exact {
            return Some(RouteMatch {
                pattern: pattern.clone(),
                component: component.clone(),
                params: IndexMap::new(),
            });
        }
        self.routes
            .iter()
            .filter(|(pattern, _)| is_dynamic(pattern))
            .find_map(|(pattern, component)| {
                match_pattern(pattern, path).map(|params| RouteMatch {
                    pattern: pattern.clone(),
                    component: component.clone(),
                    params,
                })
            })
    }
}

fn is_dynamic(pattern: &str) -> bool {
    pattern.contains(':') || pattern.contains('*')
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_pattern(pattern: &str, path: &str) -> Option<IndexMap<String, String>> {
    let mut params = IndexMap::new();
    let mut parts = segments(path);
    let mut pattern_parts = segments(pattern).peekable();
    while let Some(expected) = pattern_parts.next() {
        if expected == "*" && pattern_parts.peek().is_none() {
            let rest: Vec<&str> = parts.by_ref().collect();
            params.insert("*".to_string(), decode(&rest.join("/")));
            return Some(params);
        }
        let actual = parts.next()?;
        if let Some(name) = expected.strip_prefix(':') {
            params.insert(name.to_string(), decode(actual));
        } else if expected != actual {
            return None;
        }
    }
    parts.next().is_none().then_some(params)
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::component;

    fn page(name: &'static str) -> ComponentRef {
        component(name, |_cx, _props| Ok(()))
    }

    #[test]
    fn test_exact_match_wins_over_dynamic() {
        let router = Router::new()
            .route("/users/:id", page("user"))
            .route("/users/new", page("new_user"));
        let found = router.resolve("/users/new").unwrap();
        assert_eq!(found.component.name(), "new_user");
        assert!(found.params.is_empty());
    }

    #[test]
    fn test_first_dynamic_match() {
        let router = Router::new()
            .route("/", page("home"))
            .route("/posts/:slug", page("post"))
            .route("/posts/:other", page("shadowed"));
        let found = router.resolve("/posts/hello%20world/?page=2").unwrap();
        assert_eq!(found.component.name(), "post");
        assert_eq!(found.params["slug"], "hello world");
        assert_eq!(router.resolve("").unwrap().component.name(), "home");
    }

    #[test]
    fn test_wildcard_and_misses() {
        let router = Router::new()
            .route("/files/*", page("files"))
            .route("/a/:b", page("ab"));
        let found = router.resolve("/files/docs/readme.md").unwrap();
        assert_eq!(found.params["*"], "docs/readme.md");
        assert!(router.resolve("/a/b/c").is_none());
        assert!(router.resolve("/nowhere").is_none());
    }
}
