//! Tests for the HTTP entry point: page responses, sub-fetches, routing and
//! sessions.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::StatusCode;
use pretty_assertions::assert_eq;
use sprout::{
    component, h, render, ClientFn, ComponentRef, Flags, Features, RenderError, RenderOptions,
    Router, SessionOptions,
};

const SECRET: &str = "test-secret";

fn request(uri: &str) -> http::request::Builder {
    http::Request::builder().uri(uri)
}

fn counter() -> ComponentRef {
    component("counter", |cx, props| {
        let start = props.get("start").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let count = cx.init("count", start);
        Ok(h("button")
            .on("click", ClientFn::body("this.count++"))
            .child(count))
    })
}

fn user_page() -> ComponentRef {
    component("user", |cx, _props| {
        let id = cx.param("id").unwrap_or("?").to_string();
        Ok(h("p").child(format!("user {id}")))
    })
}

fn routes() -> Router {
    Router::new()
        .route("/", component("home", |_cx, _props| Ok(h("p").child("home"))))
        .route("/users/:id", user_page())
}

async fn json_body(response: http::Response<sprout::Body>) -> (String, String) {
    let body = response.into_body().collect().await;
    serde_json::from_str(&body).expect("sub-fetch answers [html, js]")
}

// ============================================================================
// Page Responses
// ============================================================================

#[tokio::test]
async fn test_page_response() {
    let options = RenderOptions::builder()
        .request(request("/").body(String::new()).unwrap())
        .header("x-powered-by", "sprout")
        .build();
    let response = render(h("p").child("hello"), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(response.headers()["x-powered-by"], "sprout");
    let body = response.into_body().collect().await;
    assert!(body.starts_with("<!doctype html><p>hello</p>"));
}

#[tokio::test]
async fn test_configured_status() {
    let options = RenderOptions::builder()
        .status(StatusCode::IM_A_TEAPOT)
        .build();
    let response = render(h("p").child("short and stout"), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
}

// ============================================================================
// Router
// ============================================================================

#[tokio::test]
async fn test_router_renders_matched_route() {
    let options = RenderOptions::builder()
        .request(request("/users/42").body(String::new()).unwrap())
        .routes(routes())
        .build();
    let response = render(h("router").child("not found"), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await;
    assert!(body.starts_with(
        "<!doctype html><m-router><p>user 42</p>\
         <template m-fallback>not found</template></m-router>"
    ));
}

#[tokio::test]
async fn test_router_without_match_is_not_found() {
    let options = RenderOptions::builder()
        .request(request("/nope").body(String::new()).unwrap())
        .routes(routes())
        .build();
    let response = render(h("router").child("not found"), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response.into_body().collect().await;
    assert!(body.starts_with(
        "<!doctype html><m-router>not found<template m-fallback>not found</template></m-router>"
    ));
}

#[tokio::test]
async fn test_router_fallback_effects_only_apply_without_match() {
    let fallback = || {
        h("router")
            .child(h("p").child("not found"))
            .child(h("redirect").attr("to", "/login"))
    };

    let options = RenderOptions::builder()
        .request(request("/").body(String::new()).unwrap())
        .routes(routes())
        .build();
    let response = render(fallback(), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await;
    assert!(body.contains("<p>home</p><template m-fallback><p>not found</p></template>"));
    assert!(!body.contains("location.href"));

    let options = RenderOptions::builder()
        .request(request("/nope").body(String::new()).unwrap())
        .routes(routes())
        .build();
    let response = render(fallback(), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response.into_body().collect().await;
    assert!(body.contains("location.href=\"/login\";"));
}

#[tokio::test]
async fn test_route_fetch() {
    let options = RenderOptions::builder()
        .request(
            request("/users/7")
                .header("x-route", "1")
                .header("x-flags", "2|0|33")
                .body(String::new())
                .unwrap(),
        )
        .routes(routes())
        .build();
    let response = render(h("router"), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let (html, js) = json_body(response).await;
    assert_eq!(html, "<p>user 7</p>");
    assert!(js.ends_with("$FLAGS=\"3|0|33\";\n"));
}

#[tokio::test]
async fn test_route_fetch_without_match() {
    let options = RenderOptions::builder()
        .request(request("/missing").header("x-route", "1").body(String::new()).unwrap())
        .routes(routes())
        .build();
    let response = render(h("router"), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let (html, _js) = json_body(response).await;
    assert_eq!(html, "");
}

#[tokio::test]
async fn test_route_form_submission() {
    let signup = component("signup", |cx, _props| {
        let form = cx.form()?;
        let name = form.get("name").cloned().unwrap_or_default();
        Ok(h("p").child(format!("welcome {name}")))
    });
    let options = RenderOptions::builder()
        .request(
            request("/signup")
                .method("POST")
                .header("x-route-form", "1")
                .body("name=Ada+Lovelace".to_string())
                .unwrap(),
        )
        .routes(Router::new().route("/signup", signup))
        .build();
    let response = render(h("router"), options).await.unwrap();
    let (html, _js) = json_body(response).await;
    assert_eq!(html, "<p>welcome Ada Lovelace</p>");
}

// ============================================================================
// Component Fetches
// ============================================================================

#[tokio::test]
async fn test_component_fetch_continues_flags() {
    let flags = Flags {
        scope: 3,
        chunk: 2,
        features: Features::SIGNALS,
    };
    let props = STANDARD.encode(r#"{"start":4}"#);
    let options = RenderOptions::builder()
        .request(
            request("/")
                .header("x-component", "counter")
                .header("x-props", props)
                .header("x-flags", flags.to_string())
                .body(String::new())
                .unwrap(),
        )
        .component(counter())
        .build();
    let response = render(h("p").child("page"), options).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let (html, js) = json_body(response).await;
    assert_eq!(
        html,
        "<button onclick=\"$emit(event,'4_0',4)\"><m-signal scope=\"4\" key=\"count\">4</m-signal></button>"
    );
    assert!(js.contains("$MS({\"4:count\":4});"));
    assert!(js.contains("$MF(\"4_0\",function(event){this.count++});"));
    assert!(js.contains("window.$emit"), "event module is new to the client");
    assert!(!js.contains("window.$watch"), "signals module was already loaded");
    assert!(js.ends_with("$FLAGS=\"4|2|3\";\n"));
}

#[tokio::test]
async fn test_component_fetch_resolves_registered_ids() {
    let widget = component("widget", |_cx, _props| Ok(h("p").child("widget")));
    let page = h("component").attr("is", widget.clone());
    let response = render(page, RenderOptions::default()).await.unwrap();
    let body = response.into_body().collect().await;
    let start = body.find("name=\"").unwrap() + "name=\"".len();
    let id = &body[start..start + body[start..].find('"').unwrap()];

    let options = RenderOptions::builder()
        .request(request("/").header("x-component", id).body(String::new()).unwrap())
        .build();
    let response = render(h("p"), options).await.unwrap();
    let (html, _js) = json_body(response).await;
    assert_eq!(html, "<p>widget</p>");
}

#[tokio::test]
async fn test_unknown_component_fetch() {
    let options = RenderOptions::builder()
        .request(request("/").header("x-component", "nope").body(String::new()).unwrap())
        .build();
    let err = render(h("p"), options).await.unwrap_err();
    assert!(matches!(err, RenderError::UnknownComponent { ref name } if name == "nope"));
}

#[tokio::test]
async fn test_invalid_flags() {
    let options = RenderOptions::builder()
        .request(
            request("/")
                .header("x-component", "counter")
                .header("x-flags", "not|flags")
                .body(String::new())
                .unwrap(),
        )
        .component(counter())
        .build();
    let err = render(h("p"), options).await.unwrap_err();
    assert!(matches!(err, RenderError::InvalidFlags(_)));
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_session_round_trip() {
    let login = component("login", |cx, _props| {
        cx.session()?.set("user", "ada");
        Ok(h("p").child("logged in"))
    });
    let options = RenderOptions::builder()
        .request(request("/").body(String::new()).unwrap())
        .session(SessionOptions::new(SECRET))
        .build();
    let response = render(login.node(), options).await.unwrap();
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let whoami = component("whoami", |cx, _props| {
        let user = cx.session()?.get("user").map(|v| v.to_string()).unwrap_or_default();
        Ok(h("p").child(format!("hello {user}")))
    });
    let options = RenderOptions::builder()
        .request(request("/").header("cookie", cookie).body(String::new()).unwrap())
        .session(SessionOptions::new(SECRET))
        .build();
    let response = render(whoami.node(), options).await.unwrap();
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body = response.into_body().collect().await;
    assert!(body.starts_with("<!doctype html><p>hello ada</p>"));
}

#[tokio::test]
async fn test_session_without_secret_fails() {
    let options = RenderOptions::builder()
        .request(request("/").body(String::new()).unwrap())
        .session(SessionOptions::new(""))
        .build();
    let err = render(h("p"), options).await.unwrap_err();
    assert!(matches!(err, RenderError::MissingSessionSecret));
}

#[tokio::test]
async fn test_session_missing_from_options() {
    let needs_session = component("needs-session", |cx, _props| {
        cx.session()?;
        Ok(())
    });
    let response = render(needs_session.node(), RenderOptions::default())
        .await
        .unwrap();
    let body = response.into_body().collect().await;
    assert!(body.contains("console.error(\"needs-session: missing render context: session"));
}
