//! Function component dispatch.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};

use super::{render_in_scope, render_node};
use crate::component::Output;
use crate::context::{Pending, RenderContext, Shared};
use crate::escape::json_for_script;
use crate::node::{ComponentNode, Node};
use crate::runtime::Features;
use crate::scope::Scope;
use crate::suspense::{frame_chunk, ChunkKind};
use crate::tracer::ComponentOutcome;

/// Run a component in a fresh scope and render its output.
///
/// Sync output renders in place. Async output is awaited in place when the
/// render is eager (or the node asks for `rendering="eager"`); otherwise a
/// portal is written and the rest is deferred to the suspense scheduler.
pub(crate) fn render_component<'a>(
    cx: &'a mut RenderContext,
    node: &'a Arc<ComponentNode>,
) -> BoxFuture<'a, ()> {
    async move {
        let shared = cx.shared.clone();
        let scope = shared.new_scope(node.props.children.clone(), cx.scope.clone());
        let name = node.component.name();
        let span = shared.tracer.new_span_id();
        shared.tracer.on_component_start(span, name, scope.id());

        let eager = cx.eager || node.is_eager();
        let outcome = match node.component.render(scope.clone(), node.props.clone()) {
            Err(err) => render_failure(cx, node, &scope, err).await,
            Ok(Output::Empty) => ComponentOutcome::Rendered,
            Ok(Output::Node(output)) => {
                render_in_scope(cx, Some(scope.clone()), &output).await;
                ComponentOutcome::Rendered
            }
            Ok(Output::Iter(items)) => {
                for item in &items {
                    render_in_scope(cx, Some(scope.clone()), item).await;
                }
                ComponentOutcome::Rendered
            }
            Ok(Output::Future(future)) if eager => match future.await {
                Ok(output) => {
                    render_in_scope(cx, Some(scope.clone()), &output).await;
                    ComponentOutcome::Rendered
                }
                Err(err) => render_failure(cx, node, &scope, err).await,
            },
            Ok(Output::Stream(mut stream)) if eager => {
                let mut outcome = ComponentOutcome::Rendered;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(output) => render_in_scope(cx, Some(scope.clone()), &output).await,
                        Err(err) => {
                            outcome = render_failure(cx, node, &scope, err).await;
                            break;
                        }
                    }
                }
                outcome
            }
            Ok(Output::Future(future)) => {
                let chunk_id = write_portal(cx, node).await;
                shared.push_pending(Pending {
                    chunk_id,
                    future: resolve_chunk(shared.clone(), scope.clone(), node.clone(), chunk_id, future),
                });
                shared.tracer.on_component_end(span, name, ComponentOutcome::Suspended { chunk_id });
                return;
            }
            Ok(Output::Stream(stream)) => {
                let chunk_id = write_portal(cx, node).await;
                shared.push_pending(Pending {
                    chunk_id,
                    future: pull_stream(shared.clone(), scope.clone(), node.clone(), chunk_id, stream),
                });
                shared.tracer.on_component_end(span, name, ComponentOutcome::Suspended { chunk_id });
                return;
            }
        };
        scope.complete();
        shared.tracer.on_component_end(span, name, outcome);
    }
    .boxed()
}

/// `<m-portal chunk-id="N">placeholder</m-portal>`. Returns the chunk id.
async fn write_portal(cx: &mut RenderContext, node: &ComponentNode) -> u32 {
    let chunk_id = cx.shared.next_chunk();
    cx.shared.require(Features::SUSPENSE);
    cx.write(&format!("<m-portal chunk-id=\"{chunk_id}\">"));
    if let Some(placeholder) = node.props.get("placeholder") {
        let placeholder = Node::from(placeholder.clone());
        render_node(cx, &placeholder).await;
    }
    cx.write("</m-portal>");
    chunk_id
}

/// The deferred half of an async component: await, render into its own
/// buffer, frame as a chunk.
fn resolve_chunk(
    shared: Arc<Shared>,
    scope: Scope,
    node: Arc<ComponentNode>,
    chunk_id: u32,
    future: BoxFuture<'static, anyhow::Result<Node>>,
) -> BoxFuture<'static, String> {
    async move {
        let mut sub = RenderContext::new(shared, Some(scope.clone()));
        match future.await {
            Ok(output) => render_node(&mut sub, &output).await,
            Err(err) => {
                render_failure(&mut sub, &node, &scope, err).await;
            }
        }
        scope.complete();
        frame_chunk(chunk_id, ChunkKind::Replace, &sub.out)
    }
    .boxed()
}

/// Pull one item of a streaming component. Each item registers the next
/// pull, so items are strictly sequential and arrive in order.
fn pull_stream(
    shared: Arc<Shared>,
    scope: Scope,
    node: Arc<ComponentNode>,
    chunk_id: u32,
    mut stream: BoxStream<'static, anyhow::Result<Node>>,
) -> BoxFuture<'static, String> {
    async move {
        let mut sub = RenderContext::new(shared.clone(), Some(scope.clone()));
        match stream.next().await {
            Some(Ok(output)) => {
                render_node(&mut sub, &output).await;
                let next = pull_stream(shared.clone(), scope, node, chunk_id, stream);
                shared.push_pending(Pending {
                    chunk_id,
                    future: next,
                });
                frame_chunk(chunk_id, ChunkKind::Next, &sub.out)
            }
            Some(Err(err)) => {
                render_failure(&mut sub, &node, &scope, err).await;
                scope.complete();
                let mut html = frame_chunk(chunk_id, ChunkKind::Next, &sub.out);
                html.push_str(&frame_chunk(chunk_id, ChunkKind::Done, ""));
                html
            }
            None => {
                scope.complete();
                frame_chunk(chunk_id, ChunkKind::Done, "")
            }
        }
    }
    .boxed()
}

/// Per-component fault isolation: render the `catch` fallback, or log the
/// error and leave an inert diagnostic. Never propagates.
fn render_failure<'a>(
    cx: &'a mut RenderContext,
    node: &'a ComponentNode,
    scope: &'a Scope,
    err: anyhow::Error,
) -> BoxFuture<'a, ComponentOutcome> {
    async move {
        let name = node.component.name();
        let message = format!("{err:#}");
        match &node.catch {
            Some(catch) => {
                match catch(&err) {
                    Ok(fallback) => render_node(cx, &fallback).await,
                    Err(catch_err) => {
                        tracing::debug!(
                            component = name,
                            scope = scope.id(),
                            error = %format!("{catch_err:#}"),
                            "catch handler failed"
                        );
                    }
                }
                ComponentOutcome::Caught { message }
            }
            None => {
                tracing::error!(
                    component = name,
                    scope = scope.id(),
                    error = %message,
                    "component failed"
                );
                let diagnostic = serde_json::Value::from(format!("{name}: {message}"));
                cx.write(&format!(
                    "<script>console.error({})</script>",
                    json_for_script(&diagnostic)
                ));
                ComponentOutcome::Failed { message }
            }
        }
    }
    .boxed()
}
