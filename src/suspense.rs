//! Document rendering and the suspense scheduler.
//!
//! A page is written in two phases. The document phase walks the tree and
//! produces `<!doctype html>` plus all synchronous markup, leaving an
//! `<m-portal>` wherever a component suspended. The finalize phase then
//! repeats until nothing is pending:
//!
//! 1. flush the script payload for everything introduced so far,
//! 2. await every pending chunk concurrently,
//! 3. write the chunks in registration order.
//!
//! Resolving a chunk may register further chunks (nested suspense, the next
//! item of a stream); they are picked up by the next pass. The last pass
//! writes the final payload including the `$FLAGS` line.

use std::sync::Arc;

use futures::future::{self, join_all};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use indexmap::IndexMap;

use crate::context::{RenderContext, RequestContext, Shared};
use crate::error::RenderError;
use crate::node::Node;
use crate::options::RenderOptions;
use crate::render::render_node;
use crate::session::Session;
use crate::wire::Flags;

/// How a chunk applies to its portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkKind {
    /// Replace the portal with the content.
    Replace,
    /// Append the content (one item of a stream).
    Next,
    /// The stream ended; unwrap the portal.
    Done,
}

/// Wrap chunk markup so the runtime can insert it at its portal.
pub(crate) fn frame_chunk(chunk_id: u32, kind: ChunkKind, html: &str) -> String {
    match kind {
        ChunkKind::Replace => {
            format!("<m-chunk chunk-id=\"{chunk_id}\"><template>{html}</template></m-chunk>")
        }
        ChunkKind::Next => {
            format!("<m-chunk chunk-id=\"{chunk_id}\" next><template>{html}</template></m-chunk>")
        }
        ChunkKind::Done => format!("<m-chunk chunk-id=\"{chunk_id}\" done></m-chunk>"),
    }
}

/// Set up the ledger for one render, taking the request-bound parts out of
/// `options`.
pub(crate) fn prepare(
    options: &mut RenderOptions,
    flags: Flags,
    form: Option<IndexMap<String, String>>,
) -> Result<Arc<Shared>, RenderError> {
    let request = options.request.take();
    let route = request
        .as_ref()
        .and_then(|req| options.routes.resolve(req.uri().path()));
    let session = match &options.session {
        Some(session_options) => {
            let cookies = request.as_ref().map(|req| {
                req.headers()
                    .get_all(http::header::COOKIE)
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .collect::<Vec<_>>()
                    .join("; ")
            });
            Some(Session::load(session_options.clone(), cookies.as_deref())?)
        }
        None => None,
    };
    let context = RequestContext {
        request,
        route,
        form,
        context: std::mem::take(&mut options.context),
        session,
    };
    Ok(Shared::new(
        Arc::new(context),
        std::mem::take(&mut options.app),
        flags,
        options.tracer.clone(),
    ))
}

/// The document phase: doctype plus all synchronous markup.
pub(crate) async fn render_document(shared: &Arc<Shared>, node: &Node) -> String {
    let mut cx = RenderContext::new(shared.clone(), None);
    cx.write("<!doctype html>");
    render_node(&mut cx, node).await;
    cx.out
}

/// Render a fragment for a sub-fetch: async components are awaited inline,
/// so the markup is complete.
pub(crate) async fn render_fragment(shared: &Arc<Shared>, node: &Node) -> String {
    let mut cx = RenderContext::new(shared.clone(), None);
    cx.eager = true;
    render_node(&mut cx, node).await;
    let mut html = cx.out;
    loop {
        let pending = shared.take_pending();
        if pending.is_empty() {
            break;
        }
        for chunk in join_all(pending.into_iter().map(|p| p.future)).await {
            html.push_str(&chunk);
        }
    }
    html
}

/// The finalize phase as a stream of flushes.
pub(crate) fn finalize(shared: Arc<Shared>) -> BoxStream<'static, String> {
    stream::unfold(Some(shared), |shared| async move {
        let shared = shared?;
        let pass = shared.next_finalize_pass();
        let pending = shared.take_pending();
        shared.tracer.on_finalize_pass(pass, pending.len());
        if pending.is_empty() {
            let tail = shared.take_script(true).into_tag();
            return Some((tail, None));
        }

        let mut out = shared.take_script(false).into_tag();
        let (ids, futures): (Vec<u32>, Vec<_>) =
            pending.into_iter().map(|p| (p.chunk_id, p.future)).unzip();
        for (chunk_id, html) in ids.into_iter().zip(join_all(futures).await) {
            shared.tracer.on_chunk_flushed(chunk_id, html.len());
            out.push_str(&html);
        }
        Some((out, Some(shared)))
    })
    .boxed()
}

/// Document then finalize, as one stream.
pub(crate) fn document_stream(head: String, shared: Arc<Shared>) -> BoxStream<'static, String> {
    stream::once(future::ready(head))
        .chain(finalize(shared))
        .boxed()
}

/// Render a page as a stream of HTML flushes.
///
/// The first item is the document with portals in place of suspended
/// components; later items carry script payloads and chunks.
///
/// # Example
///
/// ```ignore
/// let mut body = render_to_stream(page(), RenderOptions::default()).await?;
/// while let Some(html) = body.next().await {
///     send(html).await?;
/// }
/// ```
pub async fn render_to_stream(
    node: impl Into<Node>,
    mut options: RenderOptions,
) -> Result<BoxStream<'static, String>, RenderError> {
    let shared = prepare(&mut options, Flags::default(), None)?;
    let head = render_document(&shared, &node.into()).await;
    Ok(document_stream(head, shared))
}

/// Render a page to a single string, waiting for every suspended component.
pub async fn render_to_string(
    node: impl Into<Node>,
    options: RenderOptions,
) -> Result<String, RenderError> {
    let stream = render_to_stream(node, options).await?;
    Ok(stream.collect::<Vec<_>>().await.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_chunk() {
        assert_eq!(
            frame_chunk(3, ChunkKind::Replace, "<p>hi</p>"),
            "<m-chunk chunk-id=\"3\"><template><p>hi</p></template></m-chunk>"
        );
        assert_eq!(
            frame_chunk(3, ChunkKind::Next, "x"),
            "<m-chunk chunk-id=\"3\" next><template>x</template></m-chunk>"
        );
        assert_eq!(
            frame_chunk(3, ChunkKind::Done, ""),
            "<m-chunk chunk-id=\"3\" done></m-chunk>"
        );
    }
}
