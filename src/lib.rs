//! Sprout: streaming server-side rendering with fine-grained signals.
//!
//! A page is described as a tree of [`Node`]s built with [`h`] and function
//! components. Rendering writes plain HTML that is correct without any
//! JavaScript, plus just enough client runtime and wire statements to keep
//! signal-driven parts of the page live.
//!
//! # Key Features
//!
//! - **Signals without a virtual DOM**: values read through a [`Scope`] are
//!   rendered with their current value and a placeholder the client patches
//!   by key
//! - **Out-of-order streaming**: async components render behind a portal and
//!   arrive later as chunks, in registration order
//! - **Minimal runtime**: only the client modules a page actually needs are
//!   sent, once
//! - **Sub-fetches**: lazy components and client-side routing re-render parts
//!   of the page over JSON, continuing the page's id counters
//! - **Fault isolation**: a failing component renders its `catch` fallback or
//!   an inert diagnostic; siblings are unaffected
//!
//! # Example
//!
//! ```ignore
//! use sprout::{component, h, render_to_string, ClientFn, RenderOptions};
//!
//! let counter = component("counter", |cx, _props| {
//!     let count = cx.init("count", 0);
//!     Ok(h("button")
//!         .on("click", ClientFn::body("this.count++"))
//!         .child(count))
//! });
//!
//! let html = render_to_string(
//!     h("html").child(h("body").child(counter.node())),
//!     RenderOptions::default(),
//! )
//! .await?;
//! ```
//!
//! # Observability
//!
//! Component activations, chunk flushes, cache lookups and finalize passes
//! are reported to a [`Tracer`]; see the [`tracer`] module.

mod cache;
mod component;
mod context;
mod error;
mod escape;
mod handler;
mod node;
mod options;
mod render;
mod router;
pub mod runtime;
mod scope;
mod session;
mod signal;
mod style;
mod suspense;
pub mod tracer;
mod value;
mod wire;

pub use cache::RenderCache;
pub use component::{component, Component, ComponentRef, ComponentRegistry, FnComponent, IntoOutput, Output};
pub use error::RenderError;
pub use escape::{escape_for_text, escape_html};
pub use handler::{render, Body};
pub use node::{fragment, h, is_void_element, raw, text, CatchFn, ComponentNode, Element, Node, Props, Tag};
pub use options::{RenderOptions, RenderOptionsBuilder};
pub use router::{RouteMatch, Router};
pub use runtime::Features;
pub use scope::{RefHandle, Scope};
pub use session::{Session, SessionOptions};
pub use signal::{is_tracking, track, untrack, ClientFn, Computation, DepKey, Signal, SignalKey};
pub use style::{hash_css, merge_class_names, style_to_css, Css};
pub use suspense::{render_to_stream, render_to_string};
pub use tracer::{ComponentOutcome, LogTracer, NoopTracer, SpanId, Tracer};
pub use value::{format_number, Value};
pub use wire::{decode_signal_init, encode_signal_init, Flags, Script};
