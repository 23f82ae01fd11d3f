//! Tracer trait for observing rendering.
//!
//! The [`Tracer`] sees component activations, streamed chunks, cache lookups
//! and finalize passes. [`NoopTracer`] is the default; [`LogTracer`] forwards
//! everything to `tracing`.
//!
//! # Example
//!
//! ```ignore
//! use sprout::{RenderOptions, SpanId, Tracer};
//!
//! struct Timing;
//!
//! impl Tracer for Timing {
//!     fn new_span_id(&self) -> SpanId {
//!         SpanId(1)
//!     }
//!
//!     fn on_chunk_flushed(&self, chunk_id: u32, bytes: usize) {
//!         println!("chunk {chunk_id}: {bytes} bytes");
//!     }
//! }
//!
//! let options = RenderOptions::builder().tracer(Timing).build();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique identifier for a component activation span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(pub u64);

/// How a component activation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentOutcome {
    /// Output was rendered in place.
    Rendered,
    /// Output was deferred behind a portal and will arrive as a chunk.
    Suspended {
        /// The chunk id of the portal.
        chunk_id: u32,
    },
    /// The component failed and its `catch` fallback was rendered.
    Caught {
        /// The error message.
        message: String,
    },
    /// The component failed without a fallback.
    Failed {
        /// The error message.
        message: String,
    },
}

/// Tracer trait for observing rendering.
///
/// All methods except [`Tracer::new_span_id`] have empty default
/// implementations. Implementations must be `Send + Sync`: chunks of one
/// request may resolve on different threads.
pub trait Tracer: Send + Sync + 'static {
    /// Generate a new unique span ID. Called once per component activation.
    fn new_span_id(&self) -> SpanId;

    /// Called when a component starts executing in scope `scope`.
    #[inline]
    fn on_component_start(&self, _span_id: SpanId, _component: &str, _scope: u32) {}

    /// Called when a component's output has been rendered, deferred or
    /// replaced by an error fallback.
    #[inline]
    fn on_component_end(&self, _span_id: SpanId, _component: &str, _outcome: ComponentOutcome) {}

    /// Called when a streamed chunk is written.
    #[inline]
    fn on_chunk_flushed(&self, _chunk_id: u32, _bytes: usize) {}

    /// Called on every `cache`/`static` lookup.
    #[inline]
    fn on_cache_check(&self, _key: &str, _hit: bool) {}

    /// Called at the start of each finalize pass with the number of pending
    /// chunks it is about to await.
    #[inline]
    fn on_finalize_pass(&self, _pass: u32, _pending: usize) {}
}

/// Tracer that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

/// Global span counter for NoopTracer.
static NOOP_SPAN_COUNTER: AtomicU64 = AtomicU64::new(1);

impl Tracer for NoopTracer {
    #[inline(always)]
    fn new_span_id(&self) -> SpanId {
        SpanId(NOOP_SPAN_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Tracer that forwards every event to `tracing` at debug/trace level.
#[derive(Debug, Default)]
pub struct LogTracer {
    next_span: AtomicU64,
}

impl LogTracer {
    /// Create a log tracer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for LogTracer {
    fn new_span_id(&self) -> SpanId {
        SpanId(self.next_span.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn on_component_start(&self, span_id: SpanId, component: &str, scope: u32) {
        tracing::trace!(span = span_id.0, component, scope, "component start");
    }

    fn on_component_end(&self, span_id: SpanId, component: &str, outcome: ComponentOutcome) {
        tracing::debug!(span = span_id.0, component, ?outcome, "component end");
    }

    fn on_chunk_flushed(&self, chunk_id: u32, bytes: usize) {
        tracing::debug!(chunk_id, bytes, "chunk flushed");
    }

    fn on_cache_check(&self, key: &str, hit: bool) {
        tracing::trace!(key, hit, "cache check");
    }

    fn on_finalize_pass(&self, pass: u32, pending: usize) {
        tracing::debug!(pass, pending, "finalize pass");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingTracer {
        starts: AtomicUsize,
        failures: AtomicUsize,
    }

    impl Tracer for CountingTracer {
        fn new_span_id(&self) -> SpanId {
            SpanId(1)
        }

        fn on_component_start(&self, _span_id: SpanId, _component: &str, _scope: u32) {
            self.starts.fetch_add(1, Ordering::Relaxed);
        }

        fn on_component_end(&self, _span_id: SpanId, _component: &str, outcome: ComponentOutcome) {
            if matches!(outcome, ComponentOutcome::Failed { .. }) {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[test]
    fn test_noop_tracer_span_id() {
        let tracer = NoopTracer;
        assert_ne!(tracer.new_span_id(), tracer.new_span_id());
    }

    #[test]
    fn test_log_tracer_span_ids_are_sequential() {
        let tracer = LogTracer::new();
        assert_eq!(tracer.new_span_id(), SpanId(1));
        assert_eq!(tracer.new_span_id(), SpanId(2));
    }

    #[test]
    fn test_counting_tracer() {
        let tracer = CountingTracer {
            starts: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        };
        tracer.on_component_start(SpanId(1), "a", 1);
        tracer.on_component_start(SpanId(2), "b", 2);
        tracer.on_component_end(SpanId(1), "a", ComponentOutcome::Rendered);
        tracer.on_component_end(
            SpanId(2),
            "b",
            ComponentOutcome::Failed {
                message: "boom".into(),
            },
        );
        assert_eq!(tracer.starts.load(Ordering::Relaxed), 2);
        assert_eq!(tracer.failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_tracer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopTracer>();
        assert_send_sync::<Arc<dyn Tracer>>();
    }
}
