//! The client runtime.
//!
//! The runtime ships as a handful of small JavaScript modules. The renderer
//! records which [`Features`] a page needs while it walks the tree and each
//! finalize pass sends only the modules that are newly required.

use bitflags::bitflags;

bitflags! {
    /// Client runtime modules.
    ///
    /// The numeric value is part of the `$FLAGS` line, so bit positions are
    /// stable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u32 {
        /// Scope stores, `m-signal`, computations, effects and refs.
        const SIGNALS = 1;
        /// Event handler table and `$emit`.
        const EVENT = 1 << 1;
        /// Client-side class merging and style objects for live attributes.
        const STYLE = 1 << 2;
        /// `m-portal`/`m-chunk` out-of-order insertion.
        const SUSPENSE = 1 << 3;
        /// `m-component` lazy fetching.
        const COMPONENT = 1 << 4;
        /// `m-router` navigation.
        const ROUTER = 1 << 5;
        /// Intercepted form submission and `m-invalid`.
        const FORM = 1 << 6;
    }
}

const MODULES: &[(Features, &str)] = &[
    (Features::SIGNALS, include_str!("signals.js")),
    (Features::EVENT, include_str!("event.js")),
    (Features::STYLE, include_str!("style.js")),
    (Features::SUSPENSE, include_str!("suspense.js")),
    (Features::COMPONENT, include_str!("component.js")),
    (Features::ROUTER, include_str!("router.js")),
    (Features::FORM, include_str!("form.js")),
];

impl Features {
    /// Add the modules these features build on.
    pub fn with_dependencies(self) -> Features {
        let mut features = self;
        if features.intersects(Features::ROUTER) {
            features |= Features::COMPONENT;
        }
        if features.intersects(Features::FORM) {
            features |= Features::EVENT;
        }
        if features.intersects(Features::EVENT | Features::COMPONENT) {
            features |= Features::SIGNALS;
        }
        features
    }

    /// The JavaScript source of every module in `self`, in dependency order.
    pub fn script(self) -> String {
        MODULES
            .iter()
            .filter(|(feature, _)| self.contains(*feature))
            .map(|(_, source)| source.trim())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies() {
        let features = Features::FORM.with_dependencies();
        assert!(features.contains(Features::FORM | Features::EVENT | Features::SIGNALS));
        assert!(!features.contains(Features::SUSPENSE));
        assert!(Features::ROUTER
            .with_dependencies()
            .contains(Features::COMPONENT | Features::SIGNALS));
    }

    #[test]
    fn test_script_includes_only_requested_modules() {
        let script = Features::SUSPENSE.script();
        assert!(script.contains("m-chunk"));
        assert!(!script.contains("m-signal"));
        assert!(Features::empty().script().is_empty());
    }

    #[test]
    fn test_store_reads_feed_computation_deps() {
        let script = Features::SIGNALS.script();
        assert!(script.contains("get(t, key) {"));
        assert!(script.contains("reading.add(scope + \":\" + key)"));
        assert!(script.contains("subscribe(seen);"));
    }
}
