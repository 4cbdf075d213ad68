//! XML namespace bindings
//!
//! Namespace declarations are collected during the single parse pass over a
//! document. The collector keeps the first binding seen for each prefix and
//! hands back a list sorted by (prefix, uri).

use indexmap::IndexMap;
use serde::Serialize;

/// A prefix/URI pair declared somewhere in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceBinding {
    /// Declared prefix, empty for the default namespace
    pub prefix: String,
    /// Namespace URI
    pub uri: String,
}

/// Collects namespace declarations in encounter order, first-seen prefix wins
#[derive(Debug, Default)]
pub struct NamespaceCollector {
    bindings: IndexMap<String, String>,
}

impl NamespaceCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration. Later re-declarations of a prefix are ignored.
    pub fn record(&mut self, prefix: &str, uri: &str) {
        if !self.bindings.contains_key(prefix) {
            self.bindings.insert(prefix.to_string(), uri.to_string());
        }
    }

    /// Consume the collector and return bindings sorted by (prefix, uri)
    pub fn into_sorted_bindings(self) -> Vec<NamespaceBinding> {
        let mut bindings: Vec<NamespaceBinding> = self
            .bindings
            .into_iter()
            .map(|(prefix, uri)| NamespaceBinding { prefix, uri })
            .collect();
        bindings.sort_by(|a, b| (&a.prefix, &a.uri).cmp(&(&b.prefix, &b.uri)));
        bindings
    }
}
