use indexmap::IndexSet;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bare specifier → package URL, in the standard import-map JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    pub imports: BTreeMap<String, String>,
}

impl ImportMap {
    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.imports.get(specifier).map(String::as_str)
    }

    pub fn insert(&mut self, specifier: impl Into<String>, url: impl Into<String>) {
        self.imports.insert(specifier.into(), url.into());
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}

impl<S: Into<String>, U: Into<String>> FromIterator<(S, U)> for ImportMap {
    fn from_iter<I: IntoIterator<Item = (S, U)>>(iter: I) -> Self {
        ImportMap { imports: iter.into_iter().map(|(s, u)| (s.into(), u.into())).collect() }
    }
}

/// State for one build invocation, or for a whole watch session.
///
/// The discovered set only ever grows. The queue holds URLs still to be
/// processed in the current pass and is drained last-in first-out.
#[derive(Debug, Default)]
pub struct BuildSession {
    discovered: IndexSet<String>,
    queue: Vec<String>,
    bare_specifiers: BTreeSet<String>,
    import_map: Option<ImportMap>,
}

impl BuildSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url` and queues it if it has never been seen. Returns
    /// whether it was new.
    pub fn discover(&mut self, url: &str) -> bool {
        if self.discovered.contains(url) {
            return false;
        }
        trace!("Discovered {}", url);
        self.discovered.insert(url.to_string());
        self.queue.push(url.to_string());
        true
    }

    /// Queues `url` even if it was already processed, without ever adding a
    /// second entry to the discovered set.
    pub fn enqueue(&mut self, url: &str) {
        if !self.discovered.contains(url) {
            self.discovered.insert(url.to_string());
        }
        if !self.queue.iter().any(|queued| queued == url) {
            self.queue.push(url.to_string());
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop()
    }

    /// Replaces the queue with every discovered URL, arranged so they pop in
    /// discovery order.
    pub fn requeue_discovered(&mut self) {
        self.queue = self.discovered.iter().rev().cloned().collect();
    }

    pub fn record_bare(&mut self, specifier: &str) {
        if self.bare_specifiers.insert(specifier.to_string()) {
            trace!("Recorded bare specifier '{}'", specifier);
        }
    }

    pub fn discovered(&self) -> &IndexSet<String> {
        &self.discovered
    }

    pub fn is_discovered(&self, url: &str) -> bool {
        self.discovered.contains(url)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn bare_specifiers(&self) -> &BTreeSet<String> {
        &self.bare_specifiers
    }

    pub fn import_map(&self) -> Option<&ImportMap> {
        self.import_map.as_ref()
    }

    pub fn set_import_map(&mut self, import_map: ImportMap) {
        self.import_map = Some(import_map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_is_idempotent() {
        let mut session = BuildSession::new();
        assert!(session.discover("/a.js"));
        assert!(!session.discover("/a.js"));
        assert_eq!(session.discovered().len(), 1);
        assert_eq!(session.queue_len(), 1);
    }

    #[test]
    fn test_queue_is_lifo() {
        let mut session = BuildSession::new();
        session.discover("/a.js");
        session.discover("/b.js");
        assert_eq!(session.pop().as_deref(), Some("/b.js"));
        assert_eq!(session.pop().as_deref(), Some("/a.js"));
        assert_eq!(session.pop(), None);
    }

    #[test]
    fn test_enqueue_does_not_duplicate() {
        let mut session = BuildSession::new();
        session.discover("/a.js");
        session.pop();

        session.enqueue("/a.js");
        session.enqueue("/a.js");
        session.enqueue("/new.js");
        assert_eq!(session.discovered().len(), 2);
        assert_eq!(session.queue_len(), 2);
    }

    #[test]
    fn test_requeue_pops_in_discovery_order() {
        let mut session = BuildSession::new();
        for url in ["/index.html", "/a.js", "/b.js"] {
            session.discover(url);
        }
        while session.pop().is_some() {}

        session.requeue_discovered();
        let order: Vec<String> = std::iter::from_fn(|| session.pop()).collect();
        assert_eq!(order, vec!["/index.html", "/a.js", "/b.js"]);
    }

    #[test]
    fn test_import_map_json_shape() {
        let map: ImportMap = [("react", "/pkg/react.js")].into_iter().collect();
        assert_eq!(map.get("react"), Some("/pkg/react.js"));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"imports":{"react":"/pkg/react.js"}}"#);
    }
}
