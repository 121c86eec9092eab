//! Content handler registry.
//!
//! Specialized content types (e.g. structured-notebook rendering) register
//! a predicate/handle pair here; the pipeline consults the registry before
//! its default body builder. Discovery is side-effect free: predicates only
//! inspect the node, never invoke the handler.

use codedigest_core::{ContentNode, DigestConfig, DigestError};

type Predicate = Box<dyn Fn(&ContentNode) -> bool + Send + Sync>;
type Handle = Box<dyn Fn(&ContentNode, &[u8], &DigestConfig) -> Result<String, DigestError> + Send + Sync>;

/// One registered handler: a pure predicate and a separate transform.
pub struct ContentHandler {
    /// Handler name, for diagnostics.
    pub name: String,
    predicate: Predicate,
    handle: Handle,
}

impl ContentHandler {
    /// Create a handler from a predicate/handle pair.
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&ContentNode) -> bool + Send + Sync + 'static,
        handle: impl Fn(&ContentNode, &[u8], &DigestConfig) -> Result<String, DigestError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            handle: Box::new(handle),
        }
    }

    /// Create a handler keyed on a file extension.
    pub fn for_extension(
        name: impl Into<String>,
        extension: &'static str,
        handle: impl Fn(&ContentNode, &[u8], &DigestConfig) -> Result<String, DigestError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::new(
            name,
            move |node| {
                node.path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            },
            handle,
        )
    }

    /// Test whether this handler applies to a node.
    pub fn applies_to(&self, node: &ContentNode) -> bool {
        (self.predicate)(node)
    }

    /// Transform raw content into a body string.
    pub fn handle(
        &self,
        node: &ContentNode,
        raw: &[u8],
        config: &DigestConfig,
    ) -> Result<String, DigestError> {
        (self.handle)(node, raw, config)
    }
}

impl std::fmt::Debug for ContentHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHandler")
            .field("name", &self.name)
            .finish()
    }
}

/// Ordered handler lookup; first matching predicate wins.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<ContentHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; earlier registrations take priority.
    pub fn register(&mut self, handler: ContentHandler) {
        self.handlers.push(handler);
    }

    /// Resolve the first handler whose predicate accepts the node.
    pub fn resolve(&self, node: &ContentNode) -> Option<&ContentHandler> {
        self.handlers.iter().find(|h| h.applies_to(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn node(path: &str) -> ContentNode {
        ContentNode::new_file(path, path.trim_start_matches('/'), 1, SystemTime::now(), 1)
    }

    #[test]
    fn test_first_matching_handler_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(ContentHandler::for_extension("first", "ipynb", |_, _, _| {
            Ok("first".into())
        }));
        registry.register(ContentHandler::for_extension("second", "ipynb", |_, _, _| {
            Ok("second".into())
        }));

        let node = node("/scan/nb.ipynb");
        let handler = registry.resolve(&node).unwrap();
        assert_eq!(handler.name, "first");
        let config = DigestConfig::default();
        assert_eq!(handler.handle(&node, b"", &config).unwrap(), "first");
    }

    #[test]
    fn test_no_match_returns_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.resolve(&node("/scan/a.rs")).is_none());
    }

    #[test]
    fn test_predicate_has_no_side_effects() {
        let mut registry = HandlerRegistry::new();
        registry.register(ContentHandler::new(
            "never",
            |_| false,
            |_, _, _| panic!("handler must not run during discovery"),
        ));
        assert!(registry.resolve(&node("/scan/a.rs")).is_none());
    }
}
