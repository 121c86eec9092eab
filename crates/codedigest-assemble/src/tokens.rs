//! Token estimation adapters.

use std::collections::HashMap;
use std::sync::Arc;

use codedigest_core::DigestConfig;

/// Characters per token for the default estimator.
const CHARS_PER_TOKEN: f64 = 4.0;

/// Pluggable token-count adapter.
pub trait Tokenizer: Send + Sync {
    /// Estimate the token count of `text`.
    fn count(&self, text: &str, config: &DigestConfig) -> u64;
}

/// Default character-ratio estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioTokenizer;

impl Tokenizer for CharRatioTokenizer {
    fn count(&self, text: &str, _config: &DigestConfig) -> u64 {
        (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as u64
    }
}

/// Named tokenizer lookup; absence of a name (or an unknown name) falls
/// back to the character-ratio estimator.
#[derive(Clone, Default)]
pub struct TokenizerRegistry {
    adapters: HashMap<String, Arc<dyn Tokenizer>>,
}

impl TokenizerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named adapter.
    pub fn register(&mut self, name: impl Into<String>, tokenizer: Arc<dyn Tokenizer>) {
        self.adapters.insert(name.into(), tokenizer);
    }

    /// Resolve a named adapter, falling back to [`CharRatioTokenizer`].
    pub fn resolve(&self, name: Option<&str>) -> Arc<dyn Tokenizer> {
        name.and_then(|n| self.adapters.get(n).cloned())
            .unwrap_or_else(|| Arc::new(CharRatioTokenizer))
    }
}

impl std::fmt::Debug for TokenizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizerRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_ratio_estimate() {
        let config = DigestConfig::default();
        assert_eq!(CharRatioTokenizer.count("abcdefgh", &config), 2);
        assert_eq!(CharRatioTokenizer.count("abc", &config), 1);
        assert_eq!(CharRatioTokenizer.count("", &config), 0);
    }

    #[test]
    fn test_registry_fallback() {
        let registry = TokenizerRegistry::new();
        let config = DigestConfig::default();
        let tokenizer = registry.resolve(Some("no-such-adapter"));
        assert_eq!(tokenizer.count("abcd", &config), 1);
    }

    #[test]
    fn test_registry_lookup() {
        struct Fixed;
        impl Tokenizer for Fixed {
            fn count(&self, _text: &str, _config: &DigestConfig) -> u64 {
                42
            }
        }

        let mut registry = TokenizerRegistry::new();
        registry.register("fixed", Arc::new(Fixed));
        let config = DigestConfig::default();
        assert_eq!(registry.resolve(Some("fixed")).count("x", &config), 42);
    }
}
