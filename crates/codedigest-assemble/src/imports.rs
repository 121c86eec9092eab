//! Dependency reference extraction.
//!
//! Two polymorphic tiers: an optional structured parser capability and an
//! always-available regex scanner. The extractor consults the primary
//! first; a `None` return (capability unavailable or unparseable input)
//! falls through to the regex tier.

use std::sync::Arc;

use regex::Regex;

/// Structured dependency parser capability.
pub trait DependencyParser: Send + Sync {
    /// Parse dependency references; `None` defers to the fallback tier.
    fn parse(&self, rel_path: &str, content: &str) -> Option<Vec<String>>;
}

/// Regex-based import scanner covering common languages.
#[derive(Debug)]
pub struct RegexImportScanner {
    rules: Vec<(&'static [&'static str], Regex)>,
}

impl RegexImportScanner {
    /// Build the scanner with its per-language rules.
    pub fn new() -> Self {
        let rules: Vec<(&'static [&'static str], &str)> = vec![
            (&["rs"], r"(?m)^\s*(?:pub\s+)?use\s+([A-Za-z_][\w:]*)"),
            (&["py"], r"(?m)^\s*(?:from\s+([\w.]+)\s+import|import\s+([\w.]+))"),
            (
                &["js", "jsx", "ts", "tsx", "mjs"],
                r#"(?m)(?:import\s+(?:[\w{},*\s]+\s+from\s+)?|require\()\s*['"]([^'"]+)['"]"#,
            ),
            (&["go"], r#"(?m)^\s*(?:import\s+)?(?:[\w.]+\s+)?"([\w./-]+)"$"#),
            (&["java", "kt"], r"(?m)^\s*import\s+(?:static\s+)?([\w.]+)"),
            (&["c", "h", "cpp", "hpp"], r#"(?m)^\s*#include\s+[<"]([^>"]+)[>"]"#),
        ];
        let rules = rules
            .into_iter()
            .filter_map(|(exts, pattern)| Regex::new(pattern).ok().map(|re| (exts, re)))
            .collect();
        Self { rules }
    }

    /// Scan content for import-like references based on the file extension.
    pub fn scan(&self, rel_path: &str, content: &str) -> Vec<String> {
        let ext = rel_path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        let mut out = Vec::new();
        for (exts, regex) in &self.rules {
            if !exts.contains(&ext.as_str()) {
                continue;
            }
            for captures in regex.captures_iter(content) {
                let reference = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .next()
                    .map(|m| m.as_str().to_string());
                if let Some(reference) = reference {
                    if !out.contains(&reference) {
                        out.push(reference);
                    }
                }
            }
        }
        out
    }
}

impl Default for RegexImportScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-tier extractor: structured parser first, regex fallback always.
pub struct ImportExtractor {
    primary: Option<Arc<dyn DependencyParser>>,
    fallback: RegexImportScanner,
}

impl ImportExtractor {
    /// Create an extractor with only the regex tier.
    pub fn new() -> Self {
        Self {
            primary: None,
            fallback: RegexImportScanner::new(),
        }
    }

    /// Attach a structured parser capability.
    pub fn with_parser(mut self, parser: Arc<dyn DependencyParser>) -> Self {
        self.primary = Some(parser);
        self
    }

    /// Extract dependency references for a file.
    pub fn extract(&self, rel_path: &str, content: &str) -> Vec<String> {
        if let Some(parser) = &self.primary {
            if let Some(imports) = parser.parse(rel_path, content) {
                return imports;
            }
        }
        self.fallback.scan(rel_path, content)
    }
}

impl Default for ImportExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImportExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportExtractor")
            .field("has_primary", &self.primary.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_use_statements() {
        let scanner = RegexImportScanner::new();
        let imports = scanner.scan(
            "src/lib.rs",
            "use std::collections::HashMap;\npub use crate::node::Node;\n",
        );
        assert_eq!(imports, vec!["std::collections::HashMap", "crate::node::Node"]);
    }

    #[test]
    fn test_python_imports() {
        let scanner = RegexImportScanner::new();
        let imports = scanner.scan("app.py", "import os\nfrom pathlib import Path\n");
        assert!(imports.contains(&"os".to_string()));
        assert!(imports.contains(&"pathlib".to_string()));
    }

    #[test]
    fn test_js_imports_and_require() {
        let scanner = RegexImportScanner::new();
        let imports = scanner.scan(
            "index.js",
            "import fs from 'fs';\nconst x = require(\"./local\");\n",
        );
        assert!(imports.contains(&"fs".to_string()));
        assert!(imports.contains(&"./local".to_string()));
    }

    #[test]
    fn test_unknown_extension_is_empty() {
        let scanner = RegexImportScanner::new();
        assert!(scanner.scan("notes.txt", "import nothing").is_empty());
    }

    #[test]
    fn test_primary_parser_wins() {
        struct Always;
        impl DependencyParser for Always {
            fn parse(&self, _rel_path: &str, _content: &str) -> Option<Vec<String>> {
                Some(vec!["structured".to_string()])
            }
        }

        let extractor = ImportExtractor::new().with_parser(Arc::new(Always));
        assert_eq!(extractor.extract("a.rs", "use x;"), vec!["structured"]);
    }

    #[test]
    fn test_primary_defers_to_fallback() {
        struct Never;
        impl DependencyParser for Never {
            fn parse(&self, _rel_path: &str, _content: &str) -> Option<Vec<String>> {
                None
            }
        }

        let extractor = ImportExtractor::new().with_parser(Arc::new(Never));
        assert_eq!(extractor.extract("a.rs", "use x;"), vec!["x"]);
    }
}
