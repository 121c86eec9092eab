//! Concurrent digest assembly for codedigest.
//!
//! Turns a scanned node forest into a single digest artifact: per-file
//! tasks run through a bounded worker pool, output formatters render the
//! chunks, and a post-assembly redaction pass scrubs secret-shaped strings.

pub mod format;
pub mod handlers;
pub mod imports;
pub mod pipeline;
pub mod redact;
pub mod tokens;
pub mod tree;

pub use format::{formatter_for, FinalizeInput, Formatter, JsonFormatter, MarkdownFormatter, TextFormatter};
pub use handlers::{ContentHandler, HandlerRegistry};
pub use imports::{DependencyParser, ImportExtractor, RegexImportScanner};
pub use pipeline::AssemblyPipeline;
pub use redact::{Redactor, PLACEHOLDER};
pub use tokens::{CharRatioTokenizer, Tokenizer, TokenizerRegistry};
pub use tree::render_tree;
