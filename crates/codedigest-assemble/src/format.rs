//! Output formatters.
//!
//! Each formatter renders a per-file header/body pair and finalizes the
//! assembled artifact. Markdown and text concatenate chunks with the
//! configured separator; JSON serializes a canonical object instead.

use codedigest_core::{ContentNode, DigestConfig, DigestError, OutputFile, OutputFormat};
use serde::Serialize;

/// Inputs to [`Formatter::finalize`].
#[derive(Debug)]
pub struct FinalizeInput<'a> {
    /// Summary block text.
    pub summary: &'a str,
    /// Rendered ASCII tree ("" when not requested).
    pub tree: &'a str,
    /// Ordered per-file chunks.
    pub chunks: &'a [String],
    /// Ordered per-file projections.
    pub files: &'a [OutputFile],
    /// Deduplicated warnings.
    pub warnings: &'a [String],
}

/// A pluggable output format renderer.
pub trait Formatter: Send + Sync {
    /// Render the header line(s) for one file.
    fn render_header(&self, node: &ContentNode) -> String;

    /// Render the body for one file from its text content.
    fn render_body(&self, node: &ContentNode, content: &str) -> String;

    /// Assemble the final artifact from ordered parts.
    fn finalize(&self, input: &FinalizeInput<'_>, config: &DigestConfig)
        -> Result<String, DigestError>;
}

/// Resolve the formatter for an output format.
pub fn formatter_for(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Join chunks with the configured separator, prepending the summary and
/// tree blocks when requested.
fn concat_textual(input: &FinalizeInput<'_>, config: &DigestConfig) -> String {
    let mut leading = Vec::new();
    if config.include_summary && !input.summary.is_empty() {
        leading.push(input.summary.to_string());
    }
    if config.include_tree && !input.tree.is_empty() {
        leading.push(input.tree.to_string());
    }
    let mut parts = leading;
    parts.extend(input.chunks.iter().cloned());
    parts.join(&config.chunk_separator)
}

/// Markdown with fenced code blocks.
pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn render_header(&self, node: &ContentNode) -> String {
        format!("## {}\n", node.rel_path)
    }

    fn render_body(&self, node: &ContentNode, content: &str) -> String {
        let lang = fence_language(&node.rel_path);
        // A body containing a triple-backtick fence needs a longer outer fence.
        let fence = if content.contains("```") { "````" } else { "```" };
        let newline = if content.ends_with('\n') { "" } else { "\n" };
        format!("{fence}{lang}\n{content}{newline}{fence}\n")
    }

    fn finalize(
        &self,
        input: &FinalizeInput<'_>,
        config: &DigestConfig,
    ) -> Result<String, DigestError> {
        Ok(concat_textual(input, config))
    }
}

/// Plain text with banner headers.
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn render_header(&self, node: &ContentNode) -> String {
        format!(
            "================================================\nFILE: {}\n================================================\n",
            node.rel_path
        )
    }

    fn render_body(&self, node: &ContentNode, content: &str) -> String {
        let _ = node;
        if content.ends_with('\n') {
            content.to_string()
        } else {
            format!("{content}\n")
        }
    }

    fn finalize(
        &self,
        input: &FinalizeInput<'_>,
        config: &DigestConfig,
    ) -> Result<String, DigestError> {
        Ok(concat_textual(input, config))
    }
}

/// Canonical JSON object.
pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonDigest<'a> {
    summary: &'a str,
    tree: &'a str,
    files: &'a [OutputFile],
    warnings: &'a [String],
}

impl Formatter for JsonFormatter {
    fn render_header(&self, node: &ContentNode) -> String {
        node.rel_path.clone()
    }

    fn render_body(&self, node: &ContentNode, content: &str) -> String {
        let _ = node;
        content.to_string()
    }

    fn finalize(
        &self,
        input: &FinalizeInput<'_>,
        _config: &DigestConfig,
    ) -> Result<String, DigestError> {
        let digest = JsonDigest {
            summary: input.summary,
            tree: input.tree,
            files: input.files,
            warnings: input.warnings,
        };
        Ok(serde_json::to_string_pretty(&digest)?)
    }
}

/// Map a file extension onto a markdown fence language token.
fn fence_language(rel_path: &str) -> &'static str {
    let ext = rel_path
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" => "cpp",
        "sh" | "bash" => "bash",
        "rb" => "ruby",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "md" => "markdown",
        "html" => "html",
        "css" => "css",
        "sql" => "sql",
        _ => "",
    }
}
