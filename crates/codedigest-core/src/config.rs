//! Digest configuration types.
//!
//! A [`DigestConfig`] is an immutable snapshot for one invocation; traversal
//! and assembly never mutate it, and runtime override state lives in
//! per-invocation structs instead.

use std::str::FromStr;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Output format for the assembled digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown with fenced code blocks.
    #[default]
    Markdown,
    /// Plain text with banner headers.
    Text,
    /// Canonical JSON object.
    Json,
}

impl OutputFormat {
    /// Whether chunks are concatenated into human-readable output.
    pub fn is_textual(&self) -> bool {
        !matches!(self, OutputFormat::Json)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "text" | "txt" | "plain" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// How binary file content is handled during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryPolicy {
    /// Replace the body with a placeholder note.
    #[default]
    Skip,
    /// Base64-encode the raw bytes into the body.
    Base64,
}

/// Secret-redaction settings for the post-assembly pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionPolicy {
    /// Skip the entire redaction pass for this invocation.
    #[serde(default)]
    pub show_redacted: bool,
    /// Additional caller-supplied regex patterns.
    #[serde(default)]
    pub custom_patterns: Vec<String>,
}

/// Configuration for one digest invocation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct DigestConfig {
    /// Maximum size for a single file, in bytes.
    #[builder(default = "10 * 1024 * 1024")]
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Cumulative size budget for accepted files, in bytes.
    #[builder(default = "500 * 1024 * 1024")]
    #[serde(default = "default_max_total_size")]
    pub max_total_size: u64,

    /// Maximum number of accepted files.
    #[builder(default = "10_000")]
    #[serde(default = "default_max_files")]
    pub max_files: u64,

    /// Maximum directory depth to recurse into.
    #[builder(default = "20")]
    #[serde(default = "default_max_depth")]
    pub max_directory_depth: u32,

    /// Soft token budget for the assembled output (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_tokens: Option<u64>,

    /// Named tokenizer adapter; None uses the character-ratio estimator.
    #[builder(default)]
    #[serde(default)]
    pub tokenizer: Option<String>,

    /// Output format.
    #[builder(default)]
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Separator between file chunks in textual formats.
    #[builder(default = "default_separator()")]
    #[serde(default = "default_separator")]
    pub chunk_separator: String,

    /// Prepend the summary block to textual output.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_summary: bool,

    /// Prepend the rendered ASCII tree to textual output.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_tree: bool,

    /// Binary file handling.
    #[builder(default)]
    #[serde(default)]
    pub binary_policy: BinaryPolicy,

    /// Secret redaction settings.
    #[builder(default)]
    #[serde(default)]
    pub redaction: RedactionPolicy,

    /// User include glob patterns.
    #[builder(default)]
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// User exclude glob patterns.
    #[builder(default)]
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Named built-in preset to merge with the user patterns.
    #[builder(default)]
    #[serde(default)]
    pub preset: Option<String>,

    /// Ignore file names consulted per directory, in priority order.
    #[builder(default = "default_ignore_files()")]
    #[serde(default = "default_ignore_files")]
    pub ignore_file_names: Vec<String>,

    /// Worker pool width for assembly.
    #[builder(default = "8")]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whether threshold crossings consult the override prompt.
    ///
    /// Non-interactive invocations auto-grant one-shot overrides instead.
    #[builder(default = "false")]
    #[serde(default)]
    pub interactive: bool,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_total_size() -> u64 {
    500 * 1024 * 1024
}

fn default_max_files() -> u64 {
    10_000
}

fn default_max_depth() -> u32 {
    20
}

fn default_separator() -> String {
    "\n".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ignore_files() -> Vec<String> {
    vec![".gitignore".to_string(), ".digestignore".to_string()]
}

fn default_concurrency() -> usize {
    8
}

impl DigestConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.concurrency {
            return Err("concurrency must be at least 1".to_string());
        }
        if let Some(0) = self.max_files {
            return Err("max_files must be at least 1".to_string());
        }
        Ok(())
    }
}

impl DigestConfig {
    /// Create a new config builder.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder::default()
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        DigestConfigBuilder::default()
            .build()
            .expect("default config is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DigestConfig::default();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.output_format, OutputFormat::Markdown);
        assert!(config.include_tree);
        assert!(!config.interactive);
    }

    #[test]
    fn test_config_builder() {
        let config = DigestConfig::builder()
            .max_files(5u64)
            .output_format(OutputFormat::Json)
            .include_patterns(vec!["src/**".to_string()])
            .build()
            .unwrap();
        assert_eq!(config.max_files, 5);
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = DigestConfig::builder().concurrency(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
