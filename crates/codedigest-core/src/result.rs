//! Digest result types produced by the assembly pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OutputFormat;
use crate::error::FileError;
use crate::stats::TraversalStats;

/// Per-file projection used by the JSON format and for content rebuilds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFile {
    /// Relative path of the file.
    pub path: String,
    /// Rendered header for the file chunk.
    pub header: String,
    /// Rendered body for the file chunk.
    pub body: String,
    /// Extracted dependency references.
    pub imports: Vec<String>,
}

/// Snapshot of the quotas that applied to an invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedLimits {
    pub max_file_size: u64,
    pub max_total_size: u64,
    pub max_files: u64,
    pub max_directory_depth: u32,
    pub max_tokens: Option<u64>,
}

/// Structured metadata attached to a digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestMetadata {
    /// Output format used.
    pub format: OutputFormat,
    /// Quotas in effect.
    pub limits: AppliedLimits,
    /// Traversal statistics, when a traversal fed this digest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TraversalStats>,
    /// Whether the redaction pass ran to completion.
    pub redaction_applied: bool,
    /// When the digest was generated.
    pub generated_at: DateTime<Utc>,
}

/// Output of the assembly pipeline.
///
/// `content` is the single source of truth for what gets written to a sink;
/// `chunks` and `files` are projections that any post-processing step (e.g.
/// redaction) must keep consistent by rebuilding `content` from the latest
/// `files`, never the other way around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestResult {
    /// Human-readable summary text.
    pub summary: String,
    /// Rendered ASCII tree ("" when not requested).
    pub tree: String,
    /// Final assembled artifact.
    pub content: String,
    /// Ordered per-file chunks (header + body).
    pub chunks: Vec<String>,
    /// Ordered per-file projections.
    pub files: Vec<OutputFile>,
    /// Deduplicated warnings.
    pub warnings: Vec<String>,
    /// Estimated token count of `content`.
    pub token_estimate: u64,
    /// Deduplicated per-file errors.
    pub errors: Vec<FileError>,
    /// Structured metadata.
    pub metadata: DigestMetadata,
}

impl DigestResult {
    /// Check whether any per-file errors were recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_round_trips_through_json() {
        let result = DigestResult {
            summary: "2 files".into(),
            tree: String::new(),
            content: "abc".into(),
            chunks: vec!["abc".into()],
            files: vec![OutputFile {
                path: "a.rs".into(),
                header: "## a.rs".into(),
                body: "abc".into(),
                imports: vec![],
            }],
            warnings: vec![],
            token_estimate: 1,
            errors: vec![],
            metadata: DigestMetadata {
                format: OutputFormat::Markdown,
                limits: AppliedLimits {
                    max_file_size: 1,
                    max_total_size: 1,
                    max_files: 1,
                    max_directory_depth: 1,
                    max_tokens: None,
                },
                stats: None,
                redaction_applied: true,
                generated_at: Utc::now(),
            },
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: DigestResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.files.len(), 1);
        assert_eq!(back.content, "abc");
    }
}
