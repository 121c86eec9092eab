//! Traversal statistics and warning accumulation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Accumulator for one traversal invocation.
///
/// Warnings are deduplicated by a stable key (the first segment before `:`)
/// so a thousand entries failing for the same cause collapse into one line
/// while the first-occurrence detail is preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalStats {
    /// Number of files accepted into the tree.
    pub total_files: u64,
    /// Total size in bytes of accepted files.
    pub total_size: u64,
    /// Files skipped for exceeding the per-file size limit.
    pub skipped_by_size: u64,
    /// Files skipped for exceeding the cumulative size limit.
    pub skipped_by_total_limit: u64,
    /// Files skipped for exceeding the file count limit.
    pub skipped_by_max_files: u64,
    /// Directories not descended for exceeding the depth limit.
    pub skipped_by_depth: u64,
    /// Entries skipped by ignore-file rules.
    pub skipped_by_ignore: u64,
    /// Number of directories visited.
    pub directories: u64,
    /// Number of symlinks recorded.
    pub symlinks: u64,

    /// Deduplicated warnings, keyed by first `:`-segment.
    #[serde(default)]
    warnings: IndexMap<String, String>,
}

impl TraversalStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted file.
    pub fn record_file(&mut self, size: u64) {
        self.total_files += 1;
        self.total_size += size;
    }

    /// Record a visited directory.
    pub fn record_dir(&mut self) {
        self.directories += 1;
    }

    /// Record a symlink leaf.
    pub fn record_symlink(&mut self) {
        self.symlinks += 1;
    }

    /// Add a warning, collapsing repeats of the same cause.
    ///
    /// The cause key is the message text before the first `:`; the first
    /// message seen for a key wins.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        let key = message
            .split(':')
            .next()
            .unwrap_or(message.as_str())
            .trim()
            .to_string();
        self.warnings.entry(key).or_insert(message);
    }

    /// Check whether a warning with the given cause key was already recorded.
    pub fn has_warning(&self, key: &str) -> bool {
        self.warnings.contains_key(key)
    }

    /// Deduplicated warnings, in first-occurrence order.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.values().cloned().collect()
    }
}
