//! Cooperative, quota-bounded directory traversal.
//!
//! The walk is single-threaded and depth-first: directory entries are read
//! in bounded batches with cancellation checks between batches, and progress
//! is emitted through a debounced broadcast channel. Resource quotas
//! (per-file size, cumulative size, file count) follow a two-threshold
//! protocol: crossing 80% consults the override prompt once, and the 100%
//! mark consumes the granted one-shot override or skips.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::SystemTime;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use codedigest_core::{
    forest_contains, posix_rel_path, CancelReason, ContentNode, DigestConfig, DigestError,
    OverridePrompt, ProgressEvent, QuotaUsage, TraversalStats,
};
use codedigest_filter::{resolve_preset, EffectivePatterns, IgnoreMatcher, PresetPatterns};

use crate::progress::ProgressEmitter;

/// Directory entries are processed in batches of this size, with a
/// cancellation check and progress flush between batches.
const BATCH_SIZE: usize = 100;

/// Result of a recursive scan.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Root-level nodes of the scanned tree.
    pub nodes: Vec<ContentNode>,
    /// Frozen statistics for this invocation.
    pub stats: TraversalStats,
}

/// One page of a shallow (single-level) directory listing.
#[derive(Debug)]
pub struct ShallowPage {
    /// Nodes within the requested page, name-sorted.
    pub items: Vec<ContentNode>,
    /// Total surviving entries before pagination.
    pub total: usize,
}

/// One-shot override state for a single quota.
#[derive(Debug, Default)]
struct OneShotOverride {
    /// The 80% threshold was already evaluated.
    checked: bool,
    /// An override was granted and not yet consumed.
    granted: bool,
}

/// Per-invocation traversal state. Never global: two scans in flight each
/// carry their own override flags, matcher cache, and stats.
struct WalkState {
    root: PathBuf,
    ignore: IgnoreMatcher,
    patterns: EffectivePatterns,
    stats: TraversalStats,
    running_total: u64,
    accepted_files: u64,
    size_override: OneShotOverride,
    count_override: OneShotOverride,
    /// Set when the file-count budget is exhausted with no override; the
    /// whole walk unwinds early, returning what was gathered.
    halted: bool,
    emitter: ProgressEmitter,
}

/// Quota-aware recursive traversal engine.
pub struct TraversalEngine {
    config: DigestConfig,
    prompt: std::sync::Arc<dyn OverridePrompt>,
    cancel: CancellationToken,
    progress_tx: broadcast::Sender<ProgressEvent>,
}

impl TraversalEngine {
    /// Create a new engine over an immutable config snapshot.
    pub fn new(config: DigestConfig, prompt: std::sync::Arc<dyn OverridePrompt>) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            prompt,
            cancel: CancellationToken::new(),
            progress_tx,
        }
    }

    /// Attach a caller-controlled cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Subscribe to debounced progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    /// Full recursive walk from the scan root, including the negation
    /// reconciliation pass.
    pub async fn scan_root(&self, root: &Path) -> Result<ScanOutcome, DigestError> {
        let mut state = self.begin(root)?;
        let canonical_root = state.root.clone();
        let mut nodes = self.walk(&mut state, canonical_root, 0).await?;
        self.reconcile_negations(&mut state, &mut nodes).await;
        state.emitter.flush();
        Ok(ScanOutcome {
            nodes,
            stats: state.stats,
        })
    }

    /// Recursive walk rooted at an arbitrary directory, for incremental
    /// consumers. No reconciliation pass.
    pub async fn scan_directory(&self, dir: &Path) -> Result<ScanOutcome, DigestError> {
        let mut state = self.begin(dir)?;
        let canonical_root = state.root.clone();
        let nodes = self.walk(&mut state, canonical_root, 0).await?;
        state.emitter.flush();
        Ok(ScanOutcome {
            nodes,
            stats: state.stats,
        })
    }

    /// Single-level, paginated listing for callers that cannot afford a
    /// recursive walk (e.g. an interactive tree view).
    pub async fn scan_directory_shallow(
        &self,
        dir: &Path,
        offset: usize,
        page_size: usize,
    ) -> Result<ShallowPage, DigestError> {
        let mut state = self.begin(dir)?;
        let root = state.root.clone();
        state.ignore.load_for_directory(&root);

        let mut read_dir = tokio::fs::read_dir(&root)
            .await
            .map_err(|e| DigestError::io(&root, e))?;

        let mut survivors: Vec<(String, PathBuf, bool)> = Vec::new();
        let mut seen = 0usize;
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    state.stats.warn(format!("unreadable entry: {err}"));
                    continue;
                }
            };
            seen += 1;
            if seen % BATCH_SIZE == 0 && self.cancel.is_cancelled() {
                return Err(DigestError::cancelled(CancelReason::Requested));
            }

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let ignored = state.ignore.is_ignored(Path::new(&name), is_dir);
            let keep = if is_dir {
                state.patterns.descend_directory(&name, ignored)
            } else {
                state.patterns.keep_file(&name, ignored)
            };
            if keep {
                survivors.push((name, path, is_dir));
            }
        }
        survivors.sort_by(|a, b| a.0.cmp(&b.0));

        let total = survivors.len();
        let mut items = Vec::new();
        for (name, path, is_dir) in survivors.into_iter().skip(offset).take(page_size) {
            let metadata = match tokio::fs::symlink_metadata(&path).await {
                Ok(m) => m,
                Err(err) => {
                    state.stats.warn(format!("unstatable entry: {name} ({err})"));
                    continue;
                }
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let node = if is_dir {
                ContentNode::new_directory(&path, name, modified, 1)
            } else if metadata.file_type().is_symlink() {
                let target = tokio::fs::read_link(&path)
                    .await
                    .map(|t| t.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ContentNode::new_symlink(&path, name, target, modified, 1)
            } else {
                ContentNode::new_file(&path, name, metadata.len(), modified, 1)
            };
            items.push(node);
        }

        Ok(ShallowPage { items, total })
    }

    /// Validate the root and build per-invocation state.
    fn begin(&self, root: &Path) -> Result<WalkState, DigestError> {
        let root = root
            .canonicalize()
            .map_err(|e| DigestError::io(root, e))?;
        if !root.is_dir() {
            return Err(DigestError::NotADirectory { path: root });
        }

        let mut ignore = IgnoreMatcher::new(&root, &self.config.ignore_file_names);
        // Load the root's own ignore file up front so its explicit
        // negations can steer the directory decision policy.
        ignore.load_for_directory(&root);

        let preset = self
            .config
            .preset
            .as_deref()
            .map(resolve_preset)
            .unwrap_or_else(PresetPatterns::default);
        let patterns = EffectivePatterns::merge(
            &self.config.include_patterns,
            &self.config.exclude_patterns,
            &preset,
            &ignore.explicit_negations(),
        )?;

        Ok(WalkState {
            root,
            ignore,
            patterns,
            stats: TraversalStats::new(),
            running_total: 0,
            accepted_files: 0,
            size_override: OneShotOverride::default(),
            count_override: OneShotOverride::default(),
            halted: false,
            emitter: ProgressEmitter::new(self.progress_tx.clone()),
        })
    }

    /// Depth-first batched walk of one directory.
    fn walk<'a>(
        &'a self,
        state: &'a mut WalkState,
        dir: PathBuf,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContentNode>, DigestError>> + Send + 'a>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(DigestError::cancelled(CancelReason::Requested));
            }
            state.ignore.load_for_directory(&dir);

            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| DigestError::io(&dir, e))?;

            let mut nodes = Vec::new();
            let mut processed = 0usize;
            loop {
                if state.halted {
                    break;
                }
                let entry = match read_dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        state
                            .stats
                            .warn(format!("unreadable entry: {} ({err})", dir.display()));
                        continue;
                    }
                };

                processed += 1;
                if processed % BATCH_SIZE == 0 {
                    if self.cancel.is_cancelled() {
                        return Err(DigestError::cancelled(CancelReason::Requested));
                    }
                    state.emitter.emit(
                        ProgressEvent::new("scan", "walk")
                            .with_message(dir.display().to_string()),
                    );
                }

                self.visit_entry(state, &entry, depth, &mut nodes).await?;
            }

            nodes.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(nodes)
        })
    }

    /// Apply filters, quotas, and node construction to one entry.
    async fn visit_entry(
        &self,
        state: &mut WalkState,
        entry: &tokio::fs::DirEntry,
        depth: u32,
        nodes: &mut Vec<ContentNode>,
    ) -> Result<(), DigestError> {
        let path = entry.path();
        let Some(rel) = posix_rel_path(&state.root, &path) else {
            state
                .stats
                .warn(format!("outside root: {}", path.display()));
            return Ok(());
        };

        let file_type = match entry.file_type().await {
            Ok(t) => t,
            Err(err) => {
                state.stats.warn(format!("unreadable entry: {rel} ({err})"));
                return Ok(());
            }
        };

        if file_type.is_symlink() {
            let ignored = state.ignore.is_ignored(&path, false);
            if !state.patterns.keep_file(&rel, ignored) {
                if ignored {
                    state.stats.skipped_by_ignore += 1;
                }
                return Ok(());
            }
            let metadata = tokio::fs::symlink_metadata(&path).await;
            let modified = metadata
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let target = tokio::fs::read_link(&path)
                .await
                .map(|t| t.to_string_lossy().into_owned())
                .unwrap_or_default();
            state.stats.record_symlink();
            nodes.push(ContentNode::new_symlink(&path, rel, target, modified, depth + 1));
            return Ok(());
        }

        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(err) => {
                state.stats.warn(format!("unstatable entry: {rel} ({err})"));
                return Ok(());
            }
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        if file_type.is_dir() {
            let ignored = state.ignore.is_ignored(&path, true);
            if !state.patterns.descend_directory(&rel, ignored) {
                if ignored {
                    state.stats.skipped_by_ignore += 1;
                }
                return Ok(());
            }

            // Escape guard: compare real paths, not string prefixes.
            match tokio::fs::canonicalize(&path).await {
                Ok(real) if real.starts_with(&state.root) => {}
                Ok(_) => {
                    state.stats.warn(format!("outside root: {rel}"));
                    return Ok(());
                }
                Err(err) => {
                    state.stats.warn(format!("unreadable entry: {rel} ({err})"));
                    return Ok(());
                }
            }

            if depth + 1 > self.config.max_directory_depth {
                state.stats.skipped_by_depth += 1;
                if !state.stats.has_warning("depth limit") {
                    state.stats.warn(format!(
                        "depth limit: not descending below depth {} (first at {rel})",
                        self.config.max_directory_depth
                    ));
                }
                return Ok(());
            }

            state.stats.record_dir();
            let children = self.walk(state, path.clone(), depth + 1).await?;
            if ignored && children.is_empty() {
                state.stats.skipped_by_ignore += 1;
                return Ok(());
            }
            let mut node = ContentNode::new_directory(&path, rel, modified, depth + 1);
            node.children = children;
            nodes.push(node);
            return Ok(());
        }

        // Regular file.
        let ignored = state.ignore.is_ignored(&path, false);
        if !state.patterns.keep_file(&rel, ignored) {
            if ignored {
                state.stats.skipped_by_ignore += 1;
            }
            return Ok(());
        }

        let size = metadata.len();
        if size >= self.config.max_file_size {
            state.stats.skipped_by_size += 1;
            state
                .stats
                .warn(format!("file size limit: skipped {rel} ({size} bytes)"));
            return Ok(());
        }

        if !self.admit_total_size(state, size)? {
            state.stats.skipped_by_total_limit += 1;
            state
                .stats
                .warn(format!("total size limit: skipped {rel} and later files"));
            return Ok(());
        }

        if !self.admit_file_count(state)? {
            state.stats.skipped_by_max_files += 1;
            state.stats.warn(format!(
                "max files limit: file count budget exhausted at {rel}"
            ));
            state.halted = true;
            return Ok(());
        }

        state.running_total += size;
        state.accepted_files += 1;
        state.stats.record_file(size);
        state
            .emitter
            .emit(ProgressEvent::new("scan", "walk").with_message(rel.clone()));
        nodes.push(ContentNode::new_file(&path, rel, size, modified, depth + 1));
        Ok(())
    }

    /// Two-threshold protocol for the cumulative size budget. Returns
    /// whether the file may proceed.
    fn admit_total_size(&self, state: &mut WalkState, size: u64) -> Result<bool, DigestError> {
        let limit = self.config.max_total_size;
        let projected = state.running_total.saturating_add(size);

        if !state.size_override.checked && projected as f64 >= limit as f64 * 0.8 {
            state.size_override.checked = true;
            let usage = QuotaUsage::new(projected, limit, "cumulative size");
            if !self.config.interactive {
                state.size_override.granted = true;
            } else if self.prompt.confirm_size_override(&usage) {
                state.size_override.granted = true;
            } else {
                return Err(DigestError::cancelled(CancelReason::SizeOverrideDeclined));
            }
        }

        if projected >= limit {
            if state.size_override.granted {
                state.size_override.granted = false;
                return Ok(true);
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// Two-threshold protocol for the file count budget. A `false` return
    /// means the budget is globally exhausted and the walk halts.
    fn admit_file_count(&self, state: &mut WalkState) -> Result<bool, DigestError> {
        let limit = self.config.max_files;
        let projected = state.accepted_files + 1;

        if !state.count_override.checked && projected as f64 >= limit as f64 * 0.8 {
            state.count_override.checked = true;
            let usage = QuotaUsage::new(projected, limit, "file count");
            if !self.config.interactive {
                state.count_override.granted = true;
            } else if self.prompt.confirm_file_count_override(&usage) {
                state.count_override.granted = true;
            } else {
                return Err(DigestError::cancelled(
                    CancelReason::FileCountOverrideDeclined,
                ));
            }
        }

        if projected >= limit {
            if state.count_override.granted {
                state.count_override.granted = false;
                return Ok(true);
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// Root-scan-only pass: literal negation patterns whose paths exist on
    /// disk are injected into the tree even when directory-level pruning
    /// caused the main walk to miss them.
    async fn reconcile_negations(&self, state: &mut WalkState, nodes: &mut Vec<ContentNode>) {
        for rel in state.ignore.explicit_negations() {
            if state.patterns.matches_exclude(&rel) && !state.patterns.matches_include(&rel) {
                continue;
            }
            if forest_contains(nodes, &rel) {
                continue;
            }
            let abs = state.root.join(&rel);
            let metadata = match tokio::fs::metadata(&abs).await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            tracing::debug!(path = %rel, "reconciling negated path into tree");
            inject_file(nodes, &state.root, &rel, metadata.len(), modified);
            state.stats.record_file(metadata.len());
        }
    }
}

/// Insert a file at `rel` into the forest, creating intermediate directory
/// nodes as needed and keeping children name-sorted.
fn inject_file(
    nodes: &mut Vec<ContentNode>,
    root: &Path,
    rel: &str,
    size: u64,
    modified: SystemTime,
) {
    let segments: Vec<&str> = rel.split('/').collect();
    let mut current = nodes;
    let mut abs = root.to_path_buf();
    let mut rel_so_far = String::new();

    for (i, segment) in segments.iter().enumerate() {
        abs = abs.join(segment);
        if !rel_so_far.is_empty() {
            rel_so_far.push('/');
        }
        rel_so_far.push_str(segment);
        let depth = (i + 1) as u32;
        let is_last = i + 1 == segments.len();

        let position = current.iter().position(|n| n.name.as_str() == *segment);
        let index = match position {
            Some(index) => index,
            None => {
                let node = if is_last {
                    ContentNode::new_file(&abs, rel_so_far.clone(), size, modified, depth)
                } else {
                    ContentNode::new_directory(&abs, rel_so_far.clone(), modified, depth)
                };
                let index = current
                    .binary_search_by(|n| n.name.as_str().cmp(segment))
                    .unwrap_or_else(|i| i);
                current.insert(index, node);
                index
            }
        };
        if is_last {
            return;
        }
        current = &mut current[index].children;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_file_creates_intermediates() {
        let mut nodes = Vec::new();
        inject_file(
            &mut nodes,
            Path::new("/scan"),
            "dist/keep/file.js",
            42,
            SystemTime::UNIX_EPOCH,
        );

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].rel_path, "dist");
        assert!(nodes[0].is_dir());
        let keep = &nodes[0].children[0];
        assert_eq!(keep.rel_path, "dist/keep");
        let file = &keep.children[0];
        assert_eq!(file.rel_path, "dist/keep/file.js");
        assert_eq!(file.size, 42);
        assert_eq!(file.depth, 3);
    }

    #[test]
    fn test_inject_into_existing_directory_sorted() {
        let mut nodes = vec![ContentNode::new_directory(
            "/scan/dist",
            "dist",
            SystemTime::UNIX_EPOCH,
            1,
        )];
        nodes[0].children.push(ContentNode::new_file(
            "/scan/dist/zz.js",
            "dist/zz.js",
            1,
            SystemTime::UNIX_EPOCH,
            2,
        ));

        inject_file(
            &mut nodes,
            Path::new("/scan"),
            "dist/aa.js",
            7,
            SystemTime::UNIX_EPOCH,
        );

        assert_eq!(nodes.len(), 1);
        let children = &nodes[0].children;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name.as_str(), "aa.js");
        assert_eq!(children[1].name.as_str(), "zz.js");
    }
}
