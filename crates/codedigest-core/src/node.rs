//! Content node types for the scanned tree.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of file system node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (never followed).
    Symlink {
        /// Link target path as recorded on disk.
        target: CompactString,
    },
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }

    /// Check if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        matches!(self, NodeKind::Symlink { .. })
    }
}

/// A single file system entry discovered during traversal.
///
/// `rel_path` is always POSIX-separated and computed against the original
/// scan root, even when the node was produced by a recursive call rooted at
/// a subdirectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentNode {
    /// Absolute path on disk.
    pub path: PathBuf,

    /// Path relative to the scan root, POSIX-separated.
    pub rel_path: String,

    /// Display name (not full path).
    pub name: CompactString,

    /// Node type.
    pub kind: NodeKind,

    /// Size in bytes (0 for directories and symlinks).
    pub size: u64,

    /// Last modification time.
    pub modified: SystemTime,

    /// Depth from the scan root (root children are depth 1).
    pub depth: u32,

    /// Whether this node is selected for assembly.
    pub selected: bool,

    /// Children nodes (directories only), in traversal order.
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    /// Create a new file node.
    pub fn new_file(
        path: impl Into<PathBuf>,
        rel_path: impl Into<String>,
        size: u64,
        modified: SystemTime,
        depth: u32,
    ) -> Self {
        let path = path.into();
        Self {
            name: node_name(&path),
            path,
            rel_path: rel_path.into(),
            kind: NodeKind::File,
            size,
            modified,
            depth,
            selected: true,
            children: Vec::new(),
        }
    }

    /// Create a new directory node.
    pub fn new_directory(
        path: impl Into<PathBuf>,
        rel_path: impl Into<String>,
        modified: SystemTime,
        depth: u32,
    ) -> Self {
        let path = path.into();
        Self {
            name: node_name(&path),
            path,
            rel_path: rel_path.into(),
            kind: NodeKind::Directory,
            size: 0,
            modified,
            depth,
            selected: true,
            children: Vec::new(),
        }
    }

    /// Create a new symlink leaf node.
    pub fn new_symlink(
        path: impl Into<PathBuf>,
        rel_path: impl Into<String>,
        target: impl Into<CompactString>,
        modified: SystemTime,
        depth: u32,
    ) -> Self {
        let path = path.into();
        Self {
            name: node_name(&path),
            path,
            rel_path: rel_path.into(),
            kind: NodeKind::Symlink {
                target: target.into(),
            },
            size: 0,
            modified,
            depth,
            selected: false,
            children: Vec::new(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Collect all selected file nodes in this subtree, depth-first.
    pub fn collect_files<'a>(&'a self, out: &mut Vec<&'a ContentNode>) {
        if self.is_file() && self.selected {
            out.push(self);
        }
        for child in &self.children {
            child.collect_files(out);
        }
    }
}

/// Collect all selected file nodes across a forest of root-level nodes.
pub fn collect_selected_files(nodes: &[ContentNode]) -> Vec<&ContentNode> {
    let mut out = Vec::new();
    for node in nodes {
        node.collect_files(&mut out);
    }
    out
}

/// Check whether a relative path is present anywhere in a node forest.
pub fn forest_contains(nodes: &[ContentNode], rel_path: &str) -> bool {
    nodes.iter().any(|n| {
        n.rel_path == rel_path
            || (n.is_dir() && rel_path.starts_with(&format!("{}/", n.rel_path)))
                && forest_contains(&n.children, rel_path)
    })
}

/// Compute a POSIX-separated path relative to `root`.
///
/// Returns `None` when `path` is not under `root`.
pub fn posix_rel_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn node_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}
