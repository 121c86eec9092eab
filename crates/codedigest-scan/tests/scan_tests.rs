//! Integration tests for the traversal engine.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use codedigest_core::{
    collect_selected_files, AutoApprove, DenyAll, DigestConfig, DigestError, NodeKind,
};
use codedigest_scan::TraversalEngine;

fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir(root.join("src")).unwrap();
    fs::create_dir(root.join("docs")).unwrap();
    fs::create_dir(root.join("src/nested")).unwrap();

    fs::write(root.join("README.md"), "# readme").unwrap();
    fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn lib() {}").unwrap();
    fs::write(root.join("src/nested/deep.rs"), "mod deep;").unwrap();
    fs::write(root.join("docs/guide.md"), "guide").unwrap();

    temp
}

fn engine(config: DigestConfig) -> TraversalEngine {
    TraversalEngine::new(config, Arc::new(AutoApprove))
}

#[tokio::test]
async fn test_basic_scan() {
    let temp = create_test_tree();
    let outcome = engine(DigestConfig::default())
        .scan_root(temp.path())
        .await
        .unwrap();

    assert_eq!(outcome.stats.total_files, 5);
    assert_eq!(outcome.stats.directories, 3);
    let files = collect_selected_files(&outcome.nodes);
    assert_eq!(files.len(), 5);
    // rel_path is POSIX and computed against the original root.
    assert!(files.iter().any(|f| f.rel_path == "src/nested/deep.rs"));
}

#[tokio::test]
async fn test_children_sorted_by_name() {
    let temp = create_test_tree();
    let outcome = engine(DigestConfig::default())
        .scan_root(temp.path())
        .await
        .unwrap();

    let names: Vec<&str> = outcome.nodes.iter().map(|n| n.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[tokio::test]
async fn test_gitignore_respected() {
    let temp = create_test_tree();
    fs::write(temp.path().join(".gitignore"), "*.md\n").unwrap();

    let outcome = engine(DigestConfig::default())
        .scan_root(temp.path())
        .await
        .unwrap();

    let files = collect_selected_files(&outcome.nodes);
    assert!(files.iter().all(|f| !f.rel_path.ends_with(".md")));
    assert!(outcome.stats.skipped_by_ignore >= 2);
}

#[tokio::test]
async fn test_negation_resurfaces_file_in_ignored_directory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("dist")).unwrap();
    fs::write(root.join("dist/bundle.js"), "bundle").unwrap();
    fs::write(root.join("dist/keep.js"), "keep me").unwrap();
    fs::write(root.join(".gitignore"), "dist/\n!dist/keep.js\n").unwrap();

    let outcome = engine(DigestConfig::default())
        .scan_root(root)
        .await
        .unwrap();

    let files = collect_selected_files(&outcome.nodes);
    let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
    assert!(rels.contains(&"dist/keep.js"));
    assert!(!rels.contains(&"dist/bundle.js"));
}

#[tokio::test]
async fn test_reconciliation_injects_past_directory_prune() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("dist")).unwrap();
    fs::write(root.join("dist/keep.js"), "keep me").unwrap();
    fs::write(root.join("dist/other.js"), "other").unwrap();
    fs::write(root.join(".gitignore"), "!dist/keep.js\n").unwrap();

    // The user exclude prunes the directory outright; only the
    // reconciliation pass can resurface the negated file.
    let config = DigestConfig::builder()
        .exclude_patterns(vec!["dist".to_string(), "dist/**".to_string()])
        .build()
        .unwrap();
    let outcome = engine(config).scan_root(root).await.unwrap();

    let files = collect_selected_files(&outcome.nodes);
    let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
    assert!(!rels.contains(&"dist/other.js"));
    // `dist/**` positively excludes the file, so it must NOT come back.
    assert!(!rels.contains(&"dist/keep.js"));

    // Without a positive exclude on the file itself, it is injected.
    let config = DigestConfig::builder()
        .exclude_patterns(vec!["dist".to_string()])
        .build()
        .unwrap();
    let outcome = engine(config).scan_root(root).await.unwrap();
    let files = collect_selected_files(&outcome.nodes);
    let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
    assert!(rels.contains(&"dist/keep.js"));
    assert!(!rels.contains(&"dist/other.js"));
}

#[tokio::test]
async fn test_max_files_quota_is_deterministic() {
    let temp = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(temp.path().join(name), "data").unwrap();
    }

    let config = DigestConfig::builder().max_files(1u64).build().unwrap();
    let outcome = engine(config).scan_root(temp.path()).await.unwrap();

    assert_eq!(outcome.stats.total_files, 1);
    assert!(outcome.stats.skipped_by_max_files >= 1);
    let warnings = outcome.stats.warnings().join("\n").to_lowercase();
    assert!(warnings.contains("file count") || warnings.contains("max files"));
}

#[tokio::test]
async fn test_per_file_size_limit() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("small.txt"), "ok").unwrap();
    fs::write(temp.path().join("big.txt"), vec![b'x'; 4096]).unwrap();

    let config = DigestConfig::builder()
        .max_file_size(1024u64)
        .build()
        .unwrap();
    let outcome = engine(config).scan_root(temp.path()).await.unwrap();

    assert_eq!(outcome.stats.total_files, 1);
    assert_eq!(outcome.stats.skipped_by_size, 1);
    assert!(outcome
        .stats
        .warnings()
        .iter()
        .any(|w| w.starts_with("file size limit")));
}

#[tokio::test]
async fn test_oversize_warnings_collapse() {
    let temp = TempDir::new().unwrap();
    for i in 0..20 {
        fs::write(temp.path().join(format!("big{i}.bin")), vec![b'x'; 2048]).unwrap();
    }

    let config = DigestConfig::builder()
        .max_file_size(1024u64)
        .build()
        .unwrap();
    let outcome = engine(config).scan_root(temp.path()).await.unwrap();

    assert_eq!(outcome.stats.skipped_by_size, 20);
    let size_warnings: Vec<_> = outcome
        .stats
        .warnings()
        .into_iter()
        .filter(|w| w.starts_with("file size limit"))
        .collect();
    assert_eq!(size_warnings.len(), 1);
}

#[tokio::test]
async fn test_declined_override_cancels_scan() {
    let temp = TempDir::new().unwrap();
    for i in 0..10 {
        fs::write(temp.path().join(format!("f{i}.txt")), "data").unwrap();
    }

    let config = DigestConfig::builder()
        .max_files(5u64)
        .interactive(true)
        .build()
        .unwrap();
    let engine = TraversalEngine::new(config, Arc::new(DenyAll));
    let err = engine.scan_root(temp.path()).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_cancellation_token() {
    let temp = create_test_tree();
    let token = CancellationToken::new();
    token.cancel();

    let engine = TraversalEngine::new(DigestConfig::default(), Arc::new(AutoApprove))
        .with_cancellation(token);
    let err = engine.scan_root(temp.path()).await.unwrap_err();
    assert!(matches!(err, DigestError::Cancelled { .. }));
}

#[tokio::test]
async fn test_depth_limit() {
    let temp = TempDir::new().unwrap();
    let mut dir = temp.path().to_path_buf();
    for i in 0..5 {
        dir = dir.join(format!("level{i}"));
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("file.txt"), "x").unwrap();
    }

    let config = DigestConfig::builder()
        .max_directory_depth(2u32)
        .build()
        .unwrap();
    let outcome = engine(config).scan_root(temp.path()).await.unwrap();

    assert!(outcome.stats.skipped_by_depth >= 1);
    let depth_warnings: Vec<_> = outcome
        .stats
        .warnings()
        .into_iter()
        .filter(|w| w.starts_with("depth limit"))
        .collect();
    assert_eq!(depth_warnings.len(), 1);
    // Only files at depth <= 2 survive.
    assert_eq!(outcome.stats.total_files, 2);
}

#[tokio::test]
async fn test_include_patterns_select_files() {
    let temp = create_test_tree();
    let config = DigestConfig::builder()
        .include_patterns(vec!["src/**".to_string()])
        .build()
        .unwrap();
    let outcome = engine(config).scan_root(temp.path()).await.unwrap();

    let files = collect_selected_files(&outcome.nodes);
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f.rel_path.starts_with("src/")));
}

#[tokio::test]
async fn test_shallow_listing_paginates() {
    let temp = TempDir::new().unwrap();
    for i in 0..10 {
        fs::write(temp.path().join(format!("f{i:02}.txt")), "x").unwrap();
    }

    let eng = engine(DigestConfig::default());
    let page = eng
        .scan_directory_shallow(temp.path(), 0, 4)
        .await
        .unwrap();
    assert_eq!(page.total, 10);
    assert_eq!(page.items.len(), 4);
    assert_eq!(page.items[0].name.as_str(), "f00.txt");

    let page = eng
        .scan_directory_shallow(temp.path(), 8, 4)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].name.as_str(), "f08.txt");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinks_recorded_not_followed() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("real")).unwrap();
    fs::write(root.join("real/data.txt"), "data").unwrap();
    std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

    let outcome = engine(DigestConfig::default()).scan_root(root).await.unwrap();

    assert_eq!(outcome.stats.symlinks, 1);
    // The symlinked directory's contents appear exactly once.
    assert_eq!(outcome.stats.total_files, 1);
    let link = outcome
        .nodes
        .iter()
        .find(|n| n.name.as_str() == "link")
        .unwrap();
    assert!(matches!(link.kind, NodeKind::Symlink { .. }));
    assert!(link.children.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinks_honor_exclude_patterns() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("data.txt"), "data").unwrap();
    std::os::unix::fs::symlink(root.join("data.txt"), root.join("alias.txt")).unwrap();

    let config = DigestConfig::builder()
        .exclude_patterns(vec!["alias.txt".to_string()])
        .build()
        .unwrap();
    let outcome = engine(config).scan_root(root).await.unwrap();

    assert_eq!(outcome.stats.symlinks, 0);
    assert!(!outcome.nodes.iter().any(|n| n.name.as_str() == "alias.txt"));
    assert_eq!(collect_selected_files(&outcome.nodes).len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escape_guard() {
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("secret.txt"), "secret").unwrap();

    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("inside.txt"), "ok").unwrap();
    std::os::unix::fs::symlink(outside.path(), temp.path().join("escape")).unwrap();

    let outcome = engine(DigestConfig::default())
        .scan_root(temp.path())
        .await
        .unwrap();

    // The escape is recorded as a symlink leaf; nothing outside the root
    // enters the tree.
    let files = collect_selected_files(&outcome.nodes);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].rel_path, "inside.txt");
}

#[tokio::test]
async fn test_scan_directory_rooted_at_subdir() {
    let temp = create_test_tree();
    let outcome = engine(DigestConfig::default())
        .scan_directory(&temp.path().join("src"))
        .await
        .unwrap();

    let files = collect_selected_files(&outcome.nodes);
    assert_eq!(files.len(), 3);
    // rel paths are relative to the directory the scan was rooted at.
    assert!(files.iter().any(|f| f.rel_path == "nested/deep.rs"));
}

#[tokio::test]
async fn test_missing_root_is_error() {
    let err = engine(DigestConfig::default())
        .scan_root(Path::new("/definitely/not/here"))
        .await
        .unwrap_err();
    assert!(matches!(err, DigestError::NotFound { .. } | DigestError::Io { .. }));
}
