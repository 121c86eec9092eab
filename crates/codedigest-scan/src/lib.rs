//! Directory traversal engine for codedigest.
//!
//! The walk is single-threaded and cooperative: batched directory reads
//! with explicit yield points between batches, used for cancellation checks
//! and debounced progress emission. Recursion is depth-first; no two
//! directories are walked in parallel.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use codedigest_core::{AutoApprove, DigestConfig};
//! use codedigest_scan::TraversalEngine;
//!
//! # async fn demo() -> Result<(), codedigest_core::DigestError> {
//! let engine = TraversalEngine::new(DigestConfig::default(), Arc::new(AutoApprove));
//! let outcome = engine.scan_root(std::path::Path::new("/path/to/scan")).await?;
//! println!("{} files accepted", outcome.stats.total_files);
//! # Ok(())
//! # }
//! ```

mod progress;
mod traversal;

pub use progress::{ProgressEmitter, PROGRESS_INTERVAL};
pub use traversal::{ScanOutcome, ShallowPage, TraversalEngine};

// Re-export core types for convenience
pub use codedigest_core::{
    CancelReason, ContentNode, DigestConfig, DigestError, NodeKind, ProgressEvent, TraversalStats,
};
