//! Core types and traits for codedigest.
//!
//! This crate provides the fundamental data structures used throughout the
//! codedigest workspace: content nodes, traversal statistics, digest
//! configuration, error taxonomy, and the boundary contracts (override
//! prompt, progress events) shared by the scan and assembly crates.

mod config;
mod error;
mod node;
mod progress;
mod prompt;
mod result;
mod stats;

pub use config::{
    BinaryPolicy, DigestConfig, DigestConfigBuilder, OutputFormat, RedactionPolicy,
};
pub use error::{CancelReason, DigestError, FileError};
pub use node::{collect_selected_files, forest_contains, posix_rel_path, ContentNode, NodeKind};
pub use progress::ProgressEvent;
pub use prompt::{AutoApprove, DenyAll, OverridePrompt, QuotaUsage};
pub use result::{AppliedLimits, DigestMetadata, DigestResult, OutputFile};
pub use stats::TraversalStats;
