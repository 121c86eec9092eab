//! Ignore-file and include/exclude pattern engine for codedigest.
//!
//! Two services live here:
//!
//! - [`IgnoreMatcher`] reproduces gitignore-style hierarchical, negatable,
//!   anchored pattern matching, cached per declaring directory.
//! - [`EffectivePatterns`] merges user include/exclude globs with a named
//!   [`resolve_preset`] bundle and applies the per-entry decision policy.
//!
//! Both are consumed by the traversal engine; neither performs I/O beyond
//! reading ignore files on first load.

mod ignore;
mod patterns;

pub use ignore::{CompiledPattern, IgnoreMatcher};
pub use patterns::{resolve_preset, EffectivePatterns, PresetPatterns};
