//! Include/exclude pattern merging and the per-entry decision policy.
//!
//! User-supplied glob lists are merged with a named preset into one
//! effective include/exclude set. Negated (`!`-prefixed) entries survive
//! deduplication verbatim, since collapsing them would change matching
//! semantics.

use std::collections::BTreeSet;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use codedigest_core::DigestError;

/// A named, built-in bundle of include/exclude patterns.
#[derive(Debug, Clone, Default)]
pub struct PresetPatterns {
    /// Include globs contributed by the preset.
    pub include: Vec<String>,
    /// Exclude globs contributed by the preset.
    pub exclude: Vec<String>,
}

/// Resolve a named built-in preset.
///
/// Unknown names resolve to empty sets, never an error.
pub fn resolve_preset(name: &str) -> PresetPatterns {
    let (include, exclude): (&[&str], &[&str]) = match name {
        "code-only" => (
            &[
                "**/*.rs", "**/*.py", "**/*.js", "**/*.jsx", "**/*.ts", "**/*.tsx", "**/*.go",
                "**/*.java", "**/*.c", "**/*.h", "**/*.cpp", "**/*.hpp", "**/*.rb", "**/*.php",
                "**/*.swift", "**/*.kt",
            ],
            &[
                "**/node_modules/**",
                "**/target/**",
                "**/dist/**",
                "**/build/**",
                "**/.git/**",
            ],
        ),
        "docs-only" => (
            &["**/*.md", "**/*.rst", "**/*.txt", "**/*.adoc", "**/docs/**"],
            &["**/node_modules/**", "**/.git/**"],
        ),
        "tests-only" => (
            &[
                "**/tests/**",
                "**/test/**",
                "**/*_test.*",
                "**/*.test.*",
                "**/*.spec.*",
                "**/test_*.py",
            ],
            &["**/node_modules/**", "**/.git/**"],
        ),
        "config-only" => (
            &[
                "**/*.toml",
                "**/*.yaml",
                "**/*.yml",
                "**/*.json",
                "**/*.ini",
                "**/*.cfg",
                "**/Dockerfile",
                "**/Makefile",
            ],
            &["**/node_modules/**", "**/.git/**", "**/*.lock"],
        ),
        _ => (&[], &[]),
    };
    PresetPatterns {
        include: include.iter().map(|s| s.to_string()).collect(),
        exclude: exclude.iter().map(|s| s.to_string()).collect(),
    }
}

/// Merged include/exclude sets with compiled matchers.
#[derive(Debug)]
pub struct EffectivePatterns {
    /// Effective include patterns (negations preserved verbatim).
    pub include: BTreeSet<String>,
    /// Effective exclude patterns (negations preserved verbatim).
    pub exclude: BTreeSet<String>,
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    /// Literal prefixes of include patterns and explicit negations, used to
    /// decide whether to descend into an ignored directory.
    interior_targets: Vec<String>,
    /// True when some include pattern could match at any depth.
    floating_targets: bool,
}

impl EffectivePatterns {
    /// Merge user patterns with a preset and the ignore engine's explicit
    /// negations into one effective set.
    pub fn merge(
        user_include: &[String],
        user_exclude: &[String],
        preset: &PresetPatterns,
        explicit_negations: &[String],
    ) -> Result<Self, DigestError> {
        let mut include: BTreeSet<String> = BTreeSet::new();
        let mut exclude: BTreeSet<String> = BTreeSet::new();

        include.extend(preset.include.iter().cloned());
        include.extend(user_include.iter().cloned());
        exclude.extend(preset.exclude.iter().cloned());
        exclude.extend(user_exclude.iter().cloned());

        let include_set = build_globset(include.iter())?;
        let exclude_set = build_globset(exclude.iter())?;

        let mut interior_targets = Vec::new();
        let mut floating_targets = false;
        for pattern in include.iter().map(|p| p.trim_start_matches('!')) {
            if pattern.starts_with("**") || !pattern.contains('/') {
                floating_targets = true;
            } else {
                interior_targets.push(literal_prefix(pattern));
            }
        }
        interior_targets.extend(explicit_negations.iter().cloned());

        Ok(Self {
            include,
            exclude,
            include_set,
            exclude_set,
            interior_targets,
            floating_targets,
        })
    }

    /// Whether any include pattern is configured.
    pub fn has_includes(&self) -> bool {
        self.include_set.is_some()
    }

    /// Test a path against the include set.
    pub fn matches_include(&self, rel: &str) -> bool {
        self.include_set.as_ref().is_some_and(|s| s.is_match(rel))
    }

    /// Test a path against the exclude set.
    pub fn matches_exclude(&self, rel: &str) -> bool {
        self.exclude_set.as_ref().is_some_and(|s| s.is_match(rel))
    }

    /// Decision policy for a file.
    ///
    /// When include patterns are configured, a file is kept only if it
    /// matches one, and an include match beats an exclude match. The
    /// ignore-file verdict applies last either way.
    pub fn keep_file(&self, rel: &str, ignored: bool) -> bool {
        if ignored {
            return false;
        }
        if self.has_includes() {
            self.matches_include(rel)
        } else {
            !self.matches_exclude(rel)
        }
    }

    /// Decision policy for a directory.
    ///
    /// Directories are dropped only on an explicit exclude match. An
    /// ignore-matched directory is still recursed into while a negation or
    /// a deep include could re-surface files beneath it.
    pub fn descend_directory(&self, rel: &str, ignored: bool) -> bool {
        if self.matches_exclude(rel) && !self.matches_include(rel) {
            return false;
        }
        if ignored {
            return self.targets_within(rel);
        }
        true
    }

    /// Whether any include pattern or explicit negation targets a path
    /// inside the given directory. Conservative: patterns that can match at
    /// any depth count as targeting every directory.
    pub fn targets_within(&self, dir_rel: &str) -> bool {
        if self.floating_targets {
            return true;
        }
        let prefix = format!("{dir_rel}/");
        self.interior_targets
            .iter()
            .any(|t| t.starts_with(&prefix) || dir_rel.starts_with(t.trim_end_matches('/')))
    }
}

/// Compile patterns into a single GlobSet; `!`-prefixed entries are carried
/// in the sets for merge fidelity but do not participate in matching.
fn build_globset<'a>(
    patterns: impl Iterator<Item = &'a String>,
) -> Result<Option<GlobSet>, DigestError> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for pattern in patterns.filter(|p| !p.starts_with('!')) {
        for variant in [pattern.clone(), format!("**/{pattern}")] {
            let glob = GlobBuilder::new(&variant)
                .literal_separator(true)
                .build()
                .map_err(|err| DigestError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: err.to_string(),
                })?;
            builder.add(glob);
        }
        any = true;
    }
    if !any {
        return Ok(None);
    }
    builder
        .build()
        .map(Some)
        .map_err(|err| DigestError::InvalidPattern {
            pattern: String::new(),
            message: err.to_string(),
        })
}

/// Literal prefix of a glob pattern, up to the first metacharacter.
fn literal_prefix(pattern: &str) -> String {
    let end = pattern
        .find(['*', '?', '[', '{'])
        .unwrap_or(pattern.len());
    pattern[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(include: &[&str], exclude: &[&str]) -> EffectivePatterns {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        EffectivePatterns::merge(&include, &exclude, &PresetPatterns::default(), &[]).unwrap()
    }

    #[test]
    fn test_unknown_preset_is_empty() {
        let preset = resolve_preset("no-such-preset");
        assert!(preset.include.is_empty());
        assert!(preset.exclude.is_empty());
    }

    #[test]
    fn test_known_presets_nonempty() {
        for name in ["code-only", "docs-only", "tests-only", "config-only"] {
            let preset = resolve_preset(name);
            assert!(!preset.include.is_empty(), "{name} should have includes");
        }
    }

    #[test]
    fn test_negations_survive_merge() {
        let patterns = EffectivePatterns::merge(
            &["src/**".to_string(), "!src/vendored/**".to_string()],
            &[],
            &PresetPatterns::default(),
            &[],
        )
        .unwrap();
        assert!(patterns.include.contains("!src/vendored/**"));
        assert!(patterns.include.contains("src/**"));
    }

    /// Canonical fixture for the include-vs-exclude policy: an include
    /// match beats an exclude match for files.
    #[test]
    fn test_include_wins_over_exclude_for_files() {
        let patterns = merge(&["src/**"], &["src/exclude/**"]);

        assert!(patterns.keep_file("src/a.js", false));
        assert!(patterns.keep_file("src/include/c.js", false));
        // Matches both include and exclude: include wins.
        assert!(patterns.keep_file("src/exclude/b.js", false));
        // Outside the include set entirely.
        assert!(!patterns.keep_file("README.md", false));
    }

    #[test]
    fn test_classic_exclude_without_includes() {
        let patterns = merge(&[], &["src/exclude/**"]);

        assert!(patterns.keep_file("src/a.js", false));
        assert!(!patterns.keep_file("src/exclude/b.js", false));
    }

    #[test]
    fn test_ignore_verdict_applies_last() {
        let patterns = merge(&["src/**"], &[]);
        assert!(!patterns.keep_file("src/a.js", true));
    }

    #[test]
    fn test_directory_excluded_only_on_explicit_match() {
        let patterns = merge(&[], &["node_modules/**", "node_modules"]);
        assert!(!patterns.descend_directory("node_modules", false));
        assert!(patterns.descend_directory("src", false));
    }

    #[test]
    fn test_ignored_directory_recursed_for_deep_include() {
        let patterns = merge(&["dist/keep/**"], &[]);
        assert!(patterns.descend_directory("dist", true));

        let unrelated = merge(&["src/only/**"], &[]);
        assert!(!unrelated.descend_directory("dist", true));
    }

    #[test]
    fn test_ignored_directory_recursed_for_explicit_negation() {
        let patterns = EffectivePatterns::merge(
            &[],
            &[],
            &PresetPatterns::default(),
            &["dist/keep.js".to_string()],
        )
        .unwrap();
        assert!(patterns.descend_directory("dist", true));
    }

    #[test]
    fn test_basename_globs_match_any_depth() {
        let patterns = merge(&["*.md"], &[]);
        assert!(patterns.keep_file("README.md", false));
        assert!(patterns.keep_file("docs/guide/intro.md", false));
        // Floating pattern forces conservative descent everywhere.
        assert!(patterns.descend_directory("anything", true));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let result = EffectivePatterns::merge(
            &["src/[".to_string()],
            &[],
            &PresetPatterns::default(),
            &[],
        );
        assert!(result.is_err());
    }
}
