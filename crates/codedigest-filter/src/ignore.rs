//! Gitignore-style hierarchical ignore matching.
//!
//! Each directory may declare an ignore file; its patterns are compiled once
//! and cached keyed by the declaring directory. A candidate path is judged
//! by every matcher whose directory is an ancestor of (or equal to) it,
//! ordered shallowest first, and the last matching rule wins, including
//! negations undoing an earlier ignore.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use codedigest_core::posix_rel_path;

/// One ignore-file line compiled into a matcher.
#[derive(Debug)]
pub struct CompiledPattern {
    /// Original line text.
    pub raw: String,
    /// Leading `!` was present.
    pub negated: bool,
    /// Leading `/` was present: match starts at the declaring directory.
    pub anchored: bool,
    /// Trailing `/` was present: the named entity must be a directory.
    pub directory_only: bool,
    /// Cleaned pattern body.
    pub body: String,
    /// Globs matching the named entity itself.
    self_set: GlobSet,
    /// Globs matching descendants of the named entity.
    descendant_set: GlobSet,
}

impl CompiledPattern {
    /// Parse and compile one ignore-file line.
    ///
    /// Returns `None` for blank lines, comments, and patterns that fail to
    /// compile (a malformed line must never abort a scan).
    pub fn parse(line: &str) -> Option<Self> {
        let raw = line.to_string();
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let mut body = trimmed;
        let negated = body.starts_with('!');
        if negated {
            body = &body[1..];
        }
        let directory_only = body.ends_with('/');
        if directory_only {
            body = &body[..body.len() - 1];
        }
        let anchored = body.starts_with('/');
        if anchored {
            body = &body[1..];
        }
        if body.is_empty() {
            return None;
        }

        let body = body.to_string();
        let (self_set, descendant_set) = match compile_sets(&body, anchored) {
            Ok(sets) => sets,
            Err(err) => {
                tracing::debug!(pattern = %raw, error = %err, "skipping malformed ignore pattern");
                return None;
            }
        };

        Some(Self {
            raw,
            negated,
            anchored,
            directory_only,
            body,
            self_set,
            descendant_set,
        })
    }

    /// Test a candidate path (relative to the declaring directory, POSIX).
    pub fn matches(&self, rel: &str, is_dir: bool) -> bool {
        // Descendant matches apply regardless of the candidate's kind: a
        // file under an ignored directory is ignored either way.
        if self.descendant_set.is_match(rel) {
            return true;
        }
        if self.self_set.is_match(rel) {
            return !self.directory_only || is_dir;
        }
        false
    }

    /// Whether the pattern body contains no glob metacharacters.
    pub fn is_literal(&self) -> bool {
        !self.body.contains(['*', '?', '[', '{'])
    }
}

fn compile_sets(body: &str, anchored: bool) -> Result<(GlobSet, GlobSet), globset::Error> {
    let mut self_builder = GlobSetBuilder::new();
    let mut desc_builder = GlobSetBuilder::new();

    let add = |builder: &mut GlobSetBuilder, pat: &str| -> Result<(), globset::Error> {
        builder.add(GlobBuilder::new(pat).literal_separator(true).build()?);
        Ok(())
    };

    add(&mut self_builder, body)?;
    add(&mut desc_builder, &format!("{body}/**"))?;
    if !anchored {
        // An unanchored pattern matches the basename or any path segment.
        add(&mut self_builder, &format!("**/{body}"))?;
        add(&mut desc_builder, &format!("**/{body}/**"))?;
    }

    Ok((self_builder.build()?, desc_builder.build()?))
}

/// Hierarchical ignore matcher with per-directory pattern caching.
#[derive(Debug)]
pub struct IgnoreMatcher {
    root: PathBuf,
    file_names: Vec<String>,
    /// Compiled patterns keyed by declaring directory (absolute).
    rules: HashMap<PathBuf, Vec<CompiledPattern>>,
    /// Directories already consulted, present or not.
    loaded: HashSet<PathBuf>,
}

impl IgnoreMatcher {
    /// Create a matcher rooted at `root`, consulting the given file names.
    pub fn new(root: impl Into<PathBuf>, file_names: &[String]) -> Self {
        Self {
            root: root.into(),
            file_names: file_names.to_vec(),
            rules: HashMap::new(),
            loaded: HashSet::new(),
        }
    }

    /// The scan root this matcher is bound to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load and compile the ignore file(s) declared in `dir`, once.
    ///
    /// A second call for an already-loaded directory is a no-op. Unreadable
    /// or malformed files degrade to "no patterns for this directory".
    pub fn load_for_directory(&mut self, dir: &Path) {
        let dir = dir.to_path_buf();
        if !self.loaded.insert(dir.clone()) {
            return;
        }

        let mut patterns = Vec::new();
        for name in &self.file_names {
            let file = dir.join(name);
            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(_) => continue,
            };
            tracing::debug!(path = %file.display(), "loaded ignore file");
            patterns.extend(text.lines().filter_map(CompiledPattern::parse));
        }

        if !patterns.is_empty() {
            self.rules.insert(dir, patterns);
        }
    }

    /// Last-rule-wins ignore verdict for a path.
    ///
    /// Accepts a path either absolute or relative to the matcher root.
    /// Matchers from shallower declaring directories are evaluated first,
    /// so the deepest (most recently declared) matching rule decides.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let rel = if path.is_absolute() {
            match posix_rel_path(&self.root, path) {
                Some(rel) => rel,
                None => return false,
            }
        } else {
            path.to_string_lossy().replace('\\', "/")
        };
        if rel.is_empty() {
            return false;
        }

        let mut verdict = false;
        for (dir, candidate) in self.ancestor_chain(&rel) {
            let Some(patterns) = self.rules.get(&dir) else {
                continue;
            };
            for pattern in patterns {
                if pattern.matches(&candidate, is_dir) {
                    verdict = !pattern.negated;
                }
            }
        }
        verdict
    }

    /// Negation patterns that are literal (glob-free) paths, expressed
    /// relative to the matcher root.
    pub fn explicit_negations(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (dir, patterns) in &self.rules {
            let prefix = posix_rel_path(&self.root, dir).unwrap_or_default();
            for pattern in patterns {
                if pattern.negated && pattern.is_literal() {
                    let rel = if prefix.is_empty() {
                        pattern.body.clone()
                    } else {
                        format!("{prefix}/{}", pattern.body)
                    };
                    out.push(rel);
                }
            }
        }
        out
    }

    /// Number of directories with compiled patterns (diagnostics/tests).
    pub fn rule_directories(&self) -> usize {
        self.rules.len()
    }

    /// Ancestor directories of `rel` from the root downward, paired with
    /// the candidate path re-expressed relative to each.
    fn ancestor_chain(&self, rel: &str) -> Vec<(PathBuf, String)> {
        let mut out = vec![(self.root.clone(), rel.to_string())];
        let segments: Vec<&str> = rel.split('/').collect();
        let mut dir = self.root.clone();
        for i in 0..segments.len().saturating_sub(1) {
            dir = dir.join(segments[i]);
            out.push((dir.clone(), segments[i + 1..].join("/")));
        }
        out
    }
}
