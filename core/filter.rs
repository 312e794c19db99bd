//! Path classification against gitignore-style rules and a size cap.
//!
//! Matching semantics (anchoring, `*`/`**`, trailing-slash directory rules,
//! `!` negation) are delegated to [`ignore::gitignore`], so existing
//! `.context.ignore` files behave exactly as they would under git.

use crate::error::{AppError, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Rules prepended when built-in ignores are enabled. User rules come after
/// them so a `!pattern` line can re-include an entry.
pub const BUILTIN_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    "target/",
    "node_modules/",
    "__pycache__/",
    ".venv/",
    ".DS_Store",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClassification {
    Included,
    /// Matched an ignore rule. `size_exceeded` also records the size when
    /// the file is over the cap.
    Ignored { size_exceeded: Option<u64> },
    SizeExceeded { size: u64 },
}

/// Ordered gitignore patterns compiled against a root directory.
#[derive(Debug, Clone)]
pub struct IgnoreRuleSet {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl IgnoreRuleSet {
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    /// Loads rules from `ignore_file`. A missing file yields an empty set.
    pub fn load(root: &Path, ignore_file: &Path, builtin: bool) -> Result<Self> {
        let content = match fs::read_to_string(ignore_file) {
            Ok(content) => {
                log::info!("Loading ignore rules from: {}", ignore_file.display());
                content
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!(
                    "Ignore file not found at {}, continuing without user rules.",
                    ignore_file.display()
                );
                String::new()
            }
            Err(e) => {
                return Err(AppError::FileRead {
                    path: ignore_file.to_path_buf(),
                    source: e,
                });
            }
        };

        let builtin_lines: &[&str] = if builtin { BUILTIN_IGNORE_PATTERNS } else { &[] };
        Self::from_lines(
            root,
            builtin_lines.iter().copied().chain(content.lines()),
            Some(ignore_file),
        )
    }

    /// Builds a rule set from individual lines. Comments and blank lines are
    /// dropped; a malformed pattern is reported and skipped.
    pub fn from_lines<'a, I>(root: &Path, lines: I, source: Option<&Path>) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut builder = GitignoreBuilder::new(root);
        let mut patterns = Vec::new();
        let source_path: Option<PathBuf> = source.map(Path::to_path_buf);

        for line in lines {
            let trimmed = line.trim_end();
            if trimmed.trim_start().is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match builder.add_line(source_path.clone(), trimmed) {
                Ok(_) => {
                    log::trace!("Added ignore pattern: {}", trimmed);
                    patterns.push(trimmed.to_string());
                }
                Err(e) => {
                    log::warn!("Skipping invalid ignore pattern \"{}\": {}", trimmed, e);
                }
            }
        }

        let matcher = builder.build()?;
        log::debug!("Compiled {} ignore patterns.", patterns.len());
        Ok(Self { patterns, matcher })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// `relative_path` is relative to the rule set's root.
    pub fn is_ignored(&self, relative_path: &Path, is_dir: bool) -> bool {
        self.matcher.matched(relative_path, is_dir).is_ignore()
    }

    /// Like [`Self::is_ignored`], but also honours rules that exclude one of
    /// the path's parent directories.
    pub fn is_ignored_with_parents(&self, relative_path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }
}

#[derive(Debug, Clone)]
pub struct FilterEngine {
    rules: IgnoreRuleSet,
    max_size: u64,
}

impl FilterEngine {
    pub fn new(rules: IgnoreRuleSet, max_size: u64) -> Self {
        Self { rules, max_size }
    }

    pub fn rules(&self) -> &IgnoreRuleSet {
        &self.rules
    }

    /// An ignored file never yields content, but an oversized one still
    /// carries its size so both reasons can be shown.
    pub fn classify(&self, relative_path: &Path, size: u64) -> PathClassification {
        let oversized = size > self.max_size;
        if self.rules.is_ignored_with_parents(relative_path, false) {
            log::trace!("Ignored by rules: {}", relative_path.display());
            PathClassification::Ignored {
                size_exceeded: oversized.then_some(size),
            }
        } else if oversized {
            log::trace!(
                "Size exceeded ({} > {}): {}",
                size,
                self.max_size,
                relative_path.display()
            );
            PathClassification::SizeExceeded { size }
        } else {
            PathClassification::Included
        }
    }

    /// Ignored directories are pruned: nothing below them is visited.
    pub fn should_descend(&self, relative_dir: &Path) -> bool {
        !self.rules.is_ignored(relative_dir, true)
    }
}
