// src/watch/patterns.rs

//! Exclusion / inclusion glob matching.
//!
//! Patterns are evaluated against paths relative to the watch root, using
//! `/` as the separator. Matching follows shell-glob rules (`*` and `?` do
//! not cross `/`) extended with `**` for any number of directories.
//!
//! A path is excluded when it *or any of its parent directories* matches an
//! exclusion pattern. That is what makes `.git/*` cover `.git/objects/ab/cd`
//! through `.git/objects`, and it keeps the polling detector (which prunes
//! excluded directories) and the native detector (which sees deep paths
//! directly) in agreement.

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Directories that never trigger a restart unless the user opts out of the
/// defaults: version control, virtual environments / dependency trees, and
/// bytecode or tool caches.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "node_modules",
    ".tox",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
];

/// File patterns excluded by default: compiled bytecode and editor droppings.
pub const DEFAULT_EXCLUDED_FILES: &[&str] =
    &["**/*.pyc", "**/*.pyo", "**/*.swp", "**/*~", "**/.#*"];

/// The built-in exclusion list, as glob strings.
pub fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS
        .iter()
        .map(|dir| format!("**/{dir}"))
        .chain(DEFAULT_EXCLUDED_FILES.iter().map(|p| p.to_string()))
        .collect()
}

/// A compiled set of exclusion patterns. Order is irrelevant.
#[derive(Clone)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for ExclusionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl ExclusionSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let set = build_globset(patterns).context("building exclude globset")?;
        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    /// True if `rel_path` or one of its parent directories matches.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        if self.set.is_empty() {
            return false;
        }
        let mut candidate = trim_rel(rel_path);
        loop {
            if candidate.is_empty() {
                return false;
            }
            if self.set.is_match(candidate) {
                return true;
            }
            match candidate.rfind('/') {
                Some(idx) => candidate = &candidate[..idx],
                None => return false,
            }
        }
    }
}

/// Glob matcher entry point: is `path` (relative to the watch root) matched
/// by any pattern in `patterns`?
pub fn matches(path: &str, patterns: &ExclusionSet) -> bool {
    patterns.is_excluded(path)
}

/// Compiled include + exclude filter applied by the detectors before any
/// event reaches the debouncer.
///
/// With no include patterns every non-excluded path is relevant.
#[derive(Clone)]
pub struct WatchFilter {
    exclude: ExclusionSet,
    include: Option<GlobSet>,
    include_patterns: Vec<String>,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("exclude", &self.exclude.patterns)
            .field("include", &self.include_patterns)
            .finish()
    }
}

impl WatchFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set = if include.is_empty() {
            None
        } else {
            Some(build_globset(include).context("building include globset")?)
        };
        Ok(Self {
            exclude: ExclusionSet::new(exclude)?,
            include: include_set,
            include_patterns: include.to_vec(),
        })
    }

    /// Directory pruning check used while walking the tree.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude.is_excluded(rel_path)
    }

    /// Should a change to this path count towards a restart?
    pub fn is_relevant(&self, rel_path: &str) -> bool {
        if self.exclude.is_excluded(rel_path) {
            return false;
        }
        match &self.include {
            Some(include) => include.is_match(trim_rel(rel_path)),
            None => true,
        }
    }
}

/// Validate and compile patterns with shell-style separator handling.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(trim_rel(pat))
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn trim_rel(s: &str) -> &str {
    s.strip_prefix("./").unwrap_or(s).trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> ExclusionSet {
        let owned: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        ExclusionSet::new(&owned).unwrap()
    }

    #[test]
    fn matcher_table() {
        let git = set(&[".git/*"]);
        let cases: &[(&str, &ExclusionSet, bool)] = &[
            (".git/config", &git, true),
            (".git/objects/ab/cdef", &git, true),
            ("src/app.py", &git, false),
            ("src/.git/config", &git, false),
            (".gitignore", &git, false),
        ];
        for (path, patterns, expected) in cases {
            assert_eq!(matches(path, patterns), *expected, "path {path}");
        }
    }

    #[test]
    fn double_star_matches_at_any_depth() {
        let s = set(&["**/__pycache__"]);
        assert!(s.is_excluded("__pycache__/app.cpython-312.pyc"));
        assert!(s.is_excluded("pkg/sub/__pycache__/mod.pyc"));
        assert!(!s.is_excluded("pkg/pycache.py"));
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let s = set(&["src/*.py"]);
        assert!(s.is_excluded("src/app.py"));
        assert!(!s.is_excluded("src/pkg/app.py"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        assert!(!matches("anything/at/all", &ExclusionSet::new(&[]).unwrap()));
    }

    #[test]
    fn defaults_cover_vcs_venv_and_bytecode() {
        let s = ExclusionSet::new(&default_excludes()).unwrap();
        assert!(s.is_excluded(".git/HEAD"));
        assert!(s.is_excluded(".venv/lib/python3.12/site.py"));
        assert!(s.is_excluded("api/__pycache__/views.cpython-312.pyc"));
        assert!(s.is_excluded("api/views.pyc"));
        assert!(s.is_excluded("api/.views.py.swp"));
        assert!(!s.is_excluded("api/views.py"));
        assert!(!s.is_excluded(".env"));
    }

    #[test]
    fn include_patterns_narrow_relevance() {
        let filter =
            WatchFilter::new(&["**/*.py".to_string()], &[".cache/*".to_string()]).unwrap();
        assert!(filter.is_relevant("app.py"));
        assert!(filter.is_relevant("pkg/models.py"));
        assert!(!filter.is_relevant("README.md"));
        assert!(!filter.is_relevant(".cache/tmp.py"));
    }

    #[test]
    fn leading_dot_slash_is_ignored() {
        let s = set(&["./build/*"]);
        assert!(s.is_excluded("build/out.txt"));
        assert!(s.is_excluded("./build/out.txt"));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_build_time() {
        assert!(ExclusionSet::new(&["src/[".to_string()]).is_err());
    }
}
