//! Workspace file enumeration (§4.1), grounded on the `ignore` crate's
//! gitignore-semantics walker (used the same way in
//! `matthewjberger-charter`'s project-scanning code) plus a custom
//! `.otidxignore` filename and glob include/exclude pass translated from
//! `original_source/internal/core/walk/walk.go`.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::Gitignore;
use ignore::WalkBuilder;

use crate::error::{Error, Result};
use crate::path::{self, RelPath};

const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "dist", "target"];

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub scan_all: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

/// Splits comma-separated glob strings the way callers pass them over the
/// wire, discarding empty segments.
pub fn split_glob_csv(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|s| s.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        let glob = Glob::new(p).map_err(|e| Error::invalid(e.to_string()))?;
        builder.add(glob);
    }
    Ok(Some(
        builder.build().map_err(|e| Error::invalid(e.to_string()))?,
    ))
}

/// `true` if `rel` (a basename-aware POSIX-relative path) matches `set`,
/// testing both the full relative path and the bare basename since
/// patterns without a `/` are meant to match by basename.
fn matches_path_or_basename(set: &GlobSet, rel: &str) -> bool {
    if set.is_match(rel) {
        return true;
    }
    if let Some(base) = rel.rsplit('/').next() {
        if set.is_match(base) {
            return true;
        }
    }
    false
}

/// Enumerates `root`, returning ordered, deduplicated workspace-relative
/// POSIX paths that survive the ignore rules and include/exclude globs.
pub fn walk(root: &Path, opts: &WalkOptions) -> Result<Vec<RelPath>> {
    let include = build_globset(&split_glob_csv(&opts.include_globs))?;
    let exclude = build_globset(&split_glob_csv(&opts.exclude_globs))?;

    let scan_all = opts.scan_all;
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(!opts.scan_all)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .add_custom_ignore_filename(".otidxignore")
        .filter_entry(move |entry| {
            if scan_all {
                return true;
            }
            match entry.file_name().to_str() {
                Some(name) => !SKIPPED_DIRS.contains(&name),
                None => true,
            }
        });

    let mut out = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let Some(rel) = path::relative_to(root, entry.path()) else {
            continue;
        };

        if let Some(inc) = &include {
            if !matches_path_or_basename(inc, &rel) {
                continue;
            }
        }
        if let Some(exc) = &exclude {
            if matches_path_or_basename(exc, &rel) {
                continue;
            }
        }

        out.push(RelPath::new(&rel)?);
    }

    out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    out.dedup_by(|a, b| a.as_str() == b.as_str());
    Ok(out)
}

/// Single-path membership test used by the watcher's event dispatcher,
/// which (unlike a full directory walk) has to decide whether one path at
/// a time belongs in the index — mirroring the original's
/// `walk.Filter.ShouldInclude(rel, isDir)`.
pub struct PathFilter {
    scan_all: bool,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    gitignore: Gitignore,
}

impl PathFilter {
    /// Builds a filter for `root`, reading its `.gitignore` and
    /// `.otidxignore` files the same way `walk` does.
    pub fn new(root: &Path, opts: &WalkOptions) -> Result<Self> {
        let include = build_globset(&split_glob_csv(&opts.include_globs))?;
        let exclude = build_globset(&split_glob_csv(&opts.exclude_globs))?;

        let mut builder = ignore::gitignore::GitignoreBuilder::new(root);
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".otidxignore"));
        let gitignore = builder
            .build()
            .map_err(|e| Error::invalid(e.to_string()))?;

        Ok(PathFilter {
            scan_all: opts.scan_all,
            include,
            exclude,
            gitignore,
        })
    }

    /// `true` if `rel` (workspace-relative, POSIX separators) should be
    /// indexed. `is_dir` lets directory events short-circuit on the
    /// `SKIPPED_DIRS`/hidden checks without needing to stat anything.
    pub fn should_include(&self, rel: &str, is_dir: bool) -> bool {
        if rel.is_empty() {
            return false;
        }

        if !self.scan_all {
            for component in rel.split('/') {
                if component.starts_with('.') || SKIPPED_DIRS.contains(&component) {
                    return false;
                }
            }
        }

        if self
            .gitignore
            .matched(rel, is_dir)
            .is_ignore()
        {
            return false;
        }

        if is_dir {
            return true;
        }

        if let Some(inc) = &self.include {
            if !matches_path_or_basename(inc, rel) {
                return false;
            }
        }
        if let Some(exc) = &self.exclude {
            if matches_path_or_basename(exc, rel) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn skips_hidden_and_builtin_ignored_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/a.js"), "x").unwrap();
        fs::write(dir.path().join(".hidden"), "x").unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();

        let files = walk(dir.path(), &WalkOptions::default()).unwrap();
        let paths: Vec<_> = files.iter().map(|p| p.as_str().to_string()).collect();
        assert_eq!(paths, vec!["main.go".to_string()]);
    }

    #[test]
    fn respects_gitignore_and_otidxignore() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(dir.path().join(".otidxignore"), "secret.txt\n").unwrap();
        fs::write(dir.path().join("a.log"), "x").unwrap();
        fs::write(dir.path().join("secret.txt"), "x").unwrap();
        fs::write(dir.path().join("keep.go"), "package main").unwrap();

        let files = walk(dir.path(), &WalkOptions::default()).unwrap();
        let paths: Vec<_> = files.iter().map(|p| p.as_str().to_string()).collect();
        assert_eq!(paths, vec!["keep.go".to_string()]);
    }

    #[test]
    fn applies_include_then_exclude_globs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "x").unwrap();
        fs::write(dir.path().join("b.py"), "x").unwrap();
        fs::write(dir.path().join("a_test.go"), "x").unwrap();

        let opts = WalkOptions {
            scan_all: true,
            include_globs: vec!["*.go".to_string()],
            exclude_globs: vec!["*_test.go".to_string()],
        };
        let files = walk(dir.path(), &opts).unwrap();
        let paths: Vec<_> = files.iter().map(|p| p.as_str().to_string()).collect();
        assert_eq!(paths, vec!["a.go".to_string()]);
    }

    #[test]
    fn path_filter_matches_walk_for_gitignored_paths() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(dir.path().join(".otidxignore"), "secret.txt\n").unwrap();

        let filter = PathFilter::new(dir.path(), &WalkOptions::default()).unwrap();
        assert!(!filter.should_include("a.log", false));
        assert!(!filter.should_include("secret.txt", false));
        assert!(filter.should_include("keep.go", false));
    }

    #[test]
    fn path_filter_skips_hidden_and_builtin_dirs() {
        let dir = tempdir().unwrap();
        let filter = PathFilter::new(dir.path(), &WalkOptions::default()).unwrap();
        assert!(!filter.should_include(".git/HEAD", false));
        assert!(!filter.should_include("node_modules/a.js", false));
        assert!(filter.should_include("src/main.go", false));
    }

    #[test]
    fn path_filter_applies_include_exclude_globs_to_files_only() {
        let dir = tempdir().unwrap();
        let opts = WalkOptions {
            scan_all: true,
            include_globs: vec!["*.go".to_string()],
            exclude_globs: vec!["*_test.go".to_string()],
        };
        let filter = PathFilter::new(dir.path(), &opts).unwrap();
        assert!(filter.should_include("a.go", false));
        assert!(!filter.should_include("a_test.go", false));
        assert!(!filter.should_include("b.py", false));
        // directories are never glob-filtered, only walked into.
        assert!(filter.should_include("b.py", true));
    }
}
