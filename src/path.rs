//! Workspace-relative path hygiene.
//!
//! Internally, every path that crosses a store/walker/watcher boundary is
//! normalized once into a `RelPath`: POSIX slashes, no leading `./`, no
//! `..` segments, non-empty.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelPath(String);

impl RelPath {
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let normalized = normalize(raw.as_ref());
        if normalized.is_empty() {
            return Err(Error::invalid("path is required"));
        }
        if normalized.split('/').any(|seg| seg == "..") {
            return Err(Error::invalid(format!("path escapes root: {normalized}")));
        }
        Ok(RelPath(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Converts OS separators to `/`, strips a leading `./`, and trims
/// surrounding slashes/whitespace. Does not resolve `..`; callers that need
/// rejection of escaping paths should go through `RelPath::new`.
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim().replace('\\', "/");
    while let Some(stripped) = s.strip_prefix("./") {
        s = stripped.to_string();
    }
    let s = s.trim_matches('/');
    s.to_string()
}

/// Computes `path` relative to `root` as a POSIX-relative string, if `path`
/// lies within `root`.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for comp in rel.components() {
        parts.push(comp.as_os_str().to_string_lossy().to_string());
    }
    Some(parts.join("/"))
}

pub fn to_absolute(root: &Path, rel: &RelPath) -> PathBuf {
    root.join(rel.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_backslashes_and_dot_prefix() {
        assert_eq!(normalize("./a/b"), "a/b");
        assert_eq!(normalize("a\\b\\c"), "a/b/c");
        assert_eq!(normalize("/a/b/"), "a/b");
    }

    #[test]
    fn rejects_parent_escapes() {
        assert!(RelPath::new("../etc/passwd").is_err());
        assert!(RelPath::new("a/../b").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(RelPath::new("").is_err());
        assert!(RelPath::new("   ").is_err());
    }

    #[test]
    fn relative_to_strips_root() {
        let root = Path::new("/work/repo");
        let p = Path::new("/work/repo/src/main.rs");
        assert_eq!(relative_to(root, p).as_deref(), Some("src/main.rs"));
    }
}
