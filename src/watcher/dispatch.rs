//! Filesystem event → debounced path translation (§4.7), ported from
//! `original_source/internal/core/watch/watcher.go`'s `handleEvent` /
//! `addDirRecursive` / `isDBRel`.

use std::collections::HashSet;
use std::path::Path;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};

use crate::walker::PathFilter;

/// Translates one `notify::Event` into zero or more workspace-relative
/// paths worth debouncing. Directory creates/renames are expanded to every
/// file beneath them so the first build of a newly-added directory doesn't
/// wait for a second event per file.
pub fn paths_for_event(root: &Path, filter: &PathFilter, self_paths: &HashSet<String>, event: &Event) -> Vec<String> {
    let is_relevant = matches!(
        event.kind,
        EventKind::Create(CreateKind::Any | CreateKind::File | CreateKind::Folder)
            | EventKind::Modify(ModifyKind::Any | ModifyKind::Data(_) | ModifyKind::Name(_))
            | EventKind::Remove(RemoveKind::Any | RemoveKind::File | RemoveKind::Folder)
    );
    if !is_relevant {
        return Vec::new();
    }

    let mut out = Vec::new();
    for abs in &event.paths {
        let Some(rel) = crate::path::relative_to(root, abs) else {
            continue;
        };
        if self_paths.contains(rel.as_str()) {
            continue;
        }

        let is_dir = abs.is_dir();
        let is_full_dir_rename = matches!(
            event.kind,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) | EventKind::Create(CreateKind::Folder)
        ) && is_dir;

        if is_full_dir_rename {
            collect_dir_recursive(root, abs, filter, self_paths, &mut out);
            continue;
        }

        if is_dir {
            continue;
        }
        if !filter.should_include(&rel, false) {
            continue;
        }
        out.push(rel);
    }
    out
}

fn collect_dir_recursive(
    root: &Path,
    dir: &Path,
    filter: &PathFilter,
    self_paths: &HashSet<String>,
    out: &mut Vec<String>,
) {
    let Some(rel) = crate::path::relative_to(root, dir) else {
        return;
    };
    if !filter.should_include(rel.as_str(), true) {
        return;
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_dir = path.is_dir();
        let Some(child_rel) = crate::path::relative_to(root, &path) else {
            continue;
        };
        if is_dir {
            collect_dir_recursive(root, &path, filter, self_paths, out);
            continue;
        }
        if self_paths.contains(child_rel.as_str()) {
            continue;
        }
        if !filter.should_include(&child_rel, false) {
            continue;
        }
        out.push(child_rel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::WalkOptions;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: Vec<std::path::PathBuf>) -> Event {
        Event { kind, paths, attrs: Default::default() }
    }

    #[test]
    fn modify_event_yields_its_relative_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main").unwrap();
        let filter = PathFilter::new(dir.path(), &WalkOptions::default()).unwrap();
        let self_paths = HashSet::new();

        let ev = event(
            EventKind::Modify(ModifyKind::Any),
            vec![dir.path().join("a.go")],
        );
        let paths = paths_for_event(dir.path(), &filter, &self_paths, &ev);
        assert_eq!(paths, vec!["a.go".to_string()]);
    }

    #[test]
    fn db_self_path_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".otidx")).unwrap();
        fs::write(dir.path().join(".otidx/index.db"), "x").unwrap();
        let filter = PathFilter::new(dir.path(), &WalkOptions::default()).unwrap();
        let mut self_paths = HashSet::new();
        self_paths.insert(".otidx/index.db".to_string());

        let ev = event(
            EventKind::Modify(ModifyKind::Any),
            vec![dir.path().join(".otidx/index.db")],
        );
        let paths = paths_for_event(dir.path(), &filter, &self_paths, &ev);
        assert!(paths.is_empty());
    }

    #[test]
    fn new_directory_expands_to_its_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/a.go"), "package pkg").unwrap();
        fs::write(dir.path().join("pkg/b.go"), "package pkg").unwrap();
        let filter = PathFilter::new(dir.path(), &WalkOptions::default()).unwrap();
        let self_paths = HashSet::new();

        let ev = event(
            EventKind::Create(CreateKind::Folder),
            vec![dir.path().join("pkg")],
        );
        let mut paths = paths_for_event(dir.path(), &filter, &self_paths, &ev);
        paths.sort();
        assert_eq!(paths, vec!["pkg/a.go".to_string(), "pkg/b.go".to_string()]);
    }

    #[test]
    fn ignored_file_produces_no_paths() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(dir.path().join("a.log"), "x").unwrap();
        let filter = PathFilter::new(dir.path(), &WalkOptions::default()).unwrap();
        let self_paths = HashSet::new();

        let ev = event(
            EventKind::Modify(ModifyKind::Any),
            vec![dir.path().join("a.log")],
        );
        let paths = paths_for_event(dir.path(), &filter, &self_paths, &ev);
        assert!(paths.is_empty());
    }
}
