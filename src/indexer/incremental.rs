//! Single-file incremental update path (§4.5), consumed by the watcher's
//! `direct`/`simple`/`priority` queue modes and by any caller that wants
//! to reindex one path without a full build. No direct original-source
//! analogue (the Go original only ever does a full sequential build);
//! authored from the spec's own description of `prepare_update_plan` /
//! `apply_update_plans_batch`.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::chunker::{self, ChunkOptions};
use crate::error::{Error, Result};
use crate::model::{File, FilePlan};
use crate::parser::Provider;

/// The outcome of examining a single path against its previously recorded
/// metadata: either a full replacement plan, a deletion, or a no-op.
#[derive(Debug, Clone)]
pub enum UpdatePlan {
    Replace(FilePlan),
    Delete { path: String },
    Skip,
}

/// Computes what should happen to `rel` given its current on-disk state
/// and the store's last-known metadata for it.
///
/// - Missing on disk → `Delete`.
/// - Unchanged size+mtime → `Skip` without reading the file.
/// - Binary → `Delete` (a file that became binary is no longer indexed).
/// - Unchanged hash (size/mtime drifted but content didn't) → `Skip`.
/// - Otherwise → `Replace` with freshly chunked text and extracted
///   symbols/comments.
pub fn prepare_update_plan(
    root: &Path,
    rel: &str,
    chunk_opts: ChunkOptions,
    old_meta: Option<&File>,
) -> Result<UpdatePlan> {
    let abs = root.join(rel);

    let meta = match std::fs::metadata(&abs) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(UpdatePlan::Delete { path: rel.to_string() });
        }
        Err(e) => return Err(e.into()),
    };

    let size = meta.len() as i64;
    let mtime = mtime_unix(&meta);
    if let Some(old) = old_meta {
        if old.size == size && old.mtime == mtime {
            return Ok(UpdatePlan::Skip);
        }
    }

    let bytes = std::fs::read(&abs)?;
    if bytes.contains(&0) {
        return Ok(UpdatePlan::Delete { path: rel.to_string() });
    }

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let hash = hex::encode(hasher.finalize());
    if let Some(old) = old_meta {
        if old.hash == hash {
            return Ok(UpdatePlan::Skip);
        }
    }

    let text = String::from_utf8_lossy(&bytes);
    let chunks = chunker::chunk_by_lines(&text, chunk_opts);

    let provider = Provider::new();
    let (syms, comms) = match provider.extract(rel, &bytes) {
        Ok(pair) => pair,
        Err(Error::ParseDisabled) | Err(Error::ParseUnsupported(_)) | Err(Error::ParseError(_)) => {
            (Vec::new(), Vec::new())
        }
        Err(e) => return Err(e),
    };

    Ok(UpdatePlan::Replace(FilePlan {
        path: rel.to_string(),
        size,
        mtime,
        hash,
        chunks,
        syms,
        comms,
        delete: false,
    }))
}

/// Filters out `Skip` plans and forwards the rest to `replace_files_batch`
/// in one call, converting `Delete` into a tombstone `FilePlan`.
pub fn apply_update_plans_batch(
    store: &dyn crate::store::Store,
    workspace_id: &str,
    plans: Vec<UpdatePlan>,
) -> Result<()> {
    let batch: Vec<FilePlan> = plans
        .into_iter()
        .filter_map(|p| match p {
            UpdatePlan::Replace(plan) => Some(plan),
            UpdatePlan::Delete { path } => Some(FilePlan {
                path,
                delete: true,
                ..Default::default()
            }),
            UpdatePlan::Skip => None,
        })
        .collect();
    if batch.is_empty() {
        return Ok(());
    }
    store.replace_files_batch(workspace_id, &batch)
}

fn mtime_unix(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_file_plans_a_delete() {
        let dir = tempdir().unwrap();
        let plan = prepare_update_plan(dir.path(), "gone.go", ChunkOptions::default(), None).unwrap();
        assert!(matches!(plan, UpdatePlan::Delete { .. }));
    }

    #[test]
    fn unchanged_size_and_mtime_skips_without_reading() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n").unwrap();
        let meta = fs::metadata(dir.path().join("a.go")).unwrap();
        let old = File {
            workspace_id: String::new(),
            path: "a.go".to_string(),
            size: meta.len() as i64,
            mtime: mtime_unix(&meta),
            hash: "stale-hash-never-checked".to_string(),
        };
        let plan = prepare_update_plan(dir.path(), "a.go", ChunkOptions::default(), Some(&old)).unwrap();
        assert!(matches!(plan, UpdatePlan::Skip));
    }

    #[test]
    fn binary_content_plans_a_delete() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("blob.bin"), [0u8, 1, 2]).unwrap();
        let plan = prepare_update_plan(dir.path(), "blob.bin", ChunkOptions::default(), None).unwrap();
        assert!(matches!(plan, UpdatePlan::Delete { .. }));
    }

    #[test]
    fn changed_content_produces_a_replace_plan() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\nfunc Hi() {}\n").unwrap();
        let plan = prepare_update_plan(dir.path(), "a.go", ChunkOptions::default(), None).unwrap();
        match plan {
            UpdatePlan::Replace(p) => {
                assert_eq!(p.path, "a.go");
                assert!(!p.chunks.is_empty());
            }
            _ => panic!("expected a replace plan"),
        }
    }
}
