//! Startup reconciliation (§4.7 `sync_on_start`): compares the on-disk
//! tree against the store's recorded metadata, deletes rows for paths that
//! no longer exist, and reindexes everything else that changed. Grounded
//! on `original_source/internal/core/watch/watcher.go`'s `addExistingDirs`
//! startup pass, generalized into a bounded worker pool the way
//! `indexer::build` parallelizes its own walk.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Mutex;

use crate::chunker::ChunkOptions;
use crate::error::{Error, Result};
use crate::indexer::{self, apply_update_plans_batch, prepare_update_plan, UpdatePlan};
use crate::store::Store;
use crate::walker::{self, WalkOptions};

#[derive(Debug, Clone, Default)]
pub struct ReconcileStats {
    pub files_checked: i64,
    pub files_replaced: i64,
    pub files_deleted: i64,
    pub files_skipped: i64,
}

/// Walks `root`, diffing it against `store`'s recorded file metadata for
/// `workspace_id`. Paths present in the store but missing on disk (other
/// than the db's own self-paths) are deleted; everything else is run
/// through `prepare_update_plan` on a bounded worker pool, with a single
/// writer applying plans and the first error aborting the rest.
pub fn sync_on_start(
    root: &Path,
    db_path: &Path,
    store: &dyn Store,
    workspace_id: &str,
    walk_opts: &WalkOptions,
    chunk_opts: ChunkOptions,
    workers: usize,
) -> Result<ReconcileStats> {
    let self_paths = indexer::db_self_paths(root, db_path);

    let on_disk = walker::walk(root, walk_opts)?;
    let on_disk_set: HashSet<String> = on_disk.iter().map(|p| p.as_str().to_string()).collect();

    let known = store.list_files_meta(workspace_id)?;
    let stale: Vec<String> = known
        .keys()
        .filter(|p| !on_disk_set.contains(p.as_str()) && !self_paths.contains(p.as_str()))
        .cloned()
        .collect();

    let stats = Mutex::new(ReconcileStats::default());
    for path in &stale {
        store.delete_file(workspace_id, path)?;
        stats.lock().unwrap().files_deleted += 1;
    }

    let worker_count = workers.max(1).min(num_cpus::get().max(1));
    let queue_cap = (2 * worker_count).max(1);
    let (jobs_tx, jobs_rx) = sync_channel::<String>(queue_cap);
    let jobs_rx = Mutex::new(jobs_rx);
    let (plans_tx, plans_rx) = sync_channel::<UpdatePlan>(queue_cap);

    let cancelled = AtomicBool::new(false);
    let error_slot: Mutex<Option<Error>> = Mutex::new(None);

    std::thread::scope(|scope| {
        let feeder_paths = &on_disk;
        scope.spawn(move || {
            for rel in feeder_paths {
                if self_paths.contains(rel.as_str()) {
                    continue;
                }
                if jobs_tx.send(rel.as_str().to_string()).is_err() {
                    break;
                }
            }
        });

        for _ in 0..worker_count {
            let jobs_rx = &jobs_rx;
            let plans_tx = plans_tx.clone();
            let cancelled = &cancelled;
            let error_slot = &error_slot;
            let known = &known;
            scope.spawn(move || loop {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let path = {
                    let rx = jobs_rx.lock().unwrap();
                    rx.recv()
                };
                let Ok(path) = path else { break };

                let old_meta = known.get(&path);
                match prepare_update_plan(root, &path, chunk_opts, old_meta) {
                    Ok(plan) => {
                        if plans_tx.send(plan).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let mut slot = error_slot.lock().unwrap();
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                        cancelled.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            });
        }
        drop(plans_tx);

        let stats = &stats;
        let error_slot = &error_slot;
        let cancelled = &cancelled;
        scope.spawn(move || {
            let mut batch = Vec::new();
            while let Ok(plan) = plans_rx.recv() {
                if cancelled.load(Ordering::SeqCst) {
                    continue;
                }
                let mut s = stats.lock().unwrap();
                s.files_checked += 1;
                match &plan {
                    UpdatePlan::Skip => s.files_skipped += 1,
                    UpdatePlan::Replace(_) => s.files_replaced += 1,
                    UpdatePlan::Delete { .. } => s.files_deleted += 1,
                }
                drop(s);
                batch.push(plan);
                if batch.len() >= 64 {
                    if let Err(e) = apply_update_plans_batch(store, workspace_id, std::mem::take(&mut batch)) {
                        *error_slot.lock().unwrap() = Some(e);
                        cancelled.store(true, Ordering::SeqCst);
                    }
                }
            }
            if !batch.is_empty() {
                if let Err(e) = apply_update_plans_batch(store, workspace_id, batch) {
                    *error_slot.lock().unwrap() = Some(e);
                }
            }
        });
    });

    if let Some(e) = error_slot.into_inner().unwrap() {
        return Err(e);
    }
    Ok(stats.into_inner().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn new_store(path: &Path) -> Box<dyn Store> {
        crate::store::open(crate::store::Backend::Sqlite, path).unwrap()
    }

    #[test]
    fn deletes_stale_entries_and_reindexes_survivors() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.go"), "package main\n").unwrap();
        fs::write(root.join("b.go"), "package main\n").unwrap();
        let db_path = root.join(".otidx").join("index.db");
        let store = new_store(&db_path);

        let build_stats = indexer::build(root, &db_path, store.as_ref(), &indexer::BuildOptions::default(), None).unwrap();
        assert_eq!(build_stats.files_indexed, 2);

        fs::remove_file(root.join("b.go")).unwrap();

        let workspace_id = root.to_string_lossy().to_string();
        let stats = sync_on_start(
            root,
            &db_path,
            store.as_ref(),
            &workspace_id,
            &WalkOptions::default(),
            ChunkOptions::default(),
            2,
        )
        .unwrap();

        assert_eq!(stats.files_deleted, 1);
        let known = store.list_files_meta(&workspace_id).unwrap();
        assert!(!known.contains_key("b.go"));
        assert!(known.contains_key("a.go"));
    }

    #[test]
    fn unchanged_files_are_skipped_not_rewritten() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.go"), "package main\n").unwrap();
        let db_path = root.join(".otidx").join("index.db");
        let store = new_store(&db_path);
        indexer::build(root, &db_path, store.as_ref(), &indexer::BuildOptions::default(), None).unwrap();

        let workspace_id = root.to_string_lossy().to_string();
        let stats = sync_on_start(
            root,
            &db_path,
            store.as_ref(),
            &workspace_id,
            &WalkOptions::default(),
            ChunkOptions::default(),
            2,
        )
        .unwrap();

        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_replaced, 0);
    }
}
