//! Concurrent build pipeline (§4.5, §5): walk → parse workers → single
//! writer, batched atomic replace, versioned metadata. Grounded on
//! `original_source/internal/core/indexer/indexer.go` for the sequential
//! shape (chunking, binary skip) and on spec §5's own description for the
//! worker/writer topology, which has no single direct original-source
//! analogue (the Go original is single-threaded).

pub mod incremental;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunker::{self, ChunkOptions};
use crate::error::{Error, Result};
use crate::explain::Explain;
use crate::model::FilePlan;
use crate::parser::Provider;
use crate::store::Store;
use crate::walker::{self, WalkOptions};

pub use incremental::{apply_update_plans_batch, prepare_update_plan, UpdatePlan};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub workspace_id: Option<String>,
    pub workers: usize,
    pub scan_all: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub chunk_lines: usize,
    pub chunk_overlap: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            workspace_id: None,
            workers: 0,
            scan_all: false,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            chunk_lines: 40,
            chunk_overlap: 0,
        }
    }
}

impl BuildOptions {
    /// `workers <= 0` means `max(1, cpu/2)`, per §6.6.
    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            (num_cpus::get() / 2).max(1)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub files_total: i64,
    pub files_indexed: i64,
    pub files_skipped_db: i64,
    pub files_skipped_binary: i64,
    pub chunks_written: i64,
    pub symbols_written: i64,
    pub comments_written: i64,
    pub treesitter_disabled: i64,
    pub treesitter_unsupported: i64,
    pub treesitter_errors: i64,
    pub version: i64,
}

/// A parsed file ready for the writer, or a binary-skip marker. A file is
/// still written for its chunks even when its parser kind is non-fatal
/// (§7: "the file is still indexed for chunks, but symbols and comments
/// are zeroed, and the corresponding counter increments").
enum ParsedFile {
    Plan(FilePlan, ParseIssue),
    SkippedBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseIssue {
    None,
    Disabled,
    Unsupported,
    Error,
}

/// Is `byte[p]` a zero byte anywhere in `b`? The original's binary sniff.
fn is_binary(b: &[u8]) -> bool {
    b.contains(&0)
}

/// Computes the set of "self" paths (the db file and its WAL/SHM/journal
/// sidecars) that must never be indexed, expressed workspace-relative.
/// Empty if the db path doesn't live under `root`.
pub(crate) fn db_self_paths(root: &Path, db_path: &Path) -> HashSet<String> {
    let mut out = HashSet::new();
    let abs_db = db_path.canonicalize().unwrap_or_else(|_| db_path.to_path_buf());
    let abs_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let Some(rel) = crate::path::relative_to(&abs_root, &abs_db) else {
        return out;
    };
    for suffix in ["", "-wal", "-shm", "-journal"] {
        out.insert(format!("{rel}{suffix}"));
    }
    out
}

/// Runs the full build: walk, parse in parallel, write in batches, bump
/// the workspace version. `store` must already be open at `db_path`.
pub fn build(
    root: &Path,
    db_path: &Path,
    store: &dyn Store,
    opts: &BuildOptions,
    explain: Option<&dyn Explain>,
) -> Result<BuildStats> {
    let root = root
        .canonicalize()
        .unwrap_or_else(|_| root.to_path_buf());
    if root.as_os_str().is_empty() {
        return Err(Error::invalid("root is required"));
    }
    let db_path_buf = db_path.to_path_buf();
    if db_path_buf.as_os_str().is_empty() {
        return Err(Error::invalid("dbPath is required"));
    }

    let workspace_id = opts
        .workspace_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| root.to_string_lossy().to_string());

    let _walk_timer = explain.map(|e| e.timer("walk"));
    store.ensure_workspace(&workspace_id, &root.to_string_lossy())?;
    if let Some(applier) = crate::store::build_pragma_applier(store) {
        applier.apply_build_pragmas()?;
    }

    let self_paths = db_self_paths(&root, &db_path_buf);

    let files = walker::walk(
        &root,
        &WalkOptions {
            scan_all: opts.scan_all,
            include_globs: opts.include_globs.clone(),
            exclude_globs: opts.exclude_globs.clone(),
        },
    )?;
    drop(_walk_timer);

    let stats = BuildStats {
        files_total: files.len() as i64,
        ..Default::default()
    };
    let stats = Mutex::new(stats);

    let worker_count = opts.worker_count();
    let queue_cap = (2 * worker_count).max(1);

    let (jobs_tx, jobs_rx) = sync_channel::<PathBuf>(queue_cap);
    let jobs_rx = Mutex::new(jobs_rx);
    let (parsed_tx, parsed_rx) = sync_channel::<ParsedFile>(queue_cap);

    let cancelled = AtomicBool::new(false);
    let error_slot: Mutex<Option<Error>> = Mutex::new(None);
    let chunk_opts = ChunkOptions {
        chunk_lines: opts.chunk_lines.max(1),
        overlap: opts.chunk_overlap,
    };

    let written_version = AtomicI64::new(0);

    std::thread::scope(|scope| {
        // Feeder: pushes absolute paths for every file not blacklisted as
        // a "self" db path onto the jobs queue, then closes it by drop.
        let feeder_root = root.clone();
        let feeder_self_paths = &self_paths;
        let feeder_stats = &stats;
        scope.spawn(move || {
            for rel in &files {
                if feeder_self_paths.contains(rel.as_str()) {
                    feeder_stats.lock().unwrap().files_skipped_db += 1;
                    continue;
                }
                if jobs_tx.send(feeder_root.join(rel.as_str())).is_err() {
                    break;
                }
            }
        });

        // Parse workers.
        for _ in 0..worker_count {
            let jobs_rx = &jobs_rx;
            let parsed_tx = parsed_tx.clone();
            let cancelled = &cancelled;
            let error_slot = &error_slot;
            let root = &root;
            let chunk_opts = chunk_opts;
            scope.spawn(move || {
                let provider = Provider::new();
                loop {
                    if cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    let path = {
                        let rx = jobs_rx.lock().unwrap();
                        rx.recv()
                    };
                    let Ok(path) = path else { break };

                    let parsed = match parse_one(root, &path, &provider, chunk_opts) {
                        Ok(p) => p,
                        Err(e) => {
                            // Filesystem failures (as opposed to parser
                            // failures, which parse_one already degrades
                            // to a ParseIssue) abort the whole build.
                            let mut slot = error_slot.lock().unwrap();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            cancelled.store(true, Ordering::SeqCst);
                            break;
                        }
                    };
                    if parsed_tx.send(parsed).is_err() {
                        break;
                    }
                }
            });
        }
        drop(parsed_tx);

        // Writer: drains the parsed queue into batches, bounded by size
        // and clamped to [4, 64], and flushes each via replace_files_batch.
        let stats = &stats;
        let error_slot = &error_slot;
        let cancelled = &cancelled;
        let written_version = &written_version;
        let batch_target = (2 * worker_count).clamp(4, 64);
        scope.spawn(move || {
            let mut batch: Vec<FilePlan> = Vec::with_capacity(batch_target);
            let mut flush = |batch: &mut Vec<FilePlan>| {
                if batch.is_empty() {
                    return;
                }
                if let Err(e) = store.replace_files_batch(&workspace_id, batch.as_slice()) {
                    *error_slot.lock().unwrap() = Some(e);
                    cancelled.store(true, Ordering::SeqCst);
                }
                batch.clear();
            };

            while let Ok(parsed) = parsed_rx.recv() {
                if cancelled.load(Ordering::SeqCst) {
                    continue;
                }
                let mut s = stats.lock().unwrap();
                match parsed {
                    ParsedFile::Plan(plan, issue) => {
                        s.files_indexed += 1;
                        s.chunks_written += plan.chunks.len() as i64;
                        s.symbols_written += plan.syms.len() as i64;
                        s.comments_written += plan.comms.len() as i64;
                        match issue {
                            ParseIssue::None => {}
                            ParseIssue::Disabled => s.treesitter_disabled += 1,
                            ParseIssue::Unsupported => s.treesitter_unsupported += 1,
                            ParseIssue::Error => s.treesitter_errors += 1,
                        }
                        drop(s);
                        batch.push(plan);
                        if batch.len() >= batch_target {
                            flush(&mut batch);
                        }
                    }
                    ParsedFile::SkippedBinary => s.files_skipped_binary += 1,
                }
            }
            flush(&mut batch);

            if error_slot.lock().unwrap().is_none() {
                match store.bump_version(&workspace_id) {
                    Ok(v) => written_version.store(v, Ordering::SeqCst),
                    Err(e) => *error_slot.lock().unwrap() = Some(e),
                }
            }
        });
    });

    if let Some(e) = error_slot.into_inner().unwrap() {
        return Err(e);
    }

    let mut stats = stats.into_inner().unwrap();
    stats.version = written_version.load(Ordering::SeqCst);
    if let Some(e) = explain {
        e.kv("files_total", &stats.files_total.to_string());
        e.kv("files_indexed", &stats.files_indexed.to_string());
        e.kv("files_skipped_db", &stats.files_skipped_db.to_string());
        e.kv("files_skipped_binary", &stats.files_skipped_binary.to_string());
        e.kv("chunks_written", &stats.chunks_written.to_string());
        e.kv("symbols_written", &stats.symbols_written.to_string());
        e.kv("comments_written", &stats.comments_written.to_string());
        e.kv("treesitter_disabled", &stats.treesitter_disabled.to_string());
        e.kv("treesitter_unsupported", &stats.treesitter_unsupported.to_string());
        e.kv("treesitter_errors", &stats.treesitter_errors.to_string());
    }
    Ok(stats)
}

/// Reads, hashes, chunks, and extracts a single file. Binary files and
/// unsupported/erroring extractors degrade to chunk-only indexing per §7
/// ("non-fatal; the file is still indexed for chunks").
fn parse_one(root: &Path, abs_path: &Path, provider: &Provider, chunk_opts: ChunkOptions) -> Result<ParsedFile> {
    let meta = std::fs::metadata(abs_path)?;
    let bytes = std::fs::read(abs_path)?;
    if is_binary(&bytes) {
        return Ok(ParsedFile::SkippedBinary);
    }

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let hash = hex::encode(hasher.finalize());

    let text = String::from_utf8_lossy(&bytes);
    let chunks = chunker::chunk_by_lines(&text, chunk_opts);

    let rel = crate::path::relative_to(root, abs_path).unwrap_or_default();
    let (syms, comms, issue) = match provider.extract(&rel, &bytes) {
        Ok((syms, comms)) => (syms, comms, ParseIssue::None),
        Err(Error::ParseDisabled) => (Vec::new(), Vec::new(), ParseIssue::Disabled),
        Err(Error::ParseUnsupported(_)) => (Vec::new(), Vec::new(), ParseIssue::Unsupported),
        Err(_) => (Vec::new(), Vec::new(), ParseIssue::Error),
    };

    Ok(ParsedFile::Plan(
        FilePlan {
            path: rel,
            size: meta.len() as i64,
            mtime: mtime_unix(&meta),
            hash,
            chunks,
            syms,
            comms,
            delete: false,
        },
        issue,
    ))
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

    fn new_store(path: &Path) -> Box<dyn Store> {
        crate::store::open(crate::store::Backend::Sqlite, path).unwrap()
    }

    #[test]
    fn builds_chunks_symbols_and_bumps_version() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("main.go"), "package main\n\nfunc Hello() {\n\tprintln(\"hi\")\n}\n").unwrap();
        let db_path = root.join(".otidx").join("index.db");
        let store = new_store(&db_path);

        let stats = build(root, &db_path, store.as_ref(), &BuildOptions::default(), None).unwrap();
        assert_eq!(stats.files_total, 1);
        assert_eq!(stats.files_indexed, 1);
        assert!(stats.chunks_written > 0);
        assert!(stats.symbols_written > 0);
        assert_eq!(stats.version, 1);
    }

    #[test]
    fn skips_binary_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("blob.bin"), [0u8, 1, 2, 3]).unwrap();
        let db_path = root.join(".otidx").join("index.db");
        let store = new_store(&db_path);

        let stats = build(root, &db_path, store.as_ref(), &BuildOptions::default(), None).unwrap();
        assert_eq!(stats.files_skipped_binary, 1);
        assert_eq!(stats.files_indexed, 0);
    }

    #[test]
    fn db_self_paths_excludes_db_and_sidecars() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let db = root.join(".otidx").join("index.db");
        let paths = db_self_paths(&root, &db);
        assert!(paths.contains(".otidx/index.db"));
        assert!(paths.contains(".otidx/index.db-wal"));
        assert!(paths.contains(".otidx/index.db-shm"));
        assert!(paths.contains(".otidx/index.db-journal"));
    }
}
