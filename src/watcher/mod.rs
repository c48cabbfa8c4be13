//! File watcher (§4.7): notify-driven change detection, debounced and
//! queued the way `indexer` batches a full build, with a startup
//! reconciliation pass. Grounded on
//! `original_source/internal/core/watch/watcher.go` for the state machine
//! shape (`idle -> running -> stopped`, idempotent start/stop) and on the
//! teacher's `src/watcher/mod.rs` for the notify-channel-bridging idiom —
//! adapted to a plain background thread rather than tokio, matching the
//! crate's synchronous `query`/`indexer` convention.

pub mod autotune;
pub mod debounce;
pub mod dispatch;
pub mod queue;
pub mod reconcile;

use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use serde::{Deserialize, Serialize};

use crate::chunker::ChunkOptions;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::walker::{PathFilter, WalkOptions};

use debounce::Debouncer;
use queue::UpdateQueue;

pub use debounce::DelayPolicy;
pub use queue::QueueMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    pub delay_policy: Option<DelayPolicy>,
    pub queue_mode: Option<QueueMode>,
    pub workers: Option<usize>,
    pub sync_on_start: bool,
    /// Whether to probe workspace size/shape and pick `delay_policy`/
    /// `queue_mode` defaults from it. Defaults to `true`; set `false` to
    /// rely solely on the explicit fields above (or their hardcoded
    /// defaults) instead.
    pub auto_tune: bool,
    pub scan_all: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub chunk_lines: usize,
    pub chunk_overlap: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            delay_policy: None,
            queue_mode: None,
            workers: None,
            sync_on_start: true,
            auto_tune: true,
            scan_all: false,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            chunk_lines: 40,
            chunk_overlap: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopped,
}

/// Handles held only while `Running`; dropping `notify_watcher` stops its
/// background OS thread, which in turn closes the event channel and lets
/// the dispatch thread exit on its own.
struct RunningHandles {
    notify_watcher: RecommendedWatcher,
    dispatch_join: JoinHandle<()>,
    queue: Arc<UpdateQueue>,
}

/// A single workspace's watch session. `start`/`stop` are idempotent;
/// `status` reports the current state for `watch.status`.
pub struct Watcher {
    root: PathBuf,
    db_path: PathBuf,
    workspace_id: String,
    store: Arc<dyn Store>,
    state: Mutex<State>,
    running: Mutex<Option<RunningHandles>>,
}

impl Watcher {
    pub fn new(root: &Path, db_path: &Path, workspace_id: &str, store: Arc<dyn Store>) -> Self {
        Watcher {
            root: root.to_path_buf(),
            db_path: db_path.to_path_buf(),
            workspace_id: workspace_id.to_string(),
            store,
            state: Mutex::new(State::Idle),
            running: Mutex::new(None),
        }
    }

    pub fn status(&self) -> &'static str {
        match *self.state.lock().unwrap() {
            State::Idle => "idle",
            State::Running => "running",
            State::Stopped => "stopped",
        }
    }

    /// Starts watching `root`. A no-op if already running. If previously
    /// stopped, tears down nothing extra — the old handles are already
    /// joined — and simply starts a fresh session.
    pub fn start(&self, opts: &WatchOptions) -> Result<()> {
        if *self.state.lock().unwrap() == State::Running {
            return Ok(());
        }

        let walk_opts = WalkOptions {
            scan_all: opts.scan_all,
            include_globs: opts.include_globs.clone(),
            exclude_globs: opts.exclude_globs.clone(),
        };
        let chunk_opts = ChunkOptions {
            chunk_lines: opts.chunk_lines.max(1),
            overlap: opts.chunk_overlap,
        };
        let default_workers = (num_cpus::get() / 2).max(1);

        if opts.sync_on_start {
            reconcile::sync_on_start(
                &self.root,
                &self.db_path,
                self.store.as_ref(),
                &self.workspace_id,
                &walk_opts,
                chunk_opts,
                opts.workers.unwrap_or(default_workers),
            )?;
        }

        let tuning = if opts.auto_tune {
            autotune::autotune(self.store.as_ref(), &self.workspace_id)
        } else {
            autotune::WatchTuning::default()
        };
        let delay_policy = opts.delay_policy.unwrap_or(tuning.delay_policy);
        let queue_mode = opts.queue_mode.unwrap_or(tuning.queue_mode);

        let queue = Arc::new(UpdateQueue::new(
            queue_mode,
            &self.root,
            &self.workspace_id,
            chunk_opts,
            self.store.clone(),
        ));

        let debounce_queue = queue.clone();
        let debouncer = Debouncer::new(delay_policy, move |paths| {
            if let Err(e) = debounce_queue.enqueue(paths) {
                tracing::warn!(error = %e, "watch update queue failed");
            }
        });

        let filter = PathFilter::new(&self.root, &walk_opts)?;
        let self_paths = crate::indexer::db_self_paths(&self.root, &self.db_path);

        let (event_tx, event_rx) = channel::<notify::Event>();
        let mut notify_watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = event_tx.send(event);
            }
        })
        .map_err(|e| Error::Storage(e.to_string()))?;
        notify_watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| Error::Storage(e.to_string()))?;

        let dispatch_root = self.root.clone();
        let dispatch_join = std::thread::spawn(move || {
            while let Ok(event) = event_rx.recv() {
                let paths = dispatch::paths_for_event(&dispatch_root, &filter, &self_paths, &event);
                for path in paths {
                    debouncer.push(&path);
                }
            }
            debouncer.stop();
        });

        *self.running.lock().unwrap() = Some(RunningHandles {
            notify_watcher,
            dispatch_join,
            queue,
        });
        *self.state.lock().unwrap() = State::Running;
        Ok(())
    }

    /// Stops watching: unregisters the notify watcher, joins the dispatch
    /// thread, and forces a final flush of anything still buffered.
    /// Idempotent.
    pub fn stop(&self) -> Result<()> {
        let handles = self.running.lock().unwrap().take();
        let Some(handles) = handles else {
            *self.state.lock().unwrap() = State::Stopped;
            return Ok(());
        };

        drop(handles.notify_watcher);
        let _ = handles.dispatch_join.join();
        handles.queue.flush()?;

        *self.state.lock().unwrap() = State::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn new_store(path: &Path) -> Arc<dyn Store> {
        Arc::from(crate::store::open(crate::store::Backend::Sqlite, path).unwrap())
    }

    #[test]
    fn status_transitions_idle_running_stopped() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let db_path = root.join(".otidx").join("index.db");
        let store = new_store(&db_path);
        let workspace_id = root.to_string_lossy().to_string();
        store.ensure_workspace(&workspace_id, &root.to_string_lossy()).unwrap();

        let watcher = Watcher::new(root, &db_path, &workspace_id, store);
        assert_eq!(watcher.status(), "idle");

        watcher.start(&WatchOptions { sync_on_start: false, ..Default::default() }).unwrap();
        assert_eq!(watcher.status(), "running");

        // starting again while running is a no-op.
        watcher.start(&WatchOptions { sync_on_start: false, ..Default::default() }).unwrap();
        assert_eq!(watcher.status(), "running");

        watcher.stop().unwrap();
        assert_eq!(watcher.status(), "stopped");

        // stopping again is idempotent.
        watcher.stop().unwrap();
        assert_eq!(watcher.status(), "stopped");
    }

    #[test]
    fn detects_a_new_file_and_indexes_it() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let db_path = root.join(".otidx").join("index.db");
        let store = new_store(&db_path);
        let workspace_id = root.to_string_lossy().to_string();
        store.ensure_workspace(&workspace_id, &root.to_string_lossy()).unwrap();

        let watcher = Watcher::new(&root, &db_path, &workspace_id, store.clone());
        watcher
            .start(&WatchOptions {
                sync_on_start: false,
                delay_policy: Some(DelayPolicy::Fixed(Duration::from_millis(30))),
                queue_mode: Some(QueueMode::Direct),
                ..Default::default()
            })
            .unwrap();

        fs::write(root.join("new_file.go"), "package main\n").unwrap();

        let mut found = false;
        for _ in 0..50 {
            std::thread::sleep(Duration::from_millis(50));
            if store
                .list_files_meta(&workspace_id)
                .unwrap()
                .contains_key("new_file.go")
            {
                found = true;
                break;
            }
        }
        watcher.stop().unwrap();
        assert!(found, "expected new_file.go to be indexed by the watcher");
    }
}
