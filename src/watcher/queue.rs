//! Update queue (§4.7): three operational modes trading latency for
//! throughput. No direct original-source analogue (the Go watcher applies
//! every debounced path inline); authored from the spec's own description
//! of `direct`/`simple`/`priority`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::chunker::ChunkOptions;
use crate::error::Result;
use crate::indexer::{apply_update_plans_batch, prepare_update_plan};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    Direct,
    #[default]
    Simple,
    Priority,
}

impl QueueMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Some(QueueMode::Direct),
            "simple" => Some(QueueMode::Simple),
            "priority" => Some(QueueMode::Priority),
            _ => None,
        }
    }
}

/// Four-tier (interval, batch) thresholds over pending queue size, per
/// §4.7. Picked to span "a handful of files" through "tens of thousands".
const TIERS: [(usize, Duration, usize); 4] = [
    (32, Duration::from_millis(200), 32),
    (512, Duration::from_millis(500), 256),
    (4096, Duration::from_secs(1), 1024),
    (usize::MAX, Duration::from_secs(2), 8192),
];

fn tier_for(pending: usize) -> (Duration, usize) {
    for (threshold, interval, batch) in TIERS {
        if pending <= threshold {
            return (interval, batch);
        }
    }
    let (_, interval, batch) = TIERS[TIERS.len() - 1];
    (interval, batch)
}

struct PendingEntry {
    rel: String,
    depth: usize,
    size: i64,
    hot_count: u32,
}

/// Samples events/sec at most every 500ms and derives the `priority`
/// mode's rate factor tiers: `<20 -> 1`, `<100 -> 1.5`, `<500 -> 2`, else
/// `3`.
struct RateEstimator {
    window_start: Instant,
    window_count: u32,
    last_rate: f64,
}

impl RateEstimator {
    fn new() -> Self {
        RateEstimator {
            window_start: Instant::now(),
            window_count: 0,
            last_rate: 0.0,
        }
    }

    fn observe(&mut self, n: u32) -> f64 {
        self.window_count += n;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_millis(500) {
            self.last_rate = self.window_count as f64 / elapsed.as_secs_f64().max(0.001);
            self.window_count = 0;
            self.window_start = Instant::now();
        }
        self.last_rate
    }
}

fn rate_factor(events_per_sec: f64) -> f64 {
    if events_per_sec < 20.0 {
        1.0
    } else if events_per_sec < 100.0 {
        1.5
    } else if events_per_sec < 500.0 {
        2.0
    } else {
        3.0
    }
}

pub struct UpdateQueue {
    mode: QueueMode,
    root: std::path::PathBuf,
    workspace_id: String,
    chunk_opts: ChunkOptions,
    store: Arc<dyn Store>,
    lock: Mutex<()>,
    pending: Mutex<Vec<PendingEntry>>,
    last_flush: Mutex<Instant>,
    rate: Mutex<RateEstimator>,
}

impl UpdateQueue {
    pub fn new(mode: QueueMode, root: &Path, workspace_id: &str, chunk_opts: ChunkOptions, store: Arc<dyn Store>) -> Self {
        UpdateQueue {
            mode,
            root: root.to_path_buf(),
            workspace_id: workspace_id.to_string(),
            chunk_opts,
            store,
            lock: Mutex::new(()),
            pending: Mutex::new(Vec::new()),
            last_flush: Mutex::new(Instant::now()),
            rate: Mutex::new(RateEstimator::new()),
        }
    }

    /// Enqueues a debounced batch of paths, applying it according to the
    /// queue's mode.
    pub fn enqueue(&self, paths: Vec<String>) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        match self.mode {
            QueueMode::Direct => self.apply_direct(&paths),
            QueueMode::Simple | QueueMode::Priority => self.buffer_and_maybe_flush(paths),
        }
    }

    fn apply_direct(&self, paths: &[String]) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        for rel in paths {
            let plan = prepare_update_plan(&self.root, rel, self.chunk_opts, self.old_meta(rel)?.as_ref())?;
            apply_update_plans_batch(self.store.as_ref(), &self.workspace_id, vec![plan])?;
        }
        Ok(())
    }

    fn buffer_and_maybe_flush(&self, paths: Vec<String>) -> Result<()> {
        let rate = self
            .rate
            .lock()
            .unwrap()
            .observe(paths.len() as u32);

        {
            let mut pending = self.pending.lock().unwrap();
            let mut by_rel: HashMap<String, usize> =
                pending.iter().enumerate().map(|(i, e)| (e.rel.clone(), i)).collect();
            for rel in paths {
                if let Some(&idx) = by_rel.get(&rel) {
                    pending[idx].hot_count += 1;
                    continue;
                }
                let abs = self.root.join(&rel);
                let depth = rel.matches('/').count();
                let size = std::fs::metadata(&abs).map(|m| m.len() as i64).unwrap_or(0);
                by_rel.insert(rel.clone(), pending.len());
                pending.push(PendingEntry { rel, depth, size, hot_count: 1 });
            }
        }

        self.maybe_flush(rate)
    }

    fn maybe_flush(&self, events_per_sec: f64) -> Result<()> {
        let pending_len = self.pending.lock().unwrap().len();
        let (mut interval, mut batch) = tier_for(pending_len);
        if self.mode == QueueMode::Priority {
            let factor = rate_factor(events_per_sec);
            interval = interval.mul_f64(factor).min(Duration::from_secs(2));
            batch = ((batch as f64 * factor) as usize).clamp(32, 8192);
        }

        let elapsed_since_flush = self.last_flush.lock().unwrap().elapsed();
        if pending_len < batch && elapsed_since_flush < interval {
            return Ok(());
        }
        self.flush()
    }

    /// Forces a flush regardless of threshold, e.g. on `watch.stop`.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        let mut entries: Vec<PendingEntry> = std::mem::take(&mut *self.pending.lock().unwrap());
        if entries.is_empty() {
            return Ok(());
        }

        match self.mode {
            QueueMode::Priority => entries.sort_by(|a, b| {
                b.hot_count
                    .cmp(&a.hot_count)
                    .then(a.depth.cmp(&b.depth))
                    .then(a.size.cmp(&b.size))
                    .then(a.rel.cmp(&b.rel))
            }),
            _ => entries.sort_by(|a, b| {
                a.size.cmp(&b.size).then(a.depth.cmp(&b.depth)).then(a.rel.cmp(&b.rel))
            }),
        }

        let mut plans = Vec::with_capacity(entries.len());
        for entry in &entries {
            plans.push(prepare_update_plan(&self.root, &entry.rel, self.chunk_opts, self.old_meta(&entry.rel)?.as_ref())?);
        }
        apply_update_plans_batch(self.store.as_ref(), &self.workspace_id, plans)?;
        *self.last_flush.lock().unwrap() = Instant::now();
        Ok(())
    }

    fn old_meta(&self, rel: &str) -> Result<Option<crate::model::File>> {
        self.store.get_file_meta(&self.workspace_id, rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_queue_mode_names() {
        assert_eq!(QueueMode::parse("direct"), Some(QueueMode::Direct));
        assert_eq!(QueueMode::parse("PRIORITY"), Some(QueueMode::Priority));
        assert_eq!(QueueMode::parse("bogus"), None);
    }

    #[test]
    fn rate_factor_matches_tiers() {
        assert_eq!(rate_factor(5.0), 1.0);
        assert_eq!(rate_factor(50.0), 1.5);
        assert_eq!(rate_factor(200.0), 2.0);
        assert_eq!(rate_factor(1000.0), 3.0);
    }

    #[test]
    fn tier_for_scales_with_pending_size() {
        let (_, small_batch) = tier_for(10);
        let (_, large_batch) = tier_for(10_000);
        assert!(large_batch > small_batch);
    }

    #[test]
    fn direct_mode_applies_immediately() {
        use std::fs;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.go"), "package main\n").unwrap();
        let db_path = root.join(".otidx").join("index.db");
        let store: Arc<dyn Store> = Arc::from(crate::store::open(crate::store::Backend::Sqlite, &db_path).unwrap());
        let workspace_id = root.to_string_lossy().to_string();
        store.ensure_workspace(&workspace_id, &root.to_string_lossy()).unwrap();

        let queue = UpdateQueue::new(QueueMode::Direct, root, &workspace_id, ChunkOptions::default(), store.clone());
        queue.enqueue(vec!["a.go".to_string()]).unwrap();

        let known = store.list_files_meta(&workspace_id).unwrap();
        assert!(known.contains_key("a.go"));
    }
}
