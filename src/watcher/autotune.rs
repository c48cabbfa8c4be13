//! Workspace-size-aware defaults for watch options (§4.7). No
//! original-source analogue — the original always runs with its single
//! fixed debounce policy — so these thresholds are authored from the
//! spec's "should scale with workspace size" guidance and recorded as a
//! decision in the grounding ledger rather than ported from anywhere.

use crate::store::Store;
use crate::watcher::debounce::DelayPolicy;
use crate::watcher::queue::QueueMode;

/// A workspace with this many files or more is considered "large" for
/// tuning purposes.
const LARGE_FILE_COUNT: i64 = 5_000;
/// Average chunk/file byte size below which a workspace is considered
/// "many small files" (favors batching over per-file latency).
const SMALL_AVG_SIZE_BYTES: i64 = 4_096;
/// Average size above which individual files are expensive enough that
/// low-latency single-file application wins over batching.
const LARGE_AVG_SIZE_BYTES: i64 = 65_536;

#[derive(Debug, Clone)]
pub struct WatchTuning {
    pub delay_policy: DelayPolicy,
    pub queue_mode: QueueMode,
    pub workers: usize,
}

impl Default for WatchTuning {
    fn default() -> Self {
        WatchTuning {
            delay_policy: DelayPolicy::default(),
            queue_mode: QueueMode::Simple,
            workers: (num_cpus::get() / 2).max(1),
        }
    }
}

/// Probes `store`'s recorded file count and average size for
/// `workspace_id` and derives tuned watch defaults. Any field the caller
/// explicitly set should override the corresponding field here — this
/// function only supplies a starting point.
pub fn autotune(store: &dyn Store, workspace_id: &str) -> WatchTuning {
    let (file_count, chunk_count) = store.get_files_stats(workspace_id).unwrap_or((0, 0));
    let avg_size = if file_count > 0 {
        chunk_count / file_count
    } else {
        0
    };
    tune_for(file_count, avg_size)
}

fn tune_for(file_count: i64, avg_size: i64) -> WatchTuning {
    if file_count < LARGE_FILE_COUNT && avg_size >= LARGE_AVG_SIZE_BYTES {
        // Small repo of a few large files: per-file latency is cheap and
        // valuable, batching buys little.
        return WatchTuning {
            delay_policy: DelayPolicy::Fixed(std::time::Duration::from_millis(100)),
            queue_mode: QueueMode::Simple,
            workers: 2,
        };
    }

    if file_count >= LARGE_FILE_COUNT && avg_size <= SMALL_AVG_SIZE_BYTES {
        // Large repo of many small files: prioritize hot paths and absorb
        // bursts with bigger batches.
        return WatchTuning {
            delay_policy: DelayPolicy::Adaptive {
                min: std::time::Duration::from_millis(80),
                max: std::time::Duration::from_millis(800),
            },
            queue_mode: QueueMode::Priority,
            workers: (num_cpus::get()).max(2),
        };
    }

    WatchTuning::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_repo_of_large_files_prefers_direct_latency() {
        let t = tune_for(100, 200_000);
        assert_eq!(t.queue_mode, QueueMode::Simple);
        assert!(matches!(t.delay_policy, DelayPolicy::Fixed(_)));
    }

    #[test]
    fn large_repo_of_small_files_prefers_priority_batching() {
        let t = tune_for(50_000, 500);
        assert_eq!(t.queue_mode, QueueMode::Priority);
        assert!(matches!(t.delay_policy, DelayPolicy::Adaptive { .. }));
    }

    #[test]
    fn mixed_workspace_falls_back_to_defaults() {
        let t = tune_for(1_000, 10_000);
        assert_eq!(t.queue_mode, QueueMode::Simple);
    }
}
