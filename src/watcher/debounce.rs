//! Push-and-reset debouncer, ported from
//! `original_source/internal/core/watch/debounce.go`: pushing a path
//! (re)arms a single timer; on fire, the queued set is snapshotted,
//! sorted, and handed to the callback. Rust has no direct equivalent of
//! `time.AfterFunc` with `Stop`/re-arm, so the timer is modeled as a
//! background thread blocking on `recv_timeout`, where every push sends a
//! wakeup that restarts the wait.

use std::collections::BTreeSet;
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_ADAPTIVE_MIN: Duration = Duration::from_millis(50);
pub const DEFAULT_ADAPTIVE_MAX: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum DelayPolicy {
    Fixed(Duration),
    Adaptive { min: Duration, max: Duration },
}

impl Default for DelayPolicy {
    fn default() -> Self {
        DelayPolicy::Fixed(DEFAULT_DELAY)
    }
}

impl DelayPolicy {
    /// The wait duration for the next fire, given how many paths are
    /// currently queued.
    pub fn delay_for(&self, count: usize) -> Duration {
        match *self {
            DelayPolicy::Fixed(d) => d,
            DelayPolicy::Adaptive { min, max } => {
                if count <= 10 {
                    min
                } else if count <= 100 {
                    min * 2
                } else if count <= 500 {
                    min * 4
                } else {
                    max
                }
            }
        }
    }
}

enum Signal {
    Push,
    Stop,
}

struct Inner {
    queued: Mutex<BTreeSet<String>>,
    policy: DelayPolicy,
}

/// Collects paths and fires `on_fire` with the sorted, deduplicated batch
/// once `policy`'s delay has elapsed since the last push.
pub struct Debouncer {
    inner: Arc<Inner>,
    tx: SyncSender<Signal>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new<F>(policy: DelayPolicy, on_fire: F) -> Self
    where
        F: Fn(Vec<String>) + Send + Sync + 'static,
    {
        let inner = Arc::new(Inner {
            queued: Mutex::new(BTreeSet::new()),
            policy,
        });
        let (tx, rx) = sync_channel::<Signal>(64);

        let thread_inner = inner.clone();
        let join = std::thread::spawn(move || loop {
            let count = thread_inner.queued.lock().unwrap().len();
            let delay = thread_inner.policy.delay_for(count);
            match rx.recv_timeout(delay) {
                Ok(Signal::Push) => continue,
                Ok(Signal::Stop) => break,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let paths: Vec<String> = {
                        let mut q = thread_inner.queued.lock().unwrap();
                        if q.is_empty() {
                            continue;
                        }
                        std::mem::take(&mut *q).into_iter().collect()
                    };
                    on_fire(paths);
                }
            }
        });

        Debouncer {
            inner,
            tx,
            join: Mutex::new(Some(join)),
        }
    }

    pub fn push(&self, path: &str) {
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        self.inner.queued.lock().unwrap().insert(path.to_string());
        let _ = self.tx.send(Signal::Push);
    }

    pub fn stop(&self) {
        let _ = self.tx.send(Signal::Stop);
        if let Some(handle) = self.join.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn fires_once_after_delay_with_sorted_unique_paths() {
        let (tx, rx) = channel();
        let d = Debouncer::new(DelayPolicy::Fixed(Duration::from_millis(20)), move |paths| {
            tx.send(paths).unwrap();
        });
        d.push("b.go");
        d.push("a.go");
        d.push("a.go");
        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(fired, vec!["a.go".to_string(), "b.go".to_string()]);
    }

    #[test]
    fn push_resets_the_timer() {
        let (tx, rx) = channel();
        let d = Debouncer::new(DelayPolicy::Fixed(Duration::from_millis(50)), move |paths| {
            tx.send(paths).unwrap();
        });
        d.push("a.go");
        std::thread::sleep(Duration::from_millis(30));
        d.push("b.go");
        // Total elapsed since first push > 50ms, but the timer should
        // have reset on the second push, so nothing should fire yet.
        assert!(rx.recv_timeout(Duration::from_millis(35)).is_err());
        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(fired, vec!["a.go".to_string(), "b.go".to_string()]);
    }

    #[test]
    fn adaptive_policy_matches_tiers() {
        let p = DelayPolicy::Adaptive {
            min: Duration::from_millis(50),
            max: Duration::from_millis(500),
        };
        assert_eq!(p.delay_for(5), Duration::from_millis(50));
        assert_eq!(p.delay_for(50), Duration::from_millis(100));
        assert_eq!(p.delay_for(300), Duration::from_millis(200));
        assert_eq!(p.delay_for(5000), Duration::from_millis(500));
    }
}
