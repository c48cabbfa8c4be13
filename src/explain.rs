//! Optional explain/telemetry sink (§6.3), grounded on the teacher's
//! `tracing`-based instrumentation idiom but expressed as an injectable
//! trait so callers can capture structured values instead of only logging.

use std::time::Instant;

/// Injected by a caller that wants structured insight into a build or
/// query: well-known keys such as `phase`, `fts5`, `cache_hit`,
/// `items_returned`; timers for `walk`, `read_parse`, `write`, `sql`, ...
pub trait Explain: Send + Sync {
    fn kv(&self, name: &str, value: &str);

    /// Starts a named timer, returning a guard that records the elapsed
    /// time on drop. Callers typically hold the guard until the scope ends.
    fn timer(&self, name: &str) -> TimerGuard<'_>;
}

pub struct TimerGuard<'a> {
    sink: &'a dyn Explain,
    name: String,
    start: Instant,
}

impl<'a> TimerGuard<'a> {
    pub fn new(sink: &'a dyn Explain, name: &str) -> Self {
        TimerGuard {
            sink,
            name: name.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let ms = self.start.elapsed().as_millis();
        self.sink.kv(&format!("{}_ms", self.name), &ms.to_string());
    }
}

/// A sink that records every `kv` call into an ordered vector, useful for
/// tests and for callers that want to inspect the full explain trace.
#[derive(Default)]
pub struct RecordingExplain {
    entries: std::sync::Mutex<Vec<(String, String)>>,
}

impl RecordingExplain {
    pub fn new() -> Self {
        RecordingExplain::default()
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().unwrap().clone()
    }
}

impl Explain for RecordingExplain {
    fn kv(&self, name: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
    }

    fn timer(&self, name: &str) -> TimerGuard<'_> {
        TimerGuard::new(self, name)
    }
}

/// A sink that forwards every `kv` call to a `tracing` event at debug
/// level, matching the teacher's logging idiom for diagnostic detail.
#[derive(Default)]
pub struct TracingExplain;

impl Explain for TracingExplain {
    fn kv(&self, name: &str, value: &str) {
        tracing::debug!(key = name, value, "explain");
    }

    fn timer(&self, name: &str) -> TimerGuard<'_> {
        TimerGuard::new(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_explain_captures_kv_pairs() {
        let sink = RecordingExplain::new();
        sink.kv("phase", "build");
        sink.kv("files_total", "3");
        assert_eq!(
            sink.entries(),
            vec![
                ("phase".to_string(), "build".to_string()),
                ("files_total".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn timer_guard_records_elapsed_on_drop() {
        let sink = RecordingExplain::new();
        {
            let _t = sink.timer("walk");
        }
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "walk_ms");
    }
}
