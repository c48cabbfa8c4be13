//! Prefix-extension session cache (§4.6.2), grounded on
//! `core/query/session.go`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub path: String,
    pub sl: i64,
    pub el: i64,
    pub text: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub ttl: Duration,
    pub min_prefix_len: usize,
    pub max_candidates: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            ttl: Duration::from_secs(30),
            min_prefix_len: 2,
            max_candidates: 2000,
        }
    }
}

#[derive(Debug, Clone)]
struct QuerySession {
    version: i64,
    last_q: String,
    candidates: Vec<CandidateRow>,
    last_fetch_n: usize,
    exhausted: bool,
    workspace_root: String,
    has_fts: bool,
    fts_reason: String,
    updated_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct SessionKeyParts {
    pub workspace_id: String,
    pub db_path: String,
    pub unit: String,
    pub case_insensitive: bool,
    pub limit: i64,
    pub offset: i64,
    pub context_lines: i64,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

pub fn make_session_key(parts: &SessionKeyParts) -> String {
    let mut inc = parts.include_globs.clone();
    let mut exc = parts.exclude_globs.clone();
    inc.sort();
    exc.sort();
    format!(
        "ws={}|db={}|unit={}|ci={}|limit={}|offset={}|ctx={}|inc={}|exc={}",
        parts.workspace_id,
        parts.db_path,
        parts.unit,
        parts.case_insensitive,
        parts.limit,
        parts.offset,
        parts.context_lines,
        inc.join(","),
        exc.join(","),
    )
}

/// A new query `q` is a prefix-extension of `last_q` when it is at least as
/// long, has length >= `min_prefix_len` after trimming, and starts with
/// `last_q` under the effective case policy.
pub fn is_prefix_extension(last_q: &str, q: &str, case_insensitive: bool, min_prefix_len: usize) -> bool {
    if last_q.len() < min_prefix_len || q.len() < last_q.len() {
        return false;
    }
    if case_insensitive {
        q.to_lowercase().starts_with(&last_q.to_lowercase())
    } else {
        q.starts_with(last_q)
    }
}

/// AND over all non-empty tokens of `q`: keeps candidates whose text
/// contains every token (case-aware substring containment).
pub fn narrow_candidates(
    candidates: &[CandidateRow],
    tokens: &[String],
    case_insensitive: bool,
) -> Vec<CandidateRow> {
    let cleaned: Vec<String> = tokens
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if cleaned.is_empty() {
        return Vec::new();
    }
    candidates
        .iter()
        .filter(|c| {
            let hay = if case_insensitive {
                c.text.to_lowercase()
            } else {
                c.text.clone()
            };
            cleaned.iter().all(|t| {
                let needle = if case_insensitive {
                    t.to_lowercase()
                } else {
                    t.clone()
                };
                hay.contains(&needle)
            })
        })
        .cloned()
        .collect()
}

/// Outcome of consulting the session for a query: either a narrowed
/// candidate set the caller can use directly (skipping the store fetch),
/// or a signal to fall through to a cold fetch.
pub enum SessionLookup {
    Reuse {
        candidates: Vec<CandidateRow>,
        exhausted: bool,
    },
    Miss,
}

pub struct SessionStore {
    inner: Mutex<HashMap<String, QuerySession>>,
    opts: SessionOptions,
}

impl SessionStore {
    pub fn new(opts: SessionOptions) -> Self {
        SessionStore {
            inner: Mutex::new(HashMap::new()),
            opts,
        }
    }

    pub fn clear_workspace(&self, workspace_id: &str) {
        let prefix = format!("ws={workspace_id}|");
        let mut inner = self.inner.lock().unwrap();
        inner.retain(|k, _| !k.starts_with(&prefix));
    }

    /// Looks up a session for `key`, expiring it if stale or
    /// version-mismatched, and attempts a prefix-narrow. `want_n =
    /// offset + limit`.
    #[allow(clippy::too_many_arguments)]
    pub fn lookup(
        &self,
        key: &str,
        version: i64,
        q: &str,
        tokens: &[String],
        case_insensitive: bool,
        want_n: usize,
    ) -> SessionLookup {
        let mut inner = self.inner.lock().unwrap();

        let expired = inner
            .get(key)
            .map(|s| s.updated_at.elapsed() > self.opts.ttl)
            .unwrap_or(false);
        if expired {
            inner.remove(key);
        }

        let version_mismatch = inner.get(key).map(|s| s.version != version).unwrap_or(false);
        if version_mismatch {
            inner.remove(key);
        }

        let Some(session) = inner.get(key) else {
            return SessionLookup::Miss;
        };

        if !is_prefix_extension(&session.last_q, q, case_insensitive, self.opts.min_prefix_len) {
            return SessionLookup::Miss;
        }

        let mut narrowed = narrow_candidates(&session.candidates, tokens, case_insensitive);
        let narrow_in = session.candidates.len();
        let mut exhausted = session.exhausted;
        if narrowed.len() > self.opts.max_candidates {
            narrowed.truncate(self.opts.max_candidates);
            exhausted = false; // truncation clears exhausted (spec §9 open question b)
        }
        let narrow_out = narrowed.len();

        if narrow_out >= want_n || exhausted {
            let _ = narrow_in;
            SessionLookup::Reuse {
                candidates: narrowed,
                exhausted,
            }
        } else {
            SessionLookup::Miss
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        key: &str,
        version: i64,
        q: &str,
        candidates: Vec<CandidateRow>,
        fetch_n: usize,
        exhausted: bool,
        workspace_root: &str,
        has_fts: bool,
        fts_reason: &str,
    ) {
        let mut candidates = candidates;
        let mut exhausted = exhausted;
        if candidates.len() > self.opts.max_candidates {
            candidates.truncate(self.opts.max_candidates);
            exhausted = false;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.insert(
            key.to_string(),
            QuerySession {
                version,
                last_q: q.to_string(),
                candidates,
                last_fetch_n: fetch_n,
                exhausted,
                workspace_root: workspace_root.to_string(),
                has_fts,
                fts_reason: fts_reason.to_string(),
                updated_at: Instant::now(),
            },
        );
    }
}

/// `fetch_n = max(5*(offset+limit), 100)`, raised to 500 if globs are
/// present.
pub fn query_with_session_fetch_n(offset: i64, limit: i64, has_globs: bool) -> i64 {
    let mut n = (5 * (offset + limit)).max(100);
    if has_globs {
        n = n.max(500);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(text: &str) -> CandidateRow {
        CandidateRow {
            path: "a.go".into(),
            sl: 1,
            el: 1,
            text: text.into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn scenario_session_prefix_narrowing() {
        let store = SessionStore::new(SessionOptions::default());
        let key = "k";
        store.store(
            key,
            1,
            "hel",
            vec![row("hello world"), row("help me"), row("say hello")],
            100,
            true,
            "/root",
            false,
            "",
        );

        match store.lookup(key, 1, "hell", &["hell".to_string()], false, 1) {
            SessionLookup::Reuse { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
            }
            SessionLookup::Miss => panic!("expected reuse"),
        }
    }

    #[test]
    fn version_mismatch_resets_session() {
        let store = SessionStore::new(SessionOptions::default());
        store.store("k", 1, "hel", vec![row("hello")], 10, true, "/root", false, "");
        match store.lookup("k", 2, "hell", &["hell".to_string()], false, 1) {
            SessionLookup::Miss => {}
            SessionLookup::Reuse { .. } => panic!("expected miss on version change"),
        }
    }

    #[test]
    fn prefix_extension_is_case_aware() {
        assert!(is_prefix_extension("hel", "hello", false, 2));
        assert!(!is_prefix_extension("HEL", "hello", false, 2));
        assert!(is_prefix_extension("HEL", "HELLO", false, 2));
        assert!(is_prefix_extension("HEL", "hello", true, 2));
    }

    #[test]
    fn fetch_n_rules() {
        assert_eq!(query_with_session_fetch_n(0, 20, false), 100);
        assert_eq!(query_with_session_fetch_n(100, 20, false), 600);
        assert_eq!(query_with_session_fetch_n(0, 20, true), 500);
    }
}
