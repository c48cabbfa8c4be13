//! Fetch → filter → dedupe → unitize → refine (§4.6), grounded on
//! `original_source/internal/core/query/engine.go`.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::explain::Explain;
use crate::model::{Range, ResultItem};
use crate::query::cache::{CacheKey, QueryCache};
use crate::query::dedupe::dedupe_by_path_top_n;
use crate::query::search::{extract_query_terms, find_in_text};
use crate::query::session::{
    make_session_key, query_with_session_fetch_n, CandidateRow, SessionKeyParts, SessionLookup,
    SessionStore,
};
use crate::query::snippet::build_snippet_from_match_line;
use crate::query::unit::{
    block_range, clamp_range_to_file, file_range, line_range, min_enclosing_symbol_range,
};
use crate::store::Store;

const MAX_FETCH_ATTEMPTS: usize = 3;
const PER_PATH_CAP: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub unit: String,
    pub context_lines: i64,
    pub case_insensitive: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub limit: i64,
    pub offset: i64,
    pub prefetch_min: Option<i64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            unit: "block".to_string(),
            context_lines: 0,
            case_insensitive: false,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            limit: 20,
            offset: 0,
            prefetch_min: None,
        }
    }
}

pub struct QueryEngine {
    cache: QueryCache,
    sessions: SessionStore,
}

impl QueryEngine {
    pub fn new(cache_capacity: usize) -> Self {
        QueryEngine {
            cache: QueryCache::new(cache_capacity),
            sessions: SessionStore::new(Default::default()),
        }
    }

    pub fn clear_workspace_sessions(&self, workspace_id: &str) {
        self.sessions.clear_workspace(workspace_id);
    }

    pub fn query(
        &self,
        store: &dyn Store,
        db_path: &str,
        workspace_id: &str,
        q: &str,
        opts: &QueryOptions,
        explain: Option<&dyn Explain>,
    ) -> Result<Vec<ResultItem>> {
        if opts.limit < 0 || opts.offset < 0 {
            return Err(Error::invalid("limit and offset must be >= 0"));
        }

        let ws = store.get_workspace(workspace_id)?;
        let has_fts = store.has_fts();
        let case_insensitive = has_fts || opts.case_insensitive;

        let include_set = build_globset(&opts.include_globs)?;
        let exclude_set = build_globset(&opts.exclude_globs)?;

        let cache_key = CacheKey {
            workspace_id: workspace_id.to_string(),
            version: ws.version,
            q_trim: q.trim().to_string(),
            unit: opts.unit.clone(),
            case_insensitive,
            limit: opts.limit,
            offset: opts.offset,
            context_lines: opts.context_lines,
            include_globs_csv: opts.include_globs.join(","),
            exclude_globs_csv: opts.exclude_globs.join(","),
            backend: store.backend().to_string(),
        };

        if let Some(hit) = self.cache.get(&cache_key) {
            if let Some(e) = explain {
                e.kv("cache_hit", "lru");
            }
            return Ok(hit);
        }

        let want_n = (opts.offset + opts.limit) as usize;
        let has_globs = !opts.include_globs.is_empty() || !opts.exclude_globs.is_empty();
        let tokens = extract_query_terms(q);
        // A query with no alphanumeric/underscore tokens (e.g. "::") still
        // narrows on something: fall back to the raw query as a single token,
        // matching the Go original's `tokens = []string{q}` fallback.
        let tokens = if tokens.is_empty() { vec![q.to_string()] } else { tokens };

        let session_key = make_session_key(&SessionKeyParts {
            workspace_id: workspace_id.to_string(),
            db_path: db_path.to_string(),
            unit: opts.unit.clone(),
            case_insensitive,
            limit: opts.limit,
            offset: opts.offset,
            context_lines: opts.context_lines,
            include_globs: opts.include_globs.clone(),
            exclude_globs: opts.exclude_globs.clone(),
        });

        let (candidates, exhausted) = match self.sessions.lookup(
            &session_key,
            ws.version,
            q,
            &tokens,
            case_insensitive,
            want_n,
        ) {
            SessionLookup::Reuse {
                candidates,
                exhausted,
            } => {
                if let Some(e) = explain {
                    e.kv("cache_hit", "session");
                }
                (candidates, exhausted)
            }
            SessionLookup::Miss => {
                let (candidates, fetch_n, exhausted) = self.fetch_candidates(
                    store,
                    workspace_id,
                    q,
                    case_insensitive,
                    want_n,
                    has_globs,
                    opts.prefetch_min,
                    &include_set,
                    &exclude_set,
                    &ws.root,
                    explain,
                )?;
                self.sessions.store(
                    &session_key,
                    ws.version,
                    q,
                    candidates.clone(),
                    fetch_n,
                    exhausted,
                    &ws.root,
                    has_fts,
                    &store.fts_reason(),
                );
                if let Some(e) = explain {
                    e.kv("cache_hit", "miss");
                }
                (candidates, exhausted)
            }
        };

        let items = self.build_items(&candidates, q, &tokens, case_insensitive);
        let deduped = dedupe_by_path_top_n(items, PER_PATH_CAP);
        if let Some(e) = explain {
            e.kv("items_after_dedupe", &deduped.len().to_string());
        }

        let start = opts.offset.max(0) as usize;
        let end = (start + opts.limit.max(0) as usize).min(deduped.len());
        let slice: Vec<ResultItem> = if start >= deduped.len() {
            Vec::new()
        } else {
            deduped[start..end].to_vec()
        };

        let refined = self.unitize(slice, &opts.unit, opts.context_lines, &ws.root, store, workspace_id, explain)?;
        let _ = exhausted;

        self.cache.put(&cache_key, refined.clone());
        if let Some(e) = explain {
            e.kv("items_returned", &refined.len().to_string());
        }
        Ok(refined)
    }

    #[allow(clippy::too_many_arguments)]
    fn fetch_candidates(
        &self,
        store: &dyn Store,
        workspace_id: &str,
        q: &str,
        case_insensitive: bool,
        want_n: usize,
        has_globs: bool,
        prefetch_min: Option<i64>,
        include_set: &Option<GlobSet>,
        exclude_set: &Option<GlobSet>,
        workspace_root: &str,
        explain: Option<&dyn Explain>,
    ) -> Result<(Vec<CandidateRow>, usize, bool)> {
        let mut fetch_n =
            query_with_session_fetch_n(0, want_n as i64, has_globs).max(want_n as i64);
        if let Some(min) = prefetch_min {
            fetch_n = fetch_n.max(min);
        }

        let mut attempts = 0usize;
        let mut exhausted = false;
        let mut rows;
        loop {
            attempts += 1;
            let result = store.search_chunks(workspace_id, q, fetch_n as usize, case_insensitive)?;
            let returned = result.chunks.len();
            exhausted = returned < fetch_n as usize;

            rows = result
                .chunks
                .into_iter()
                .filter(|c| path_passes_globs(&c.path, include_set, exclude_set))
                .map(|c| CandidateRow {
                    path: c.path,
                    sl: c.sl,
                    el: c.el,
                    text: c.text,
                    snippet: String::new(),
                })
                .collect::<Vec<_>>();

            if rows.len() >= want_n || exhausted || attempts >= MAX_FETCH_ATTEMPTS {
                break;
            }
            fetch_n *= 2;
        }

        if let Some(e) = explain {
            e.kv("prefetch_n", &fetch_n.to_string());
            e.kv("prefetch_attempts", &attempts.to_string());
        }
        let _ = workspace_root;
        Ok((rows, fetch_n as usize, exhausted))
    }

    fn build_items(
        &self,
        candidates: &[CandidateRow],
        q: &str,
        tokens: &[String],
        case_insensitive: bool,
    ) -> Vec<ResultItem> {
        let mut items = Vec::with_capacity(candidates.len());
        for c in candidates {
            let mut matches = find_in_text(&c.text, q, case_insensitive);
            for t in tokens {
                matches.extend(find_in_text(&c.text, t, case_insensitive));
            }
            matches.sort_by_key(|m| (m.line, m.col));
            matches.dedup_by(|a, b| a.line == b.line && a.col == b.col);

            for m in matches.iter_mut() {
                m.line += c.sl - 1;
            }

            if matches.is_empty() {
                continue;
            }

            let first = &matches[0];
            let snippet = if !c.snippet.trim().is_empty() {
                c.snippet.trim().to_string()
            } else {
                let chunk_line = (first.line - c.sl + 1).max(1) as usize;
                let line_text = c.text.split('\n').nth(chunk_line - 1).unwrap_or("");
                build_snippet_from_match_line(line_text, first.col, q, case_insensitive)
            };

            items.push(ResultItem {
                kind: "chunk".to_string(),
                path: c.path.clone(),
                range: Range::new(c.sl, 1, c.el, 1),
                title: String::new(),
                snippet,
                text: c.text.clone(),
                matches,
            });
        }
        items
    }

    #[allow(clippy::too_many_arguments)]
    fn unitize(
        &self,
        items: Vec<ResultItem>,
        unit: &str,
        context_lines: i64,
        workspace_root: &str,
        store: &dyn Store,
        workspace_id: &str,
        explain: Option<&dyn Explain>,
    ) -> Result<Vec<ResultItem>> {
        let mut out = Vec::with_capacity(items.len());
        for mut item in items {
            let first_line = item.matches.first().map(|m| m.line).unwrap_or(item.range.sl);
            let on_disk = read_full_file(workspace_root, &item.path);
            let full_text = on_disk.as_deref().unwrap_or(&item.text);

            match unit {
                "line" => {
                    item.range = line_range(full_text, &crate::model::Match {
                        line: first_line,
                        col: 1,
                        text: String::new(),
                    }, context_lines);
                }
                "file" => {
                    item.range = file_range(full_text);
                }
                "symbol" => {
                    let symbols = store.find_min_enclosing_symbols(workspace_id, &item.path, first_line)?;
                    if let Some(range) = min_enclosing_symbol_range(&symbols, first_line) {
                        let idx = symbols
                            .iter()
                            .position(|s| s.range == range)
                            .unwrap_or(0);
                        item.range = range;
                        item.kind = "symbol".to_string();
                        let sym = &symbols[idx];
                        item.title = if !sym.signature.trim().is_empty() {
                            sym.signature.clone()
                        } else {
                            sym.name.clone()
                        };
                    } else {
                        item.range = block_range(full_text, &crate::model::Match {
                            line: first_line,
                            col: 1,
                            text: String::new(),
                        });
                        if let Some(e) = explain {
                            e.kv("unit_fallback", "block");
                        }
                    }
                }
                _ => {
                    item.range = block_range(full_text, &crate::model::Match {
                        line: first_line,
                        col: 1,
                        text: String::new(),
                    });
                }
            }

            let total_lines = full_text.split('\n').count() as i64;
            item.range = clamp_range_to_file(item.range, total_lines);
            out.push(item);
        }
        Ok(out)
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        let glob = Glob::new(p).map_err(|e| Error::invalid(e.to_string()))?;
        builder.add(glob);
    }
    Ok(Some(builder.build().map_err(|e| Error::invalid(e.to_string()))?))
}

fn path_passes_globs(path: &str, include: &Option<GlobSet>, exclude: &Option<GlobSet>) -> bool {
    if let Some(inc) = include {
        if !inc.is_match(path) {
            return false;
        }
    }
    if let Some(exc) = exclude {
        if exc.is_match(path) {
            return false;
        }
    }
    true
}

fn read_full_file(workspace_root: &str, rel_path: &str) -> Option<String> {
    let full = Path::new(workspace_root).join(rel_path);
    std::fs::read_to_string(full).ok()
}
