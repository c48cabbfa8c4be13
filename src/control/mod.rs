//! Control-plane wire contract (§6.4): `{method, params}` in,
//! `{result}`/`{error{code,message}}` out. Transport framing (stdio, unix
//! socket, HTTP...) is explicitly out of scope — this only dispatches
//! already-deserialized JSON, grounded on the shape of the teacher's
//! `handler.rs` method dispatch with the MCP-specific transport stripped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Error;
use crate::indexer::{self, BuildOptions};
use crate::model::ResultItem;
use crate::query::{QueryEngine, QueryOptions};
use crate::store::{self, Store};
use crate::watcher::{QueueMode, WatchOptions, Watcher};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_ENVELOPE: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const APPLICATION_ERROR: i64 = -32000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Builds an error response for transport-level failures (malformed
    /// JSON, a request missing `method`) that never make it to `Controller::handle`.
    pub fn from_error(code: i64, message: impl Into<String>) -> Self {
        err(code, message)
    }
}

fn ok(result: Value) -> Response {
    Response { result: Some(result), error: None }
}

fn err(code: i64, message: impl Into<String>) -> Response {
    Response { result: None, error: Some(RpcError { code, message: message.into() }) }
}

fn from_core_error(e: Error) -> Response {
    err(APPLICATION_ERROR, e.to_string())
}

fn bad_params(e: serde_json::Error) -> Response {
    err(INVALID_PARAMS, e.to_string())
}

struct WorkspaceHandle {
    root: PathBuf,
    db_path: PathBuf,
    store: Arc<dyn Store>,
    watcher: Arc<Watcher>,
}

/// Holds every open workspace's store/watcher, keyed by the `workspace_id`
/// returned from `workspace.add`. One `Controller` is meant to back one
/// long-lived server process.
pub struct Controller {
    workspaces: Mutex<HashMap<String, WorkspaceHandle>>,
    query_engine: QueryEngine,
}

impl Default for Controller {
    fn default() -> Self {
        Controller::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            workspaces: Mutex::new(HashMap::new()),
            query_engine: QueryEngine::new(256),
        }
    }

    pub fn handle(&self, method: &str, params: Value) -> Response {
        match method {
            "ping" => ok(json!("pong")),
            "version" => ok(json!(env!("CARGO_PKG_VERSION"))),
            "workspace.add" => self.workspace_add(params),
            "index.build" => self.index_build(params),
            "query" => self.query(params),
            "watch.start" => self.watch_start(params),
            "watch.stop" => self.watch_stop(params),
            "watch.status" => self.watch_status(params),
            _ => err(METHOD_NOT_FOUND, format!("unknown method: {method}")),
        }
    }

    fn lookup(&self, workspace_id: &str) -> Result<(PathBuf, PathBuf, Arc<dyn Store>, Arc<Watcher>), Response> {
        let workspaces = self.workspaces.lock().unwrap();
        let handle = workspaces
            .get(workspace_id)
            .ok_or_else(|| err(APPLICATION_ERROR, format!("unknown workspace: {workspace_id}")))?;
        Ok((handle.root.clone(), handle.db_path.clone(), handle.store.clone(), handle.watcher.clone()))
    }

    fn workspace_add(&self, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            root: String,
            db_path: Option<String>,
            #[serde(default)]
            backend: String,
        }
        let p: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return bad_params(e),
        };

        let root = PathBuf::from(&p.root);
        if !root.is_dir() {
            return err(INVALID_PARAMS, format!("root is not a directory: {}", p.root));
        }
        let backend = store::normalize_backend_name(&p.backend);
        let db_path = p
            .db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| store::default_path(&root, backend));

        let store: Arc<dyn Store> = match store::open(backend, &db_path) {
            Ok(s) => Arc::from(s),
            Err(e) => return from_core_error(e),
        };
        let workspace_id = root.to_string_lossy().to_string();
        if let Err(e) = store.ensure_workspace(&workspace_id, &root.to_string_lossy()) {
            return from_core_error(e);
        }

        let watcher = Arc::new(Watcher::new(&root, &db_path, &workspace_id, store.clone()));
        self.workspaces.lock().unwrap().insert(
            workspace_id.clone(),
            WorkspaceHandle { root, db_path, store, watcher },
        );
        ok(json!(workspace_id))
    }

    fn index_build(&self, params: Value) -> Response {
        #[derive(Deserialize, Default)]
        struct Params {
            workspace_id: String,
            #[serde(default)]
            scan_all: bool,
            #[serde(default)]
            include_globs: Vec<String>,
            #[serde(default)]
            exclude_globs: Vec<String>,
        }
        let p: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return bad_params(e),
        };

        let (root, db_path, store, _watcher) = match self.lookup(&p.workspace_id) {
            Ok(v) => v,
            Err(r) => return r,
        };

        let opts = BuildOptions {
            workspace_id: Some(p.workspace_id.clone()),
            scan_all: p.scan_all,
            include_globs: p.include_globs,
            exclude_globs: p.exclude_globs,
            ..Default::default()
        };

        match indexer::build(&root, &db_path, store.as_ref(), &opts, None) {
            Ok(stats) => ok(json!(stats.version)),
            Err(e) => from_core_error(e),
        }
    }

    fn query(&self, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            workspace_id: String,
            q: String,
            #[serde(flatten)]
            opts: QueryOptions,
            #[serde(default)]
            show: bool,
        }
        let p: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return bad_params(e),
        };

        let (root, db_path, store, _watcher) = match self.lookup(&p.workspace_id) {
            Ok(v) => v,
            Err(r) => return r,
        };

        let mut items = match self.query_engine.query(
            store.as_ref(),
            &db_path.to_string_lossy(),
            &p.workspace_id,
            &p.q,
            &p.opts,
            None,
        ) {
            Ok(items) => items,
            Err(e) => return from_core_error(e),
        };

        if p.show {
            for item in &mut items {
                item.text = read_range(&root, &item.path, item.range.sl, item.range.el).unwrap_or_default();
            }
        }
        ok(json!(items))
    }

    fn watch_start(&self, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            workspace_id: String,
            #[serde(default)]
            scan_all: bool,
            #[serde(default)]
            include_globs: Vec<String>,
            #[serde(default)]
            exclude_globs: Vec<String>,
            #[serde(default = "default_true")]
            sync_on_start: bool,
            debounce_ms: Option<u64>,
            debounce_min_ms: Option<u64>,
            debounce_max_ms: Option<u64>,
            #[serde(default)]
            adaptive_debounce: bool,
            sync_workers: Option<usize>,
            queue_mode: Option<String>,
            auto_tune: Option<bool>,
        }
        fn default_true() -> bool {
            true
        }

        let p: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return bad_params(e),
        };

        let (_root, _db_path, _store, watcher) = match self.lookup(&p.workspace_id) {
            Ok(v) => v,
            Err(r) => return r,
        };

        let delay_policy = if p.adaptive_debounce {
            Some(crate::watcher::debounce::DelayPolicy::Adaptive {
                min: std::time::Duration::from_millis(p.debounce_min_ms.unwrap_or(50)),
                max: std::time::Duration::from_millis(p.debounce_max_ms.unwrap_or(500)),
            })
        } else {
            p.debounce_ms
                .map(|ms| crate::watcher::debounce::DelayPolicy::Fixed(std::time::Duration::from_millis(ms)))
        };
        let queue_mode = p.queue_mode.as_deref().and_then(QueueMode::parse);

        let opts = WatchOptions {
            delay_policy,
            queue_mode,
            workers: p.sync_workers,
            sync_on_start: p.sync_on_start,
            auto_tune: p.auto_tune.unwrap_or(true),
            scan_all: p.scan_all,
            include_globs: p.include_globs,
            exclude_globs: p.exclude_globs,
            ..Default::default()
        };

        match watcher.start(&opts) {
            Ok(()) => ok(json!({"running": true})),
            Err(e) => from_core_error(e),
        }
    }

    fn watch_stop(&self, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            workspace_id: String,
        }
        let p: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return bad_params(e),
        };
        let (_root, _db_path, _store, watcher) = match self.lookup(&p.workspace_id) {
            Ok(v) => v,
            Err(r) => return r,
        };
        match watcher.stop() {
            Ok(()) => ok(json!({"running": false})),
            Err(e) => from_core_error(e),
        }
    }

    fn watch_status(&self, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            workspace_id: String,
        }
        let p: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return bad_params(e),
        };
        let (_root, _db_path, _store, watcher) = match self.lookup(&p.workspace_id) {
            Ok(v) => v,
            Err(r) => return r,
        };
        ok(json!({"running": watcher.status() == "running"}))
    }
}

/// Reads 1-indexed, inclusive lines `[sl, el]` of `path` (relative to
/// `root`) for the `show=true` query option.
fn read_range(root: &Path, rel: &str, sl: i64, el: i64) -> Option<String> {
    let text = std::fs::read_to_string(root.join(rel)).ok()?;
    let sl = sl.max(1) as usize;
    let el = el.max(sl as i64) as usize;
    let lines: Vec<&str> = text.lines().collect();
    if sl > lines.len() {
        return Some(String::new());
    }
    let end = el.min(lines.len());
    Some(lines[sl - 1..end].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn ping_and_version() {
        let ctl = Controller::new();
        let r = ctl.handle("ping", Value::Null);
        assert_eq!(r.result, Some(json!("pong")));
        assert!(ctl.handle("version", Value::Null).result.is_some());
    }

    #[test]
    fn unknown_method_returns_method_not_found() {
        let ctl = Controller::new();
        let r = ctl.handle("bogus", Value::Null);
        assert_eq!(r.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn full_workflow_add_build_query() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package main\n\nfunc Hello() {}\n").unwrap();

        let ctl = Controller::new();
        let add = ctl.handle("workspace.add", json!({"root": dir.path().to_string_lossy()}));
        let workspace_id = add.result.unwrap().as_str().unwrap().to_string();

        let build = ctl.handle("index.build", json!({"workspace_id": workspace_id}));
        assert!(build.result.is_some(), "{:?}", build.error);

        let query = ctl.handle(
            "query",
            json!({"workspace_id": workspace_id, "q": "Hello"}),
        );
        assert!(query.result.is_some(), "{:?}", query.error);
        let items: Vec<ResultItem> = serde_json::from_value(query.result.unwrap()).unwrap();
        assert!(!items.is_empty());
    }

    #[test]
    fn query_against_unknown_workspace_is_an_application_error() {
        let ctl = Controller::new();
        let r = ctl.handle("query", json!({"workspace_id": "nope", "q": "x"}));
        assert_eq!(r.error.unwrap().code, APPLICATION_ERROR);
    }
}
