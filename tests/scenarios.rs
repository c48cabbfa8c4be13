//! End-to-end scenarios spanning indexer + watcher + store + query,
//! driven through the public `control::Controller` surface the way a
//! real caller would use it.

use std::fs;
use std::time::Duration;

use serde_json::json;
use tempfile::tempdir;

use otterindex::control::Controller;
use otterindex::model::ResultItem;

fn add_workspace(ctl: &Controller, root: &std::path::Path) -> String {
    let resp = ctl.handle("workspace.add", json!({"root": root.to_string_lossy()}));
    resp.result
        .unwrap_or_else(|| panic!("workspace.add failed: {:?}", resp.error))
        .as_str()
        .unwrap()
        .to_string()
}

fn build(ctl: &Controller, workspace_id: &str) {
    let resp = ctl.handle("index.build", json!({"workspace_id": workspace_id}));
    assert!(resp.result.is_some(), "index.build failed: {:?}", resp.error);
}

fn query(ctl: &Controller, workspace_id: &str, q: &str) -> Vec<ResultItem> {
    let resp = ctl.handle("query", json!({"workspace_id": workspace_id, "q": q}));
    let result = resp.result.unwrap_or_else(|| panic!("query failed: {:?}", resp.error));
    serde_json::from_value(result).unwrap()
}

/// Deleting a file on disk and reconciling on `watch.start` drops it from
/// the index: subsequent queries for its unique content return nothing.
#[test]
fn watcher_reconcile_removes_deleted_file_from_index() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("a.go");
    fs::write(&file, "hello\nDELETE_TOKEN_123\n").unwrap();

    let ctl = Controller::new();
    let workspace_id = add_workspace(&ctl, dir.path());
    build(&ctl, &workspace_id);

    assert!(!query(&ctl, &workspace_id, "DELETE_TOKEN_123").is_empty());

    fs::remove_file(&file).unwrap();

    let resp = ctl.handle(
        "watch.start",
        json!({"workspace_id": workspace_id, "sync_on_start": true}),
    );
    assert!(resp.result.is_some(), "watch.start failed: {:?}", resp.error);
    ctl.handle("watch.stop", json!({"workspace_id": workspace_id}));

    assert!(query(&ctl, &workspace_id, "DELETE_TOKEN_123").is_empty());
}

/// The watcher picks up a brand-new file written while running, without
/// any explicit re-index call.
#[test]
fn watcher_indexes_a_file_created_while_running() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("seed.go"), "package main\n").unwrap();

    let ctl = Controller::new();
    let workspace_id = add_workspace(&ctl, dir.path());
    build(&ctl, &workspace_id);

    let resp = ctl.handle(
        "watch.start",
        json!({"workspace_id": workspace_id, "sync_on_start": false, "debounce_ms": 20}),
    );
    assert!(resp.result.is_some(), "watch.start failed: {:?}", resp.error);

    fs::write(dir.path().join("new_file.go"), "func LIVE_TOKEN_456() {}\n").unwrap();

    let mut found = Vec::new();
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(50));
        found = query(&ctl, &workspace_id, "LIVE_TOKEN_456");
        if !found.is_empty() {
            break;
        }
    }
    ctl.handle("watch.stop", json!({"workspace_id": workspace_id}));
    assert!(!found.is_empty(), "expected the watcher to index new_file.go");
}

/// Two identical queries against the same version hit the cache: the
/// result is deep-equal and independent of any mutation to the first copy.
#[test]
fn repeated_query_returns_independent_copies() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.go"), "package main\n\nfunc Hello() {}\n").unwrap();

    let ctl = Controller::new();
    let workspace_id = add_workspace(&ctl, dir.path());
    build(&ctl, &workspace_id);

    let mut first = query(&ctl, &workspace_id, "Hello");
    let second = query(&ctl, &workspace_id, "Hello");
    assert_eq!(first, second);

    first[0].title = "mutated".to_string();
    let third = query(&ctl, &workspace_id, "Hello");
    assert_ne!(third[0].title, "mutated");
}

/// `unit="symbol"` resolves a match to its enclosing function rather than
/// the raw chunk window.
#[test]
fn symbol_unit_resolves_to_enclosing_function() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("a.go"),
        "package main\nfunc Hello() {\n\tprintln(\"hello\")\n}\n",
    )
    .unwrap();

    let ctl = Controller::new();
    let workspace_id = add_workspace(&ctl, dir.path());
    build(&ctl, &workspace_id);

    let resp = ctl.handle(
        "query",
        json!({"workspace_id": workspace_id, "q": "println", "unit": "symbol"}),
    );
    let items: Vec<ResultItem> = serde_json::from_value(resp.result.unwrap()).unwrap();
    assert_eq!(items[0].kind, "symbol");
    assert_eq!(items[0].range.sl, 2);
    assert_eq!(items[0].range.el, 4);
}
