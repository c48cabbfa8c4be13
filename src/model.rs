//! Backend-agnostic data model shared by the store, indexer, and query
//! engine. Field shapes mirror the original `internal/model/types.go`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub sl: i64,
    pub sc: i64,
    pub el: i64,
    pub ec: i64,
}

impl Range {
    pub fn new(sl: i64, sc: i64, el: i64, ec: i64) -> Self {
        Range { sl, sc, el, ec }
    }

    pub fn span(&self) -> i64 {
        self.el - self.sl
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub line: i64,
    pub col: i64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub kind: String,
    pub path: String,
    pub range: Range,
    pub title: String,
    pub snippet: String,
    pub text: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolItem {
    pub kind: String,
    pub name: String,
    pub container: String,
    pub lang: String,
    pub signature: String,
    pub path: String,
    pub range: Range,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentItem {
    pub kind: String,
    pub text: String,
    pub lang: String,
    pub path: String,
    pub range: Range,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub root: String,
    pub created_at: i64,
    pub version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub workspace_id: String,
    pub path: String,
    pub size: i64,
    pub mtime: i64,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub workspace_id: String,
    pub path: String,
    pub sl: i64,
    pub el: i64,
    pub kind: String,
    pub title: String,
    pub text: String,
}

/// An in-flight chunk before it's attached to a workspace/path (as produced
/// by the chunker and carried through the build pipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInput {
    pub sl: i64,
    pub el: i64,
    pub kind: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInput {
    pub kind: String,
    pub name: String,
    pub sl: i64,
    pub sc: i64,
    pub el: i64,
    pub ec: i64,
    pub container: String,
    pub lang: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInput {
    pub kind: String,
    pub text: String,
    pub sl: i64,
    pub sc: i64,
    pub el: i64,
    pub ec: i64,
    pub lang: String,
}

/// A unit of work for `replace_files_batch`: either a full replacement of
/// a path's rows, or a deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilePlan {
    pub path: String,
    pub size: i64,
    pub mtime: i64,
    pub hash: String,
    pub chunks: Vec<ChunkInput>,
    pub syms: Vec<SymbolInput>,
    pub comms: Vec<CommentInput>,
    pub delete: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub chunks: Vec<Chunk>,
    pub match_case_insensitive: bool,
    pub backend: String,
}

pub fn normalize_kind(kind: &str, default: &str) -> String {
    let trimmed = kind.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn normalize_coord(v: i64) -> i64 {
    if v <= 0 { 1 } else { v }
}
