//! The backend-agnostic store contract (§4.4, §6.1), grounded on
//! `original_source/internal/index/store/types.go`.

pub mod document;
pub mod relational;

use std::any::Any;
use std::collections::HashMap;

use crate::error::Result;
use crate::model::{File, FilePlan, SearchResult, SymbolItem, Workspace};

/// The shared operation surface both backends present. Consumed only
/// through this trait object by the indexer, query engine, and watcher.
pub trait Store: Send + Sync {
    fn close(&mut self) -> Result<()>;
    fn backend(&self) -> &'static str;
    fn has_fts(&self) -> bool;
    fn fts_reason(&self) -> String;

    fn ensure_workspace(&self, id: &str, root: &str) -> Result<()>;
    fn get_version(&self, id: &str) -> Result<i64>;
    fn bump_version(&self, id: &str) -> Result<i64>;
    fn get_workspace(&self, id: &str) -> Result<Workspace>;

    fn upsert_file(&self, workspace_id: &str, path: &str, size: i64, mtime: i64) -> Result<()>;
    fn get_file(&self, workspace_id: &str, path: &str) -> Result<File>;
    fn get_file_meta(&self, workspace_id: &str, path: &str) -> Result<Option<File>>;
    fn list_files_meta(&self, workspace_id: &str) -> Result<HashMap<String, File>>;
    fn delete_file(&self, workspace_id: &str, path: &str) -> Result<()>;
    fn get_files_stats(&self, workspace_id: &str) -> Result<(i64, i64)>;

    /// Replaces all file+chunk+symbol+comment rows described by `plans` in
    /// one atomic batch, bumping the workspace version exactly once.
    fn replace_files_batch(&self, workspace_id: &str, plans: &[FilePlan]) -> Result<()>;

    fn search_chunks(
        &self,
        workspace_id: &str,
        keyword: &str,
        limit: usize,
        case_insensitive: bool,
    ) -> Result<SearchResult>;

    fn find_min_enclosing_symbols(
        &self,
        workspace_id: &str,
        path: &str,
        line: i64,
    ) -> Result<Vec<SymbolItem>>;

    fn count_chunks(&self, workspace_id: &str) -> Result<i64>;
    fn count_files(&self, workspace_id: &str) -> Result<i64>;

    /// Allows the indexer to discover optional pragma capabilities without
    /// widening the core trait (mirrors the original's type-check
    /// discovery of `BuildPragmaApplier`/`PragmaReader`).
    fn as_any(&self) -> &dyn Any;
}

/// Optional capability: applying build-time performance pragmas.
pub trait BuildPragmaApplier {
    fn apply_build_pragmas(&self) -> Result<()>;
}

/// Optional capability: reading an arbitrary named pragma (relational
/// backend only; guards against SQL injection by validating the name).
pub trait PragmaReader {
    fn query_pragma(&self, name: &str) -> Result<String>;
}

/// Discovers the `BuildPragmaApplier` capability on whichever concrete
/// backend `store` wraps, mirroring the original's interface type-check
/// (`store.(BuildPragmaApplier)`). Rust's `dyn Any` can only downcast to a
/// concrete type, so this tries each backend that implements the
/// capability rather than asking the trait object directly.
pub fn build_pragma_applier(store: &dyn Store) -> Option<&dyn BuildPragmaApplier> {
    if let Some(s) = store.as_any().downcast_ref::<relational::SqliteStore>() {
        return Some(s);
    }
    if let Some(s) = store.as_any().downcast_ref::<document::TantivyStore>() {
        return Some(s);
    }
    None
}

/// Discovers the `PragmaReader` capability (relational backend only).
pub fn pragma_reader(store: &dyn Store) -> Option<&dyn PragmaReader> {
    store.as_any().downcast_ref::<relational::SqliteStore>().map(|s| s as &dyn PragmaReader)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Tantivy,
}

/// Normalizes a caller-provided backend name (`sqlite`, `sqlite3`, `fts5`
/// all map to `Sqlite`; `tantivy`/`bleve` map to `Tantivy`), defaulting to
/// `Sqlite`.
pub fn normalize_backend_name(name: &str) -> Backend {
    match name.trim().to_lowercase().as_str() {
        "tantivy" | "bleve" | "document" => Backend::Tantivy,
        _ => Backend::Sqlite,
    }
}

pub fn default_path(root: &std::path::Path, backend: Backend) -> std::path::PathBuf {
    match backend {
        Backend::Sqlite => root.join(".otidx").join("index.db"),
        Backend::Tantivy => root.join(".otidx").join("index.tantivy"),
    }
}

/// Opens the store for `backend` at `path`, dispatching to the concrete
/// implementation. Mirrors `internal/index/backend/backend.go`'s `Open`.
pub fn open(backend: Backend, path: &std::path::Path) -> Result<Box<dyn Store>> {
    match backend {
        Backend::Sqlite => Ok(Box::new(relational::SqliteStore::open(path)?)),
        Backend::Tantivy => Ok(Box::new(document::TantivyStore::open(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_backend_aliases() {
        assert_eq!(normalize_backend_name("sqlite3"), Backend::Sqlite);
        assert_eq!(normalize_backend_name("fts5"), Backend::Sqlite);
        assert_eq!(normalize_backend_name("bleve"), Backend::Tantivy);
        assert_eq!(normalize_backend_name(""), Backend::Sqlite);
    }

    #[test]
    fn default_paths_use_otidx_directory() {
        let root = std::path::Path::new("/work/repo");
        assert_eq!(
            default_path(root, Backend::Sqlite),
            std::path::PathBuf::from("/work/repo/.otidx/index.db")
        );
    }
}
