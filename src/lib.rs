//! OtterIndex - local code indexing and search engine.
//!
//! Walks a workspace, chunks text, extracts symbols/comments via
//! tree-sitter, and persists the result behind a pluggable store so
//! clients can run substring/full-text queries refined into meaningful
//! spans. An optional watcher keeps the index live as files change.

pub mod chunker;
pub mod config;
pub mod control;
pub mod error;
pub mod explain;
pub mod indexer;
pub mod logging;
pub mod model;
pub mod parser;
pub mod path;
pub mod query;
pub mod store;
pub mod walker;
pub mod watcher;

pub use error::{Error, Result};
